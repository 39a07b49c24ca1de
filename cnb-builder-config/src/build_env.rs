//! Build-time environment variables of a builder (`[[build.env]]`).
//!
//! Every entry is a directive for a single environment variable. Its suffix selects how the
//! lifecycle applies the value, following the
//! [environment variable modification rules](https://github.com/buildpacks/spec/blob/main/buildpack.md#environment-variable-modification-rules)
//! of the buildpack specification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One `[[build.env]]` entry.
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfigEnv {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    /// One of the [`Suffix`] values. Kept verbatim so that unknown suffixes can be reported by
    /// [`parse_build_config_env`] together with the entry they belong to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delim: String,
}

/// How a build environment variable modifies a previously set value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Suffix {
    None,
    Default,
    Override,
    Append,
    Prepend,
}

impl Suffix {
    /// The key a value with this suffix is stored under.
    pub fn key_for(self, name: &str) -> String {
        match self {
            Suffix::None => String::from(name),
            suffix => format!("{name}.{suffix}"),
        }
    }
}

impl FromStr for Suffix {
    type Err = UnknownSuffixError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" => Ok(Suffix::None),
            "default" => Ok(Suffix::Default),
            "override" => Ok(Suffix::Override),
            "append" => Ok(Suffix::Append),
            "prepend" => Ok(Suffix::Prepend),
            other => Err(UnknownSuffixError(String::from(other))),
        }
    }
}

impl Display for Suffix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Suffix::None => "",
            Suffix::Default => "default",
            Suffix::Override => "override",
            Suffix::Append => "append",
            Suffix::Prepend => "prepend",
        })
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
#[error("Unknown action type `{0}`")]
pub struct UnknownSuffixError(pub String);

const DELIM_EXTENSION: &str = "delim";

/// The merged build environment: one entry per `NAME[.suffix]` key, plus `NAME.delim` keys.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ParsedBuildConfigEnv {
    pub env: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

/// Merges `[[build.env]]` directives into a flat key/value mapping.
///
/// Each directive is stored under `NAME` (no suffix) or `NAME.<suffix>`, its delimiter under
/// `NAME.delim`. A later directive for the same key replaces the earlier value and a warning is
/// recorded. Directives with an empty value are accepted with a warning.
///
/// The given `path` is only used for messages.
///
/// # Example
/// ```
/// use cnb_builder_config::{BuildConfigEnv, parse_build_config_env};
/// use std::path::Path;
///
/// let parsed = parse_build_config_env(
///     &[BuildConfigEnv {
///         name: String::from("PATH"),
///         value: String::from("/opt/bin"),
///         suffix: String::from("prepend"),
///         delim: String::from(":"),
///     }],
///     Path::new("builder.toml"),
/// )
/// .unwrap();
///
/// assert_eq!(parsed.env.get("PATH.prepend").unwrap(), "/opt/bin");
/// assert_eq!(parsed.env.get("PATH.delim").unwrap(), ":");
/// ```
///
/// # Errors
///
/// Will return `Err` if a directive has no name or an unknown suffix. Every `append`/`prepend`
/// key that has no matching delimiter is reported in a single
/// [`ParseBuildConfigEnvError::MissingDelimiter`] error, which also carries the merged
/// environment and all warnings.
pub fn parse_build_config_env(
    env: &[BuildConfigEnv],
    path: &Path,
) -> Result<ParsedBuildConfigEnv, ParseBuildConfigEnvError> {
    let mut parsed = ParsedBuildConfigEnv::default();

    for directive in env {
        if directive.name.is_empty() {
            return Err(ParseBuildConfigEnvError::EmptyName(path.to_path_buf()));
        }

        if directive.value.is_empty() {
            parsed
                .warnings
                .push(format!("empty value for key/name `{}`", directive.name));
        }

        let suffix = directive.suffix.parse::<Suffix>().map_err(|error| {
            ParseBuildConfigEnvError::UnknownSuffix {
                path: path.to_path_buf(),
                name: directive.name.clone(),
                suffix: error.0,
            }
        })?;

        if let Some(previous) = parsed
            .env
            .insert(suffix.key_for(&directive.name), directive.value.clone())
        {
            parsed.warnings.push(format!(
                "overriding env with name: `{}` and suffix: `{}` from `{previous}` to `{}` in {}",
                directive.name,
                directive.suffix,
                directive.value,
                path.display()
            ));
        }

        if !directive.delim.is_empty() {
            if let Some(previous) = parsed.env.insert(
                format!("{}.{DELIM_EXTENSION}", directive.name),
                directive.delim.clone(),
            ) {
                parsed.warnings.push(format!(
                    "overriding env with name: `{}` and delim: `{}` from `{previous}` to `{}` in {}",
                    directive.name,
                    directive.delim,
                    directive.delim,
                    path.display()
                ));
            }
        }
    }

    let keys_without_delimiter = parsed
        .env
        .keys()
        .filter_map(|key| key.rsplit_once('.'))
        .filter(|(name, suffix)| {
            matches!(*suffix, "append" | "prepend")
                && !parsed
                    .env
                    .contains_key(&format!("{name}.{DELIM_EXTENSION}"))
        })
        .map(|(name, suffix)| (String::from(name), String::from(suffix)))
        .collect::<Vec<_>>();

    for (name, suffix) in &keys_without_delimiter {
        parsed.warnings.push(format!(
            "env with name/key `{name}` with suffix `{suffix}` must have a `{DELIM_EXTENSION}` value in {}",
            path.display()
        ));
    }

    if keys_without_delimiter.is_empty() {
        Ok(parsed)
    } else {
        Err(ParseBuildConfigEnvError::MissingDelimiter {
            path: path.to_path_buf(),
            keys: keys_without_delimiter
                .into_iter()
                .map(|(name, suffix)| format!("{name}.{suffix}"))
                .collect(),
            parsed,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParseBuildConfigEnvError {
    #[error("Failed to parse contents of '{}': env name should not be empty", .0.display())]
    EmptyName(PathBuf),
    #[error("Failed to parse contents of '{}': unknown action type `{suffix}` for env `{name}`", .path.display())]
    UnknownSuffix {
        path: PathBuf,
        name: String,
        suffix: String,
    },
    #[error("Error parsing [[build.env]] in file '{}': missing delim for {}", .path.display(), .keys.join(", "))]
    MissingDelimiter {
        path: PathBuf,
        keys: Vec<String>,
        parsed: ParsedBuildConfigEnv,
    },
}

/// Writes a merged build environment as a directory of env files.
///
/// Every key becomes one file whose contents are the value (`PATH.prepend`, `PATH.delim`, ...),
/// the layout the lifecycle reads build-time environment variables from.
///
/// **WARNING:** An existing directory at `path` is deleted first!
pub fn write_build_config_env_dir(
    env: &BTreeMap<String, String>,
    path: impl AsRef<Path>,
) -> std::io::Result<()> {
    let path = path.as_ref();

    if let Some(key) = env.keys().find(|key| key.contains(['/', '\\'])) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("env name `{key}` must not contain path separators"),
        ));
    }

    if path.exists() {
        // This is a possible race condition if the path is deleted between the check and
        // removal by this code. We accept this for now to keep it simple.
        fs::remove_dir_all(path)?;
    }

    fs::create_dir_all(path)?;

    for (key, value) in env {
        fs::write(path.join(key), value)?;
    }

    Ok(())
}
