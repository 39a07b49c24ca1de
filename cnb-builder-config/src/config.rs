use crate::build_env::BuildConfigEnv;
use cnb_builder_common::toml_file::{TomlFileError, read_toml_file};
use cnb_builder_data::module::{ModuleConfig, Order};
use cnb_builder_data::target::Target;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A builder configuration (`builder.toml`) for a single target.
///
/// Documents are decoded strictly: unknown keys at any level are rejected.
///
/// # Example
/// ```
/// use cnb_builder_config::Config;
///
/// let toml_str = r#"
/// description = "Ubuntu 24.04 builder"
///
/// [[buildpacks]]
/// id = "heroku/nodejs"
/// uri = "docker://docker.io/heroku/buildpack-nodejs:3.0.0"
///
/// [[order]]
/// [[order.group]]
/// id = "heroku/nodejs"
///
/// [build]
/// image = "heroku/heroku:24-build"
///
/// [[run.images]]
/// image = "heroku/heroku:24"
/// mirrors = ["mirror.example.tld/heroku/heroku:24"]
/// "#;
///
/// let config = toml::from_str::<Config>(toml_str).unwrap();
/// assert_eq!(config.run.images[0].mirrors.len(), 1);
/// ```
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<ModuleConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ModuleConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Order,
    #[serde(rename = "order-extensions", default, skip_serializing_if = "Vec::is_empty")]
    pub order_extensions: Order,
    #[serde(default, skip_serializing_if = "StackConfig::is_empty")]
    pub stack: StackConfig,
    #[serde(default, skip_serializing_if = "LifecycleConfig::is_empty")]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub build: BuildConfig,
    /// The targets this builder is built for. After resolution this holds exactly the one
    /// concrete target the configuration was resolved for.
    #[serde(rename = "targets", default, skip_serializing_if = "Vec::is_empty")]
    pub with_targets: Vec<Target>,
}

/// The legacy `[stack]` table, superseded by `[build]` and `[[run.images]]`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "build-image", default)]
    pub build_image: String,
    #[serde(rename = "run-image", default)]
    pub run_image: String,
    #[serde(rename = "run-image-mirrors", default, skip_serializing_if = "Vec::is_empty")]
    pub run_image_mirrors: Vec<String>,
}

impl StackConfig {
    pub fn is_empty(&self) -> bool {
        self == &StackConfig::default()
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl LifecycleConfig {
    pub fn is_empty(&self) -> bool {
        self.uri.is_empty() && self.version.is_empty()
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub images: Vec<RunImageConfig>,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunImageConfig {
    #[serde(default)]
    pub image: String,
    /// Alternative locations of the same image, in order of preference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<BuildConfigEnv>,
}

/// Reads a builder configuration from the given path.
///
/// The `[stack]` table is reconciled with `[build]` and `[[run.images]]` before the configuration
/// is returned, see [`Config::merge_stack_with_images`]. Returns the warnings encountered while
/// reading alongside the configuration.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be read or its contents are not a valid builder
/// configuration, including unknown keys.
pub fn read_config(path: impl AsRef<Path>) -> Result<(Config, Vec<String>), ReadConfigError> {
    let path = path.as_ref();
    log::debug!("Reading builder configuration from {}", path.display());

    let mut config = read_toml_file::<Config>(path)?;
    let warnings = config_warnings(&config);
    config.merge_stack_with_images();

    Ok((config, warnings))
}

pub(crate) fn config_warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.order.is_empty() {
        warnings.push(String::from("empty `order` definition"));
    }

    warnings
}

#[derive(thiserror::Error, Debug)]
pub enum ReadConfigError {
    #[error("Failed to read builder configuration: {0}")]
    TomlFile(#[from] TomlFileError),
    #[error("Failed to get current dir: {0}")]
    GetCurrentDir(#[source] std::io::Error),
}
