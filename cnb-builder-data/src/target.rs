use crate::image_index::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Annotation key for the distribution name of a concrete target.
pub const DISTRO_NAME_ANNOTATION: &str = "io.buildpacks.base.distro.name";

/// Annotation key for the distribution version of a concrete target.
pub const DISTRO_VERSION_ANNOTATION: &str = "io.buildpacks.base.distro.version";

/// One platform dimension of a builder: OS, architecture and variant, optionally combined with
/// a set of OS distributions.
///
/// A target without distributions is distro-agnostic and describes exactly one concrete build
/// unit. A target with distributions describes one concrete unit per distribution version, see
/// [`Target::range`].
///
/// # Example
/// ```
/// use cnb_builder_data::target::Target;
///
/// let target: Target = "linux/arm64/v8:ubuntu@22.04@24.04".parse().unwrap();
/// assert_eq!(target.os, "linux");
/// assert_eq!(target.arch, "arm64");
/// assert_eq!(target.arch_variant, "v8");
/// assert_eq!(target.unit_count(), 2);
/// ```
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(rename = "variant", default, skip_serializing_if = "String::is_empty")]
    pub arch_variant: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<Distribution>,
    #[serde(default, skip_serializing_if = "TargetSpecs::is_empty")]
    pub specs: TargetSpecs,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Distribution {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
}

/// Free-form per-target metadata. It never affects enumeration and is carried verbatim into
/// resolved configurations.
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpecs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(rename = "os.features", default, skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flatten: bool,
    #[serde(rename = "flatten.exclude", default, skip_serializing_if = "Vec::is_empty")]
    pub flatten_exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "os.version", default, skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl TargetSpecs {
    pub fn is_empty(&self) -> bool {
        self == &TargetSpecs::default()
    }
}

impl Target {
    /// The target of the machine this code runs on, without any distributions.
    ///
    /// OS and architecture names follow the OCI image specification (`amd64` instead of
    /// `x86_64`, `darwin` instead of `macos`).
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };

        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "powerpc64" => "ppc64",
            other => other,
        };

        Target {
            os: String::from(os),
            arch: String::from(arch),
            ..Target::default()
        }
    }

    /// Calls `visit` once for every concrete unit of this target.
    ///
    /// Without distributions, `visit` is called exactly once with empty distribution name and
    /// version. Otherwise it is called once per `(distribution, version)` pair, in declaration
    /// order. A distribution that declares no versions is visited once with an empty version.
    ///
    /// Enumeration stops at the first error returned by `visit`, which is then returned. Side
    /// effects of earlier calls are not undone.
    pub fn range<E>(
        &self,
        mut visit: impl FnMut(&Target, &str, &str) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.distributions.is_empty() {
            return visit(self, "", "");
        }

        for distribution in &self.distributions {
            if distribution.versions.is_empty() {
                visit(self, &distribution.name, "")?;
                continue;
            }

            for version in &distribution.versions {
                visit(self, &distribution.name, version)?;
            }
        }

        Ok(())
    }

    /// The number of concrete units [`Target::range`] enumerates.
    pub fn unit_count(&self) -> usize {
        let mut count = 0;

        match self.range(|_, _, _| {
            count += 1;
            Ok::<(), Infallible>(())
        }) {
            Ok(()) => {}
            Err(never) => match never {},
        }

        count
    }

    /// Whether this single target describes more than one concrete unit.
    pub fn multi_arch(&self) -> bool {
        self.unit_count() > 1
    }

    /// Folds one enumerated `(distribution, version)` pair into a copy of this target.
    ///
    /// The resulting target has at most one distribution with at most one version and therefore
    /// describes exactly one concrete unit. An empty `distro_name` yields a distro-agnostic
    /// target.
    #[must_use]
    pub fn for_unit(&self, distro_name: &str, distro_version: &str) -> Target {
        let distributions = if distro_name.is_empty() {
            Vec::new()
        } else {
            vec![Distribution {
                name: String::from(distro_name),
                versions: if distro_version.is_empty() {
                    Vec::new()
                } else {
                    vec![String::from(distro_version)]
                },
            }]
        };

        Target {
            distributions,
            ..self.clone()
        }
    }

    /// The first distribution name and version of this target, if any.
    pub fn distro(&self) -> Option<(&str, Option<&str>)> {
        self.distributions.first().map(|distribution| {
            (
                distribution.name.as_str(),
                distribution.versions.first().map(String::as_str),
            )
        })
    }

    /// Image annotations that identify the distribution of this target.
    ///
    /// Uses the first distribution and its first version.
    pub fn annotations(&self) -> Result<BTreeMap<String, String>, TargetAnnotationsError> {
        let (name, version) = self
            .distro()
            .ok_or_else(|| TargetAnnotationsError::DistrolessTarget(self.to_string()))?;

        let version = version.ok_or_else(|| {
            TargetAnnotationsError::MissingDistributionVersion(String::from(name))
        })?;

        Ok(BTreeMap::from([
            (String::from(DISTRO_NAME_ANNOTATION), String::from(name)),
            (String::from(DISTRO_VERSION_ANNOTATION), String::from(version)),
        ]))
    }

    /// The OCI platform of this target.
    pub fn platform(&self) -> Platform {
        Platform {
            os: self.os.clone(),
            architecture: self.arch.clone(),
            variant: self.arch_variant.clone(),
            os_version: self.specs.os_version.clone(),
            features: self.specs.features.clone(),
            os_features: self.specs.os_features.clone(),
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.specs.urls
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum TargetAnnotationsError {
    #[error("Unable to get annotations: distroless target {0} provided")]
    DistrolessTarget(String),
    #[error("Unable to get annotations: distribution {0} declares no version")]
    MissingDistributionVersion(String),
}

/// Renders the target in the syntax accepted by [`Target::from_str`]:
/// `os[/arch[/variant]][:name@version[@version...][;name@version...]]`.
impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.os)?;

        if !self.arch.is_empty() {
            write!(f, "/{}", self.arch)?;

            if !self.arch_variant.is_empty() {
                write!(f, "/{}", self.arch_variant)?;
            }
        }

        if !self.distributions.is_empty() {
            let distributions = self
                .distributions
                .iter()
                .map(|distribution| {
                    std::iter::once(distribution.name.as_str())
                        .chain(distribution.versions.iter().map(String::as_str))
                        .collect::<Vec<_>>()
                        .join("@")
                })
                .collect::<Vec<_>>()
                .join(";");

            write!(f, ":{distributions}")?;
        }

        Ok(())
    }
}

impl FromStr for Target {
    type Err = TargetParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (platform, distributions) = match value.split_once(':') {
            Some((platform, distributions)) => (platform, Some(distributions)),
            None => (value, None),
        };

        let mut segments = platform.split('/');

        let os = segments
            .next()
            .filter(|os| !os.is_empty())
            .ok_or_else(|| TargetParseError::MissingOs(String::from(value)))?;
        let arch = segments.next().unwrap_or_default();
        let arch_variant = segments.next().unwrap_or_default();

        if segments.next().is_some() {
            return Err(TargetParseError::TooManyPlatformSegments(String::from(
                value,
            )));
        }

        if arch.is_empty() && !arch_variant.is_empty() {
            return Err(TargetParseError::VariantWithoutArch(String::from(value)));
        }

        let distributions = distributions
            .map(|distributions| {
                distributions
                    .split(';')
                    .filter(|distribution| !distribution.is_empty())
                    .map(parse_distribution)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Target {
            os: String::from(os),
            arch: String::from(arch),
            arch_variant: String::from(arch_variant),
            distributions,
            specs: TargetSpecs::default(),
        })
    }
}

fn parse_distribution(value: &str) -> Result<Distribution, TargetParseError> {
    let mut parts = value.split('@');

    let name = parts
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TargetParseError::EmptyDistributionName(String::from(value)))?;

    let versions = parts
        .map(|version| {
            if version.is_empty() {
                Err(TargetParseError::EmptyDistributionVersion(String::from(
                    value,
                )))
            } else {
                Ok(String::from(version))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Distribution {
        name: String::from(name),
        versions,
    })
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum TargetParseError {
    #[error("Invalid target `{0}`: an OS is required")]
    MissingOs(String),
    #[error("Invalid target `{0}`: expected at most os/arch/variant")]
    TooManyPlatformSegments(String),
    #[error("Invalid target `{0}`: a variant requires an architecture")]
    VariantWithoutArch(String),
    #[error("Invalid distribution `{0}`: a name is required")]
    EmptyDistributionName(String),
    #[error("Invalid distribution `{0}`: versions must not be empty")]
    EmptyDistributionVersion(String),
}
