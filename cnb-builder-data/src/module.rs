use serde::{Deserialize, Serialize};

/// Registry identity of a buildpack or extension.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ModuleInfo {
    pub id: String,
    pub version: String,
}

impl ModuleInfo {
    /// `id@version`, or just the id when no version is known. Empty when there is no id.
    pub fn full_name(&self) -> String {
        if self.id.is_empty() {
            String::new()
        } else if self.version.is_empty() {
            self.id.clone()
        } else {
            format!("{}@{}", self.id, self.version)
        }
    }
}

/// Location of a buildpack or extension, either a URI (path, archive, `docker://` reference) or
/// an image reference.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ImageOrUri {
    pub uri: String,
    pub image: String,
}

impl ImageOrUri {
    pub fn display_string(&self) -> &str {
        if self.uri.is_empty() {
            &self.image
        } else {
            &self.uri
        }
    }
}

/// A `[[buildpacks]]` or `[[extensions]]` entry of a builder configuration.
///
/// # Example
/// ```
/// use cnb_builder_data::module::ModuleConfig;
///
/// let toml_str = r#"
/// id = "heroku/java"
/// version = "1.2.3"
/// uri = "docker://docker.io/heroku/buildpack-java:1.2.3"
/// "#;
///
/// let module_config = toml::from_str::<ModuleConfig>(toml_str).unwrap();
/// assert_eq!(module_config.display_string(), "heroku/java@1.2.3");
/// assert!(module_config.has_uri());
/// ```
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawModuleConfig", into = "RawModuleConfig")]
pub struct ModuleConfig {
    pub module_info: ModuleInfo,
    pub image_or_uri: ImageOrUri,
}

impl ModuleConfig {
    /// Prefers the module's full name, falls back to its location.
    pub fn display_string(&self) -> String {
        let full_name = self.module_info.full_name();

        if full_name.is_empty() {
            self.image_or_uri.display_string().to_string()
        } else {
            full_name
        }
    }

    /// Whether this module is sourced from a URI rather than resolved by registry id.
    pub fn has_uri(&self) -> bool {
        !self.image_or_uri.uri.is_empty()
    }

    /// Whether this module is sourced from an image reference.
    pub fn has_image(&self) -> bool {
        !self.image_or_uri.image.is_empty()
    }
}

// The document format is a flat table. `deny_unknown_fields` cannot be combined with
// `#[serde(flatten)]`, so entries are decoded into this shape first.
#[derive(Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawModuleConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    image: String,
}

impl From<RawModuleConfig> for ModuleConfig {
    fn from(value: RawModuleConfig) -> Self {
        ModuleConfig {
            module_info: ModuleInfo {
                id: value.id,
                version: value.version,
            },
            image_or_uri: ImageOrUri {
                uri: value.uri,
                image: value.image,
            },
        }
    }
}

impl From<ModuleConfig> for RawModuleConfig {
    fn from(value: ModuleConfig) -> Self {
        RawModuleConfig {
            id: value.module_info.id,
            version: value.module_info.version,
            uri: value.image_or_uri.uri,
            image: value.image_or_uri.image,
        }
    }
}

/// The build order of a builder: a list of alternative groups, tried in order.
pub type Order = Vec<OrderEntry>;

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrderEntry {
    #[serde(default)]
    pub group: Vec<ModuleRef>,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}
