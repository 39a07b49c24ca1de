//! Descriptors of an OCI image index (manifest list), as far as they are needed to pick the
//! platform-specific manifest of a multi-platform image.
//!
//! See: <https://github.com/opencontainers/image-spec/blob/main/image-index.md>

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An OCI image index.
///
/// # Example
/// ```
/// use cnb_builder_data::image_index::IndexManifest;
///
/// let json = r#"{
///   "schemaVersion": 2,
///   "mediaType": "application/vnd.oci.image.index.v1+json",
///   "manifests": [
///     {
///       "mediaType": "application/vnd.oci.image.manifest.v1+json",
///       "digest": "sha256:aaaa",
///       "size": 7143,
///       "platform": { "architecture": "arm64", "os": "linux" }
///     }
///   ]
/// }"#;
///
/// let index: IndexManifest = serde_json::from_str(json).unwrap();
/// assert_eq!(index.manifests[0].digest, "sha256:aaaa");
/// ```
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl IndexManifest {
    /// The first manifest whose platform satisfies the `wanted` platform.
    pub fn find_manifest(&self, wanted: &Platform) -> Option<&ManifestDescriptor> {
        self.manifests.iter().find(|manifest| {
            manifest
                .platform
                .as_ref()
                .is_some_and(|platform| platform.satisfies(wanted))
        })
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// The platform an image manifest was built for.
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Platform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(rename = "os.version", default, skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(rename = "os.features", default, skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,
}

impl Platform {
    /// Whether this platform can be used where `wanted` is requested.
    ///
    /// OS and architecture must match. The variant only has to match when `wanted` declares one.
    pub fn satisfies(&self, wanted: &Platform) -> bool {
        self.os == wanted.os
            && self.architecture == wanted.architecture
            && (wanted.variant.is_empty() || self.variant == wanted.variant)
    }
}
