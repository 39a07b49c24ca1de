//! Target-specific resolution of module URIs and image references.
//!
//! The resolution engine only talks to a [`ModuleUriResolver`]. [`PlatformUriResolver`] is the
//! implementation used by the `cnb-builder` CLI: it substitutes target placeholders, anchors
//! relative paths and pins multi-platform images to the manifest of the target platform.

use cnb_builder_data::image_index::IndexManifest;
use cnb_builder_data::target::Target;
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use uriparse::{Scheme, URIReference, URIReferenceError};
use url::Url;

/// Resolves module locations and image references for one concrete target.
///
/// Implementations must be deterministic for a given input and target.
pub trait ModuleUriResolver {
    type Error: std::error::Error + 'static;

    /// Resolves the `uri` of a `[[buildpacks]]` or `[[extensions]]` entry. Relative paths are
    /// relative to `relative_base_dir`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the URI cannot be resolved for the given target.
    fn resolve_module(
        &self,
        uri: &str,
        relative_base_dir: &Path,
        target: &Target,
    ) -> Result<String, Self::Error>;

    /// Resolves an image reference, such as a build or run image.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the image cannot be resolved for the given target.
    fn resolve_image(&self, image: &str, target: &Target) -> Result<String, Self::Error>;
}

/// Fetches the image index of an image reference, if the image has one.
pub trait IndexManifestLookup {
    type Error: std::error::Error + 'static;

    /// # Errors
    ///
    /// Will return `Err` if the lookup itself failed. Images without an index are `Ok(None)`.
    fn index_manifest(&self, reference: &str) -> Result<Option<IndexManifest>, Self::Error>;
}

impl<F, E> IndexManifestLookup for F
where
    F: Fn(&str) -> Result<Option<IndexManifest>, E>,
    E: std::error::Error + 'static,
{
    type Error = E;

    fn index_manifest(&self, reference: &str) -> Result<Option<IndexManifest>, Self::Error> {
        self(reference)
    }
}

/// A lookup that never finds an image index. Image references are only templated.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoIndexManifestLookup;

impl IndexManifestLookup for NoIndexManifestLookup {
    type Error = Infallible;

    fn index_manifest(&self, _reference: &str) -> Result<Option<IndexManifest>, Self::Error> {
        Ok(None)
    }
}

/// Resolves module URIs and image references against a concrete target.
///
/// 1. The placeholders `{os}`, `{arch}`, `{variant}`, `{distro.name}` and `{distro.version}` are
///    replaced with the values of the target.
/// 2. Module URIs without a scheme are paths. They are made absolute using the relative base
///    directory and returned as `file://` URIs. `docker://` URIs are resolved like images, all
///    other URIs are kept.
/// 3. Images that have an image index are pinned to the digest of the manifest for the target
///    platform (`repository@digest`). Images without an index are kept.
///
/// # Example
/// ```
/// use cnb_builder_config::uri::{ModuleUriResolver, PlatformUriResolver};
/// use cnb_builder_data::target::Target;
/// use std::path::Path;
///
/// let target: Target = "linux/arm64:ubuntu@24.04".parse().unwrap();
/// let resolver = PlatformUriResolver::offline();
///
/// assert_eq!(
///     resolver
///         .resolve_module("buildpacks/{arch}", Path::new("/workspace"), &target)
///         .unwrap(),
///     "file:///workspace/buildpacks/arm64"
/// );
/// assert_eq!(
///     resolver
///         .resolve_image("heroku/heroku:{distro.version}", &target)
///         .unwrap(),
///     "heroku/heroku:24.04"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PlatformUriResolver<L> {
    lookup: L,
}

impl<L: IndexManifestLookup> PlatformUriResolver<L> {
    pub fn new(lookup: L) -> Self {
        PlatformUriResolver { lookup }
    }

    fn resolve_templated_image(
        &self,
        image: String,
        target: &Target,
    ) -> Result<String, PlatformUriResolverError<L::Error>> {
        let Some(index) = self.lookup.index_manifest(&image).map_err(|source| {
            PlatformUriResolverError::IndexLookup {
                reference: image.clone(),
                source,
            }
        })?
        else {
            return Ok(image);
        };

        match index.find_manifest(&target.platform()) {
            Some(manifest) => Ok(format!("{}@{}", repository(&image), manifest.digest)),
            None => Err(PlatformUriResolverError::NoMatchingManifest {
                reference: image,
                target: target.to_string(),
            }),
        }
    }
}

impl PlatformUriResolver<NoIndexManifestLookup> {
    /// A resolver that performs no registry lookups.
    pub fn offline() -> Self {
        PlatformUriResolver::new(NoIndexManifestLookup)
    }
}

impl<L: IndexManifestLookup> ModuleUriResolver for PlatformUriResolver<L> {
    type Error = PlatformUriResolverError<L::Error>;

    fn resolve_module(
        &self,
        uri: &str,
        relative_base_dir: &Path,
        target: &Target,
    ) -> Result<String, Self::Error> {
        let uri = substitute_placeholders(uri, target)?;

        // Anything before the first colon that is not a valid scheme makes the URI a path. Single
        // letters are drive letters.
        let scheme = uri
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .filter(|scheme| scheme.len() > 1 && Scheme::try_from(*scheme).is_ok())
            .map(str::to_ascii_lowercase);

        let Some(scheme) = scheme else {
            return Ok(file_uri(&absolutize_path(Path::new(&uri), relative_base_dir)));
        };

        URIReference::try_from(uri.as_str()).map_err(|source| {
            PlatformUriResolverError::InvalidUri {
                uri: uri.clone(),
                source,
            }
        })?;

        if scheme == "docker" {
            let image = uri
                .split_once("://")
                .map_or(uri.as_str(), |(_, image)| image);

            self.resolve_templated_image(String::from(image), target)
                .map(|image| format!("docker://{image}"))
        } else {
            Ok(uri)
        }
    }

    fn resolve_image(&self, image: &str, target: &Target) -> Result<String, Self::Error> {
        self.resolve_templated_image(substitute_placeholders(image, target)?, target)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PlatformUriResolverError<E: std::error::Error + 'static> {
    #[error("`{reference}` uses placeholder {placeholder}, but target {target} has no value for it")]
    MissingPlaceholderValue {
        reference: String,
        placeholder: String,
        target: String,
    },
    #[error("Invalid URI `{uri}`: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: URIReferenceError,
    },
    #[error("Failed to look up image index of `{reference}`: {source}")]
    IndexLookup {
        reference: String,
        #[source]
        source: E,
    },
    #[error("Image index of `{reference}` has no manifest for target {target}")]
    NoMatchingManifest { reference: String, target: String },
}

fn substitute_placeholders<E: std::error::Error + 'static>(
    reference: &str,
    target: &Target,
) -> Result<String, PlatformUriResolverError<E>> {
    let distro = target.distro();

    let placeholders = [
        ("{os}", target.os.as_str()),
        ("{arch}", target.arch.as_str()),
        ("{variant}", target.arch_variant.as_str()),
        ("{distro.name}", distro.map_or("", |(name, _)| name)),
        (
            "{distro.version}",
            distro.and_then(|(_, version)| version).unwrap_or_default(),
        ),
    ];

    placeholders
        .into_iter()
        .try_fold(String::from(reference), |result, (placeholder, value)| {
            match (result.contains(placeholder), value.is_empty()) {
                (false, _) => Ok(result),
                (true, true) => Err(PlatformUriResolverError::MissingPlaceholderValue {
                    reference: String::from(reference),
                    placeholder: String::from(placeholder),
                    target: target.to_string(),
                }),
                (true, false) => Ok(result.replace(placeholder, value)),
            }
        })
}

/// The repository of an image reference, without tag or digest.
fn repository(reference: &str) -> &str {
    let reference = reference
        .split_once('@')
        .map_or(reference, |(repository, _)| repository);

    // A colon before the last slash separates a registry port, not a tag.
    let name_start = reference.rfind('/').map_or(0, |index| index + 1);

    match reference[name_start..].rfind(':') {
        Some(index) => &reference[..name_start + index],
        None => reference,
    }
}

/// A percent-encoded `file://` URI for absolute paths. Relative paths can't be expressed as a
/// `file://` URI and are returned as is.
fn file_uri(path: &Path) -> String {
    Url::from_file_path(path).map_or_else(|()| path.display().to_string(), String::from)
}

fn absolutize_path(path: &Path, parent: &Path) -> PathBuf {
    if path.is_relative() {
        normalize_path(&parent.join(path))
    } else {
        normalize_path(path)
    }
}

/// Normalizes a path without it needing to exist on the file system. Leading `..` components of
/// relative paths are kept.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(result.components().next_back(), Some(Component::Normal(_))) {
                    result.pop();
                } else if !result.has_root() {
                    result.push(component.as_os_str());
                }
            }
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                result.push(component.as_os_str());
            }
        }
    }

    result
}
