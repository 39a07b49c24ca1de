use crate::config::{Config, ReadConfigError, read_config};
use crate::uri::ModuleUriResolver;
use cnb_builder_data::module::ModuleConfig;
use cnb_builder_data::target::Target;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// A builder configuration that declares any number of targets, together with the targets given
/// on the command line and the directory relative module paths are resolved against.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct MultiArchConfig {
    pub config: Config,
    flag_targets: Vec<Target>,
    relative_base_dir: PathBuf,
}

impl MultiArchConfig {
    pub fn new(config: Config, flag_targets: Vec<Target>, relative_base_dir: PathBuf) -> Self {
        MultiArchConfig {
            config,
            flag_targets,
            relative_base_dir,
        }
    }

    /// The targets to build for. Targets given on the command line replace the declared ones.
    pub fn targets(&self) -> &[Target] {
        if self.flag_targets.is_empty() {
            &self.config.with_targets
        } else {
            &self.flag_targets
        }
    }

    pub fn relative_base_dir(&self) -> &Path {
        &self.relative_base_dir
    }

    /// Whether more than one concrete target will be resolved.
    pub fn multi_arch(&self) -> bool {
        let targets = self.targets();

        targets.len() > 1 || targets.iter().map(Target::unit_count).sum::<usize>() > 1
    }

    /// Resolves one [`Config`] per concrete target, in enumeration order: declared targets in
    /// order, the units of each target as enumerated by [`Target::range`].
    ///
    /// Each resolved configuration is a copy of this configuration with module URIs, build and
    /// run images resolved for its target and exactly that target in
    /// [`Config::with_targets`]. When a run image cannot be resolved, its mirrors are tried in
    /// order and the first one that resolves is used.
    ///
    /// # Errors
    ///
    /// Resolution stops at the first reference that cannot be resolved. The returned error
    /// contains the configurations resolved before the failing target.
    pub fn builder_configs<R: ModuleUriResolver>(
        &self,
        resolver: &R,
    ) -> Result<Vec<Config>, BuilderConfigsError<R::Error>> {
        let mut configs = Vec::new();

        for target in self.targets() {
            let result = target.range(|target, distro_name, distro_version| {
                let config =
                    self.process_target(&target.for_unit(distro_name, distro_version), resolver)?;
                configs.push(config);
                Ok(())
            });

            if let Err(error) = result {
                return Err(BuilderConfigsError {
                    resolved: configs,
                    error,
                });
            }
        }

        Ok(configs)
    }

    fn process_target<R: ModuleUriResolver>(
        &self,
        target: &Target,
        resolver: &R,
    ) -> Result<Config, ProcessTargetError<R::Error>> {
        log::debug!("Resolving builder configuration for target {target}");

        let mut config = self.config.clone();

        for (kind, modules) in [
            (ReferenceKind::Buildpack, &mut config.buildpacks),
            (ReferenceKind::Extension, &mut config.extensions),
        ] {
            for module in modules {
                self.resolve_module(resolver, kind, module, target)?;
            }
        }

        if !config.build.image.is_empty() {
            config.build.image = resolver
                .resolve_image(&config.build.image, target)
                .map_err(|source| {
                    ProcessTargetError::new(
                        ReferenceKind::BuildImage,
                        &config.build.image,
                        target,
                        source,
                    )
                })?;
        }

        // Run images without a reference are left for validation to report.
        for run_image in config
            .run
            .images
            .iter_mut()
            .filter(|run_image| !run_image.image.is_empty())
        {
            resolve_with_mirrors(
                resolver,
                ReferenceKind::RunImage,
                &mut run_image.image,
                &mut run_image.mirrors,
                target,
            )?;
        }

        if !config.stack.build_image.is_empty() {
            config.stack.build_image = resolver
                .resolve_image(&config.stack.build_image, target)
                .map_err(|source| {
                    ProcessTargetError::new(
                        ReferenceKind::StackBuildImage,
                        &config.stack.build_image,
                        target,
                        source,
                    )
                })?;
        }

        if !config.stack.run_image.is_empty() {
            resolve_with_mirrors(
                resolver,
                ReferenceKind::StackRunImage,
                &mut config.stack.run_image,
                &mut config.stack.run_image_mirrors,
                target,
            )?;
        }

        config.with_targets = vec![target.clone()];

        Ok(config)
    }

    fn resolve_module<R: ModuleUriResolver>(
        &self,
        resolver: &R,
        kind: ReferenceKind,
        module: &mut ModuleConfig,
        target: &Target,
    ) -> Result<(), ProcessTargetError<R::Error>> {
        if module.has_uri() {
            let location = &mut module.image_or_uri;
            location.uri = resolver
                .resolve_module(&location.uri, &self.relative_base_dir, target)
                .map_err(|source| ProcessTargetError::new(kind, &location.uri, target, source))?;
        } else if module.has_image() {
            let location = &mut module.image_or_uri;
            location.image = resolver
                .resolve_image(&location.image, target)
                .map_err(|source| ProcessTargetError::new(kind, &location.image, target, source))?;
        }

        Ok(())
    }
}

/// Resolves `image`. If that fails, the mirrors are tried in order and the first mirror that
/// resolves is replaced by its resolved value. `image` itself then stays unresolved.
fn resolve_with_mirrors<R: ModuleUriResolver>(
    resolver: &R,
    kind: ReferenceKind,
    image: &mut String,
    mirrors: &mut [String],
    target: &Target,
) -> Result<(), ProcessTargetError<R::Error>> {
    let error = match resolver.resolve_image(image, target) {
        Ok(resolved) => {
            *image = resolved;
            return Ok(());
        }
        Err(error) => error,
    };

    for mirror in mirrors.iter_mut() {
        match resolver.resolve_image(mirror, target) {
            Ok(resolved) => {
                log::warn!(
                    "Failed to resolve {kind} `{image}` for target {target} ({error}), using mirror `{mirror}`"
                );
                *mirror = resolved;
                return Ok(());
            }
            Err(mirror_error) => {
                log::debug!("Failed to resolve mirror `{mirror}` for target {target}: {mirror_error}");
            }
        }
    }

    Err(ProcessTargetError::new(kind, image, target, error))
}

/// Reads a builder configuration that may declare multiple targets.
///
/// `flag_targets`, usually given on the command line, replace the targets declared in the
/// configuration when not empty. Relative module paths are resolved against the absolute path of
/// the directory that contains the configuration.
///
/// # Errors
///
/// Will return `Err` if the configuration couldn't be read, see [`read_config`], or if `path` is
/// relative and the current directory is unavailable.
pub fn read_multi_arch_config(
    path: impl AsRef<Path>,
    flag_targets: Vec<Target>,
) -> Result<(MultiArchConfig, Vec<String>), ReadConfigError> {
    let path = path.as_ref();
    let (config, warnings) = read_config(path)?;

    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(ReadConfigError::GetCurrentDir)?
            .join(path)
    };

    let relative_base_dir = path.parent().map_or_else(|| path.clone(), Path::to_path_buf);

    Ok((
        MultiArchConfig::new(config, flag_targets, relative_base_dir),
        warnings,
    ))
}

/// The kind of reference that failed to resolve.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReferenceKind {
    Buildpack,
    Extension,
    BuildImage,
    RunImage,
    StackBuildImage,
    StackRunImage,
}

impl Display for ReferenceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Buildpack => "buildpack",
            ReferenceKind::Extension => "extension",
            ReferenceKind::BuildImage => "build image",
            ReferenceKind::RunImage => "run image",
            ReferenceKind::StackBuildImage => "stack build image",
            ReferenceKind::StackRunImage => "stack run image",
        })
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Failed to resolve {kind} `{reference}` for target {target}: {source}")]
pub struct ProcessTargetError<E: Error> {
    pub kind: ReferenceKind,
    pub reference: String,
    pub target: Target,
    #[source]
    pub source: E,
}

impl<E: Error> ProcessTargetError<E> {
    fn new(kind: ReferenceKind, reference: &str, target: &Target, source: E) -> Self {
        ProcessTargetError {
            kind,
            reference: String::from(reference),
            target: target.clone(),
            source,
        }
    }
}

/// An error from [`MultiArchConfig::builder_configs`]
#[derive(thiserror::Error, Debug)]
#[error("{error}")]
pub struct BuilderConfigsError<E: Error> {
    /// Configurations resolved before the error occurred.
    pub resolved: Vec<Config>,
    #[source]
    pub error: ProcessTargetError<E>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildConfig, RunConfig, RunImageConfig, StackConfig};
    use crate::uri::PlatformUriResolver;
    use cnb_builder_data::module::{ImageOrUri, ModuleInfo, ModuleRef, OrderEntry};
    use indoc::indoc;
    use std::fs;
    use tempfile::tempdir;

    #[derive(thiserror::Error, Debug)]
    #[error("cannot resolve `{0}`")]
    struct StubError(String);

    /// Keeps every reference as is, except the ones listed as failing.
    struct StubResolver(&'static [&'static str]);

    impl StubResolver {
        fn resolve(&self, reference: &str) -> Result<String, StubError> {
            if self.0.iter().any(|failing| *failing == reference) {
                Err(StubError(String::from(reference)))
            } else {
                Ok(String::from(reference))
            }
        }
    }

    impl ModuleUriResolver for StubResolver {
        type Error = StubError;

        fn resolve_module(
            &self,
            uri: &str,
            _relative_base_dir: &Path,
            _target: &Target,
        ) -> Result<String, Self::Error> {
            self.resolve(uri)
        }

        fn resolve_image(&self, image: &str, _target: &Target) -> Result<String, Self::Error> {
            self.resolve(image)
        }
    }

    fn module(id: &str, uri: &str) -> ModuleConfig {
        ModuleConfig {
            module_info: ModuleInfo {
                id: String::from(id),
                version: String::new(),
            },
            image_or_uri: ImageOrUri {
                uri: String::from(uri),
                image: String::new(),
            },
        }
    }

    fn targets(values: &[&str]) -> Vec<Target> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    fn base_config() -> Config {
        let mut config = Config {
            buildpacks: vec![module("heroku/ruby", ""), module("heroku/procfile", "")],
            order: vec![OrderEntry {
                group: vec![ModuleRef {
                    id: String::from("heroku/ruby"),
                    version: String::new(),
                    optional: false,
                }],
            }],
            build: BuildConfig {
                image: String::from("heroku/heroku:24-build"),
                env: Vec::new(),
            },
            run: RunConfig {
                images: vec![RunImageConfig {
                    image: String::from("heroku/heroku:24"),
                    mirrors: vec![
                        String::from("mirror-a.example.tld/heroku:24"),
                        String::from("mirror-b.example.tld/heroku:24"),
                    ],
                }],
            },
            with_targets: targets(&["linux/amd64:ubuntu@22.04@24.04", "linux/arm64"]),
            ..Config::default()
        };
        config.merge_stack_with_images();
        config
    }

    #[test]
    fn targets_prefer_flag_targets() {
        let config = MultiArchConfig::new(base_config(), Vec::new(), PathBuf::from("."));
        assert_eq!(config.targets().len(), 2);

        let config = MultiArchConfig::new(
            base_config(),
            targets(&["linux/arm64:ubuntu@24.04"]),
            PathBuf::from("."),
        );
        assert_eq!(config.targets(), targets(&["linux/arm64:ubuntu@24.04"]));
        assert!(!config.multi_arch());
    }

    #[test]
    fn multi_arch_counts_units() {
        let multi_arch = |values: &[&str]| {
            MultiArchConfig::new(Config::default(), targets(values), PathBuf::from("."))
                .multi_arch()
        };

        assert!(!multi_arch(&[]));
        assert!(!multi_arch(&["linux/amd64"]));
        assert!(!multi_arch(&["linux/amd64:ubuntu@24.04"]));
        assert!(multi_arch(&["linux/amd64:ubuntu@22.04@24.04"]));
        assert!(multi_arch(&["linux/amd64:ubuntu@24.04;debian@12"]));
        assert!(multi_arch(&["linux/amd64", "linux/arm64"]));
    }

    #[test]
    fn one_config_per_unit_in_enumeration_order() {
        let config = MultiArchConfig::new(base_config(), Vec::new(), PathBuf::from("."));

        let configs = config.builder_configs(&StubResolver(&[])).unwrap();

        assert_eq!(
            configs
                .iter()
                .map(|config| config.with_targets.clone())
                .collect::<Vec<_>>(),
            vec![
                targets(&["linux/amd64:ubuntu@22.04"]),
                targets(&["linux/amd64:ubuntu@24.04"]),
                targets(&["linux/arm64"]),
            ]
        );
    }

    #[test]
    fn registry_only_config_is_unchanged_except_targets() {
        let base = base_config();
        let config = MultiArchConfig::new(base.clone(), Vec::new(), PathBuf::from("."));

        for resolved in config.builder_configs(&StubResolver(&[])).unwrap() {
            assert_eq!(resolved.with_targets.len(), 1);
            assert_eq!(
                Config {
                    with_targets: base.with_targets.clone(),
                    ..resolved
                },
                base
            );
        }
    }

    #[test]
    fn no_targets_resolve_nothing() {
        let config = MultiArchConfig::new(
            Config {
                with_targets: Vec::new(),
                ..base_config()
            },
            Vec::new(),
            PathBuf::from("."),
        );

        assert_eq!(config.builder_configs(&StubResolver(&[])).unwrap(), Vec::new());
    }

    #[test]
    fn module_uris_and_images_are_resolved_per_target() {
        let mut base = base_config();
        base.buildpacks
            .push(module("heroku/go", "buildpacks/go-{arch}"));
        base.extensions = vec![ModuleConfig {
            module_info: ModuleInfo::default(),
            image_or_uri: ImageOrUri {
                uri: String::new(),
                image: String::from("example.tld/extension:{os}"),
            },
        }];
        base.build.image = String::from("heroku/heroku:{distro.version}-build");
        base.merge_stack_with_images();

        let config = MultiArchConfig::new(
            base,
            targets(&["linux/arm64:ubuntu@24.04"]),
            PathBuf::from("/workspace"),
        );

        let configs = config
            .builder_configs(&PlatformUriResolver::offline())
            .unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(
            configs[0].buildpacks[2].image_or_uri.uri,
            "file:///workspace/buildpacks/go-arm64"
        );
        assert_eq!(configs[0].buildpacks[0].image_or_uri.uri, "");
        assert_eq!(
            configs[0].extensions[0].image_or_uri.image,
            "example.tld/extension:linux"
        );
        assert_eq!(configs[0].build.image, "heroku/heroku:24.04-build");
        assert_eq!(configs[0].stack.build_image, "heroku/heroku:24.04-build");
    }

    #[test]
    fn extension_uris_are_resolved_per_target() {
        let mut base = base_config();
        base.extensions = vec![module("heroku/apt", "extensions/apt-{arch}")];

        let config = MultiArchConfig::new(
            base,
            targets(&["linux/arm64", "linux/amd64"]),
            PathBuf::from("/workspace"),
        );

        let configs = config
            .builder_configs(&PlatformUriResolver::offline())
            .unwrap();

        assert_eq!(
            configs
                .iter()
                .map(|config| config.extensions[0].image_or_uri.uri.as_str())
                .collect::<Vec<_>>(),
            vec![
                "file:///workspace/extensions/apt-arm64",
                "file:///workspace/extensions/apt-amd64"
            ]
        );
        assert_eq!(configs[0].extensions[0].image_or_uri.image, "");
    }

    #[test]
    fn later_run_image_falls_back_to_mirror_per_target() {
        let mut base = base_config();
        base.run.images.push(RunImageConfig {
            image: String::from("example.tld/run:{distro.version}"),
            mirrors: vec![
                String::from("example.tld/run-mirror:{distro.name}"),
                String::from("example.tld/run-mirror:{arch}"),
            ],
        });

        let config = MultiArchConfig::new(
            base,
            targets(&["linux/arm64", "linux/amd64:ubuntu@24.04"]),
            PathBuf::from("/workspace"),
        );

        let configs = config
            .builder_configs(&PlatformUriResolver::offline())
            .unwrap();

        assert_eq!(configs.len(), 2);

        // No distribution: the image and the first mirror fail, the second mirror is used.
        assert_eq!(
            configs[0].run.images[1],
            RunImageConfig {
                image: String::from("example.tld/run:{distro.version}"),
                mirrors: vec![
                    String::from("example.tld/run-mirror:{distro.name}"),
                    String::from("example.tld/run-mirror:arm64"),
                ],
            }
        );
        assert_eq!(configs[0].run.images[0].image, "heroku/heroku:24");

        assert_eq!(
            configs[1].run.images[1],
            RunImageConfig {
                image: String::from("example.tld/run:24.04"),
                mirrors: vec![
                    String::from("example.tld/run-mirror:{distro.name}"),
                    String::from("example.tld/run-mirror:{arch}"),
                ],
            }
        );
    }

    #[test]
    fn run_image_falls_back_to_first_resolvable_mirror() {
        let config = MultiArchConfig::new(
            base_config(),
            targets(&["linux/amd64"]),
            PathBuf::from("."),
        );

        let configs = config
            .builder_configs(&StubResolver(&["heroku/heroku:24"]))
            .unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].run.images[0].image, "heroku/heroku:24");
        assert_eq!(configs[0].stack.run_image, "heroku/heroku:24");
    }

    #[test]
    fn run_image_without_resolvable_mirror_fails() {
        let config = MultiArchConfig::new(
            base_config(),
            targets(&["linux/amd64"]),
            PathBuf::from("."),
        );

        let error = config
            .builder_configs(&StubResolver(&[
                "heroku/heroku:24",
                "mirror-a.example.tld/heroku:24",
                "mirror-b.example.tld/heroku:24",
            ]))
            .unwrap_err();

        assert_eq!(error.error.kind, ReferenceKind::RunImage);
        assert_eq!(error.error.reference, "heroku/heroku:24");
        assert!(error.resolved.is_empty());
    }

    #[test]
    fn stack_run_image_falls_back_to_mirror() {
        let mut base = base_config();
        base.run.images = Vec::new();
        base.stack = StackConfig {
            id: String::from("heroku-22"),
            build_image: String::from("heroku/heroku:22-build"),
            run_image: String::from("heroku/heroku:22"),
            run_image_mirrors: vec![String::from("mirror.example.tld/heroku:22")],
        };

        let config = MultiArchConfig::new(base, targets(&["linux/amd64"]), PathBuf::from("."));

        let configs = config
            .builder_configs(&StubResolver(&["heroku/heroku:22"]))
            .unwrap();

        assert_eq!(configs[0].stack.run_image, "heroku/heroku:22");
    }

    #[test]
    fn first_error_keeps_earlier_configs() {
        let mut base = base_config();
        base.buildpacks
            .push(module("heroku/go", "buildpacks/go-{distro.version}"));

        let config = MultiArchConfig::new(base, Vec::new(), PathBuf::from("/workspace"));

        let error = config
            .builder_configs(&PlatformUriResolver::offline())
            .unwrap_err();

        assert_eq!(error.resolved.len(), 2);
        assert_eq!(error.error.kind, ReferenceKind::Buildpack);
        assert_eq!(error.error.reference, "buildpacks/go-{distro.version}");
        assert_eq!(error.error.target, "linux/arm64".parse::<Target>().unwrap());
        assert!(error
            .to_string()
            .starts_with("Failed to resolve buildpack `buildpacks/go-{distro.version}` for target linux/arm64"));
    }

    #[test]
    fn read_multi_arch_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("builder.toml");
        fs::write(
            &path,
            indoc! {r#"
                [[buildpacks]]
                id = "heroku/java"
                uri = "../buildpacks/java"

                [build]
                image = "heroku/heroku:24-build"

                [[run.images]]
                image = "heroku/heroku:24"

                [[targets]]
                os = "linux"
                arch = "amd64"

                [[targets.distributions]]
                name = "ubuntu"
                versions = ["24.04"]
            "#},
        )
        .unwrap();

        let (config, warnings) =
            read_multi_arch_config(&path, targets(&["linux/arm64"])).unwrap();

        assert_eq!(warnings, vec![String::from("empty `order` definition")]);
        assert_eq!(config.relative_base_dir(), temp_dir.path());
        assert_eq!(config.config.with_targets, targets(&["linux/amd64:ubuntu@24.04"]));
        assert_eq!(config.targets(), targets(&["linux/arm64"]));
        assert_eq!(config.config.stack.run_image, "heroku/heroku:24");
    }

    #[test]
    fn read_multi_arch_config_from_relative_path() {
        let fixture_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("relative");

        let (config, _) = read_multi_arch_config(
            Path::new("tests")
                .join("fixtures")
                .join("relative")
                .join("builder.toml"),
            Vec::new(),
        )
        .unwrap();

        assert_eq!(config.relative_base_dir(), fixture_dir);

        let configs = config
            .builder_configs(&PlatformUriResolver::offline())
            .unwrap();

        assert_eq!(
            configs[0].buildpacks[0].image_or_uri.uri,
            format!("file://{}", fixture_dir.join("bp").join("ruby").display())
        );
    }

    #[test]
    fn read_multi_arch_config_missing_file() {
        let error = read_multi_arch_config("does-not-exist.toml", Vec::new()).unwrap_err();
        assert!(error.to_string().contains("does-not-exist.toml"));
    }
}
