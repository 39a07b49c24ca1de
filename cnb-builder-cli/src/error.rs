use cnb_builder_common::toml_file::TomlFileError;
use cnb_builder_config::uri::PlatformUriResolverError;
use cnb_builder_config::{
    BuilderConfigsError, ParseBuildConfigEnvError, ReadConfigError, ValidateConfigError,
};
use std::convert::Infallible;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("{0}")]
    ReadConfig(#[source] ReadConfigError),
    #[error("{} ({} target(s) resolved before the failure)", .0, .0.resolved.len())]
    ResolveConfigs(#[source] BuilderConfigsError<PlatformUriResolverError<Infallible>>),
    #[error("Invalid builder configuration for target {0}: {1}")]
    ValidateConfig(String, #[source] ValidateConfigError),
    #[error("Failed to serialize builder configuration for target {0}: {1}")]
    SerializeConfig(String, #[source] toml::ser::Error),
    #[error("Failed to create output directory {0}: {1}")]
    CreateOutputDirectory(PathBuf, #[source] std::io::Error),
    #[error("Failed to write builder configuration: {0}")]
    WriteConfig(#[source] TomlFileError),
    #[error("{0}")]
    ParseBuildConfigEnv(#[source] ParseBuildConfigEnvError),
    #[error("Failed to write env directory {0}: {1}")]
    WriteEnvDirectory(PathBuf, #[source] std::io::Error),
}
