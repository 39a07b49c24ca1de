use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};

/// An error that occurred during reading or writing a TOML file.
#[derive(thiserror::Error, Debug)]
pub enum TomlFileError {
    #[error("I/O error while reading/writing TOML file {0}: {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("TOML deserialization error while reading TOML file {0}: {1}")]
    TomlDeserializationError(PathBuf, #[source] toml::de::Error),

    #[error("TOML serialization error while writing TOML file {0}: {1}")]
    TomlSerializationError(PathBuf, #[source] toml::ser::Error),
}

impl TomlFileError {
    /// The path of the file the failed operation was performed on.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::IoError(path, _)
            | Self::TomlDeserializationError(path, _)
            | Self::TomlSerializationError(path, _) => path,
        }
    }
}

/// Serializes the given value as TOML and writes it to the given file path.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be written or the value couldn't be serialized as a TOML string.
pub fn write_toml_file(
    value: &impl Serialize,
    path: impl AsRef<Path>,
) -> Result<(), TomlFileError> {
    let path = path.as_ref();

    let contents = toml::to_string(value)
        .map_err(|error| TomlFileError::TomlSerializationError(path.to_path_buf(), error))?;

    fs::write(path, contents).map_err(|error| TomlFileError::IoError(path.to_path_buf(), error))
}

/// Reads the file at the given path and parses it as `A`.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be read or its contents couldn't be deserialized.
pub fn read_toml_file<A: DeserializeOwned>(path: impl AsRef<Path>) -> Result<A, TomlFileError> {
    let path = path.as_ref();

    let contents = fs::read_to_string(path)
        .map_err(|error| TomlFileError::IoError(path.to_path_buf(), error))?;

    toml::from_str(&contents)
        .map_err(|error| TomlFileError::TomlDeserializationError(path.to_path_buf(), error))
}
