//! Builder configuration resolution for multi-platform Cloud Native Buildpacks builders.
//!
//! A single `builder.toml` document is read into a [`MultiArchConfig`], its legacy `[stack]`
//! table is reconciled with the `[build]` and `[run]` tables, and every concrete target
//! (platform plus distribution version) is resolved into its own [`Config`]:
//!
//! ```no_run
//! use cnb_builder_config::uri::PlatformUriResolver;
//! use cnb_builder_config::{read_multi_arch_config, validate_config};
//!
//! let (config, warnings) = read_multi_arch_config("builder.toml", Vec::new()).unwrap();
//! for warning in warnings {
//!     eprintln!("{warning}");
//! }
//!
//! for resolved in config.builder_configs(&PlatformUriResolver::offline()).unwrap() {
//!     validate_config(&resolved).unwrap();
//! }
//! ```

// Enable rustc and Clippy lints that are disabled by default.
// https://rust-lang.github.io/rust-clippy/stable/index.html
#![warn(clippy::pedantic)]
#![warn(unused_crate_dependencies)]
// This lint is too noisy and enforces a style that reduces readability in many cases.
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod build_env;
pub mod config;
pub mod multi_arch;
pub mod stack;
pub mod uri;

pub use build_env::{
    BuildConfigEnv, ParseBuildConfigEnvError, ParsedBuildConfigEnv, Suffix,
    parse_build_config_env, write_build_config_env_dir,
};
pub use config::{
    BuildConfig, Config, LifecycleConfig, ReadConfigError, RunConfig, RunImageConfig,
    StackConfig, read_config,
};
pub use multi_arch::{
    BuilderConfigsError, MultiArchConfig, ProcessTargetError, ReferenceKind,
    read_multi_arch_config,
};
pub use stack::{ValidateConfigError, validate_config};
