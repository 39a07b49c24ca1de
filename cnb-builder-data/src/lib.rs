//! Low-level representations for the data types of a Cloud Native Buildpacks builder
//! configuration.

// Enable rustc and Clippy lints that are disabled by default.
// https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html#unused-crate-dependencies
#![warn(unused_crate_dependencies)]
// https://rust-lang.github.io/rust-clippy/stable/index.html
#![warn(clippy::pedantic)]
// This lint is too noisy and enforces a style that reduces readability in many cases.
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod image_index;
pub mod module;
pub mod target;

