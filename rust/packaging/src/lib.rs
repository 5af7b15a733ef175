//! Turns a user-supplied source location into an uploadable build archive.
//!
//! The pipeline has three stages: [`resource::classify`] decides what kind of
//! source the user pointed at, [`resource::infer_runtime`] and
//! [`resource::infer_native`] reconcile the requested flags with the on-disk
//! artifacts, and [`archive::build_archive`] packages the matching files into
//! a gzipped tar stream for the cluster's binary build endpoint.

pub mod archive;
pub mod build_type;
pub mod resource;

pub use archive::build_archive;
pub use build_type::{BinaryBuildType, RuntimeType};
pub use resource::{classify, infer_native, infer_runtime, ResourceType};
