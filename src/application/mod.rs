mod application_impl;
pub mod data;
mod listing;
mod runtime_config;

pub use application_impl::{Application, ApplicationError, DEFAULT_BUNDLE_FILE_NAME};
pub use runtime_config::RuntimeConfig;
