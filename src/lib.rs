//! tfwrap library
//!
//! A Terraform wrapper that resolves a templated multi-environment config
//! into variables, environment bindings, and backend settings, guards
//! against backend drift, installs pinned Terraform versions after
//! signature and checksum verification, and dispatches to Terraform.

pub mod backend;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod params;
pub mod runner;
pub mod template;
pub mod value;

// Re-export main types for convenience
pub use backend::DriftDecision;
pub use cli::Cli;
pub use config::{RawConfigDocument, ResolvedConfig};
pub use error::{Result, TfwrapError};
pub use installer::{ArtifactFetcher, HttpFetcher, Installer, UrlTemplates};
pub use orchestrator::{BuildInfo, Invocation, Orchestrator, PRE_DISPATCH_EXIT_CODE};
pub use params::{ParameterSet, MODULE_DIR_PARAM};
pub use runner::{ProcessRunner, SystemRunner};
pub use template::TemplateEngine;
pub use value::Value;
