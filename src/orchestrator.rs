//! Per-invocation orchestration.
//!
//! Composes config resolution, the backend drift check, installation of a
//! pinned Terraform version, and environment assembly, then delegates to the
//! injected [`ProcessRunner`]. Every resolution-phase failure aborts before
//! any process is spawned; a non-zero exit from Terraform itself is
//! forwarded verbatim, not classified as a failure of this program.

use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::backend::{self, DriftDecision};
use crate::config::{self, RawConfigDocument};
use crate::environment;
use crate::error::{Result, TfwrapError};
use crate::installer::{parse_public_key, ArtifactFetcher, Installer, UrlTemplates};
use crate::runner::ProcessRunner;

/// Exit code for failures detected before Terraform is dispatched, distinct
/// from anything Terraform itself exits with.
pub const PRE_DISPATCH_EXIT_CODE: i32 = 250;

/// Hex-encoded ed25519 release signing keys, newest first. Superseded keys
/// stay listed so versions pinned before a rotation remain installable.
const RELEASE_PUBLIC_KEYS: &[&str] = &[
    "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c",
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
];

/// Build metadata, injected at construction instead of read from globals.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
}

impl BuildInfo {
    pub fn full(&self) -> String {
        format!(
            "{} (commit={}, date={})",
            self.version, self.commit, self.date
        )
    }
}

/// Everything one run needs, straight from the CLI surface.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config_file: PathBuf,
    pub module_dir: PathBuf,
    pub params: IndexMap<String, String>,
    pub skip_backend_check: bool,
    pub no_vars: bool,
    /// Arguments forwarded to Terraform unchanged.
    pub args: Vec<String>,
}

pub struct Orchestrator<R: ProcessRunner, F: ArtifactFetcher> {
    runner: R,
    fetcher: F,
    build_info: BuildInfo,
    cache_root: Option<PathBuf>,
}

impl<R: ProcessRunner, F: ArtifactFetcher> Orchestrator<R, F> {
    pub fn new(runner: R, fetcher: F, build_info: BuildInfo) -> Self {
        Self {
            runner,
            fetcher,
            build_info,
            cache_root: None,
        }
    }

    /// Override the platform cache root (tests install into a temp dir).
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Run one invocation end to end, returning Terraform's exit code.
    pub fn run(&self, invocation: &Invocation) -> Result<i32> {
        if invocation.args.is_empty() {
            return Err(TfwrapError::execution(
                "no arguments for Terraform specified",
            ));
        }
        debug!(version = %self.build_info.full(), "starting invocation");

        let doc = RawConfigDocument::load(&invocation.config_file)?;
        let resolved = config::resolve(
            &doc,
            &invocation.config_file,
            &invocation.module_dir,
            &invocation.params,
        )?;

        if invocation.skip_backend_check {
            debug!("backend check skipped by flag");
        } else {
            match backend::check(
                &resolved.backend_configs,
                &invocation.module_dir,
                &invocation.args,
            )? {
                DriftDecision::Matches => {}
                DriftDecision::NoPriorState => {
                    debug!("no persisted backend state, nothing to compare")
                }
                DriftDecision::Mismatch { report } => {
                    return Err(TfwrapError::BackendDrift { report })
                }
            }
        }

        let binary = self.terraform_binary(&resolved.terraform_version)?;
        let env = environment::assemble(&resolved, invocation.no_vars);

        debug!(binary = %binary, args = ?invocation.args, "terraform command line");
        for (key, value) in &env {
            debug!("env {key}={value}");
        }

        self.runner
            .run(&env, &invocation.module_dir, &binary, &invocation.args)
    }

    /// Path of the Terraform binary to use: the pinned version from the
    /// cache (installing it first if absent), or plain `terraform` from PATH
    /// when no version is pinned.
    fn terraform_binary(&self, pinned_version: &Option<String>) -> Result<String> {
        let version = match pinned_version {
            Some(version) => version,
            None => return Ok("terraform".to_string()),
        };

        let cache_root = match &self.cache_root {
            Some(root) => root.clone(),
            None => dirs::cache_dir()
                .ok_or_else(|| TfwrapError::execution("no cache directory available"))?
                .join("tfwrap")
                .join("terraform"),
        };
        let version_dir = cache_root.join(version);
        let binary = version_dir.join("terraform");

        if binary.is_file() {
            info!(%version, "terraform version already installed");
        } else {
            info!(%version, "installing terraform");
            let keys = RELEASE_PUBLIC_KEYS
                .iter()
                .map(|k| parse_public_key(k))
                .collect::<Result<Vec<_>>>()?;
            let installer = Installer::new(
                UrlTemplates::hashicorp(),
                version.clone(),
                keys,
                &version_dir,
                &self.fetcher,
            );
            installer.install()?;
        }
        Ok(binary.to_string_lossy().into_owned())
    }
}
