//! Backend drift detection.
//!
//! `terraform init` records the backend configuration it was initialized
//! with under `<module>/.terraform/terraform.tfstate`. Running with a
//! different resolved backend silently targets the wrong state, so every
//! invocation compares the resolved backend settings against that descriptor
//! before anything is spawned.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Result;

/// Relative location of the persisted backend descriptor.
const DESCRIPTOR_PATH: &str = ".terraform/terraform.tfstate";

/// Outcome of the drift check.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftDecision {
    /// No descriptor on disk; nothing to compare, execution proceeds.
    NoPriorState,
    /// Every resolved backend key matches the recorded value.
    Matches,
    /// At least one key differs. The report has one `key: got=.., want=..`
    /// line per offending key.
    Mismatch { report: String },
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    backend: Option<BackendSection>,
}

#[derive(Debug, Deserialize)]
struct BackendSection {
    #[serde(default)]
    config: serde_json::Map<String, serde_json::Value>,
}

/// Compare the resolved backend settings against the module's persisted
/// backend descriptor.
///
/// An explicit `init -reconfigure` invocation always passes: the operator is
/// deliberately rewriting the recorded backend.
pub fn check(
    resolved_backend: &IndexMap<String, String>,
    module_dir: &Path,
    command_args: &[String],
) -> Result<DriftDecision> {
    if is_reconfigure_init(command_args) {
        return Ok(DriftDecision::Matches);
    }

    let descriptor_path = module_dir.join(DESCRIPTOR_PATH);
    let text = match fs::read_to_string(&descriptor_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(DriftDecision::NoPriorState)
        }
        Err(e) => return Err(e.into()),
    };
    let descriptor: Descriptor = serde_json::from_str(&text)?;
    let recorded = match descriptor.backend {
        Some(section) => section.config,
        // A state file without a backend section means the module was never
        // initialized against a remote backend.
        None => return Ok(DriftDecision::NoPriorState),
    };

    let mut mismatches = Vec::new();
    for (key, want) in resolved_backend {
        let got = recorded.get(key).map(json_to_string);
        match got {
            Some(got) if &got == want => {}
            got => {
                let got = got.unwrap_or_else(|| "<unset>".to_string());
                mismatches.push(format!("{key}: got={got}, want={want}"));
            }
        }
    }

    if mismatches.is_empty() {
        Ok(DriftDecision::Matches)
    } else {
        Ok(DriftDecision::Mismatch {
            report: mismatches.join("\n"),
        })
    }
}

fn is_reconfigure_init(args: &[String]) -> bool {
    let subcommand = args.iter().find(|a| !a.starts_with('-'));
    subcommand.map(String::as_str) == Some("init")
        && args.iter().any(|a| a == "-reconfigure" || a == "--reconfigure")
}

/// Descriptor values are JSON; Terraform writes strings, but numbers and
/// booleans occur for settings like `use_msi`. Compare via the same string
/// form the resolver produces.
fn json_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
