//! Parameter resolution.
//!
//! Merges the config document's default parameters with the `-p key=value`
//! overrides from the command line, enforces required-parameter and
//! allow-list rules, and injects the computed module-directory parameter.
//!
//! # Invariants
//!
//! - `moduleDir` is always computed from the module path's final segment and
//!   can never be supplied by the config file or the caller
//! - caller overrides win over file defaults on key collision

use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Result, TfwrapError};
use crate::value::Value;

/// The reserved parameter holding the module directory name.
pub const MODULE_DIR_PARAM: &str = "moduleDir";

/// Fully resolved parameters, ready to be exposed as the `Params` scope.
pub type ParameterSet = IndexMap<String, Value>;

/// Resolve the final parameter set.
///
/// `required_rules` maps a parameter name to its allow-list; an empty list
/// means any value is accepted.
pub fn resolve(
    declared_defaults: &IndexMap<String, Value>,
    required_rules: &IndexMap<String, Vec<String>>,
    caller_params: &IndexMap<String, String>,
    module_dir: &Path,
) -> Result<ParameterSet> {
    for (name, allowed) in required_rules {
        let supplied = caller_params
            .get(name)
            .cloned()
            .or_else(|| declared_defaults.get(name).map(Value::to_var_string));
        let value = supplied.ok_or_else(|| TfwrapError::RequiredParameter(name.clone()))?;
        if !allowed.is_empty() && !allowed.contains(&value) {
            return Err(TfwrapError::DisallowedValue {
                param: name.clone(),
                value,
                allowed: allowed.clone(),
            });
        }
    }

    let mut params: ParameterSet = declared_defaults.clone();
    for (name, value) in caller_params {
        params.insert(name.clone(), Value::String(value.clone()));
    }

    // The reserved key is rejected no matter which source supplied it.
    if declared_defaults.contains_key(MODULE_DIR_PARAM)
        || caller_params.contains_key(MODULE_DIR_PARAM)
    {
        return Err(TfwrapError::ReservedParameter(MODULE_DIR_PARAM.to_string()));
    }

    params.insert(
        MODULE_DIR_PARAM.to_string(),
        Value::String(module_name(module_dir)?),
    );
    Ok(params)
}

/// The final path segment of the module directory, canonicalizing first when
/// the given path has no useful file name (e.g. `.` or `..`).
fn module_name(module_dir: &Path) -> Result<String> {
    if let Some(name) = module_dir.file_name().and_then(|n| n.to_str()) {
        if name != "." && name != ".." {
            return Ok(name.to_string());
        }
    }
    let canonical = module_dir.canonicalize()?;
    match canonical.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => Err(TfwrapError::var_file(format!(
            "cannot derive module name from path {:?}",
            module_dir
        ))),
    }
}
