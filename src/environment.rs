//! Process environment assembly.
//!
//! Projects a [`ResolvedConfig`] into the environment overlay Terraform is
//! spawned with. Variables travel as `TF_VAR_*`, and default arguments are
//! delivered through Terraform's own `TF_CLI_ARGS_<command>` mechanism:
//! var-file arguments for the state-mutating/inspecting subcommands, backend
//! settings for `init` only.
//!
//! The overlay never touches the inherited process environment; the runner
//! merges it on top.

use indexmap::IndexMap;

use crate::config::ResolvedConfig;

/// Prefix for variable and backend-setting environment bindings.
pub const VAR_PREFIX: &str = "TF_VAR_";

/// Prefix for per-subcommand default argument bindings.
pub const CLI_ARGS_PREFIX: &str = "TF_CLI_ARGS_";

/// Subcommands that consume variables and var files.
pub const COMMANDS_WITH_VARS: &[&str] = &["apply", "destroy", "plan", "refresh", "import"];

/// Build the environment overlay for one invocation.
///
/// With `suppress_variables` set (replaying a saved execution plan that must
/// not receive fresh variable input), only the plain environment bindings are
/// emitted.
pub fn assemble(resolved: &ResolvedConfig, suppress_variables: bool) -> IndexMap<String, String> {
    let mut env = IndexMap::new();

    for (name, value) in &resolved.envs {
        env.insert(name.clone(), value.clone());
    }

    if suppress_variables {
        return env;
    }

    for (name, value) in &resolved.vars {
        env.insert(format!("{VAR_PREFIX}{name}"), value.clone());
    }

    if !resolved.var_files.is_empty() {
        let var_file_args = resolved
            .var_files
            .iter()
            .map(|f| format!("-var-file={:?}", f))
            .collect::<Vec<_>>()
            .join(" ");
        for command in COMMANDS_WITH_VARS {
            env.insert(format!("{CLI_ARGS_PREFIX}{command}"), var_file_args.clone());
        }
    }

    if !resolved.backend_configs.is_empty() {
        let mut backend_args = Vec::with_capacity(resolved.backend_configs.len());
        for (key, value) in &resolved.backend_configs {
            env.insert(format!("{VAR_PREFIX}backend_{key}"), value.clone());
            backend_args.push(format!("-backend-config={key}={:?}", value));
        }
        env.insert(
            format!("{CLI_ARGS_PREFIX}init"),
            backend_args.join(" "),
        );
    }

    env
}
