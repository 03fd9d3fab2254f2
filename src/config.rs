//! Config document loading and resolution.
//!
//! The config document is a YAML file describing variables, environment
//! bindings, var files, and backend settings for every module, templated
//! over a parameter set. `resolve` turns the raw document plus a module
//! directory and caller parameters into a fully rendered [`ResolvedConfig`].
//!
//! Resolution order is load-bearing: parameters first, then var-file paths
//! and variables against `{Params}`, then environment bindings against
//! `{Params}`, and backend settings last against `{Params, Vars, Envs}` so a
//! backend key may reference any variable or environment value by its final
//! rendered form.

use std::fs;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use minijinja::context;
use serde::Deserialize;

use crate::error::{Result, TfwrapError};
use crate::params::{self, MODULE_DIR_PARAM};
use crate::template::TemplateEngine;
use crate::value::Value;

/// The parsed config document. Immutable once loaded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RawConfigDocument {
    /// Terraform version to install and run. Unset means "use `terraform`
    /// from PATH".
    pub terraform_version: Option<String>,
    /// Required parameter names mapped to their allow-list. An empty list
    /// accepts any value.
    pub required_params: IndexMap<String, Vec<String>>,
    /// Default parameters, overridable per invocation via `-p`.
    pub default_params: IndexMap<String, Value>,
    /// Var files applied to every module, in order.
    pub global_var_files: Vec<String>,
    /// Additional var files per module, appended after the global list.
    pub module_var_files: IndexMap<String, Vec<String>>,
    /// Variables applied to every module.
    pub global_vars: IndexMap<String, Value>,
    /// Per-module variables, overwriting global ones on key collision.
    pub module_vars: IndexMap<String, IndexMap<String, Value>>,
    /// Environment bindings copied into the Terraform process environment.
    pub envs: IndexMap<String, String>,
    /// Backend settings, checked against the persisted backend state.
    pub backend_configs: IndexMap<String, String>,
    /// Tolerate var files that do not exist on disk.
    pub ignore_missing_var_files: bool,
}

impl RawConfigDocument {
    /// Load and parse the document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| TfwrapError::config_load(path.display().to_string(), e))?;
        serde_yaml::from_str(&text)
            .map_err(|e| TfwrapError::config_load(path.display().to_string(), e))
    }
}

/// The fully rendered configuration for one module invocation.
///
/// Every template reference in any value has been substituted; no
/// placeholders remain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub terraform_version: Option<String>,
    /// Var file paths, module-relative or absolute, global entries first.
    pub var_files: Vec<String>,
    pub vars: IndexMap<String, String>,
    pub envs: IndexMap<String, String>,
    pub backend_configs: IndexMap<String, String>,
}

/// Resolve `doc` for `module_dir` with the given caller parameters.
///
/// `config_path` is the path the document was loaded from; relative var-file
/// paths are interpreted relative to its directory.
pub fn resolve(
    doc: &RawConfigDocument,
    config_path: &Path,
    module_dir: &Path,
    caller_params: &IndexMap<String, String>,
) -> Result<ResolvedConfig> {
    let engine = TemplateEngine::new();
    let parameters = params::resolve(
        &doc.default_params,
        &doc.required_params,
        caller_params,
        module_dir,
    )?;
    let module_name = match &parameters[MODULE_DIR_PARAM] {
        Value::String(s) => s.clone(),
        other => other.to_var_string(),
    };

    let params_scope = context! {
        Params => minijinja::Value::from_serialize(&parameters),
    };

    let var_files = resolve_var_files(doc, &engine, &params_scope, config_path, module_dir, &module_name)?;
    let vars = resolve_vars(doc, &engine, &params_scope, &module_name)?;

    let mut envs = IndexMap::with_capacity(doc.envs.len());
    for (name, template) in &doc.envs {
        let rendered = engine.render(&params_scope, template, &format!("envs.{name}"))?;
        envs.insert(name.clone(), rendered);
    }

    // Backend settings see the final vars and envs, never intermediate forms.
    let full_scope = context! {
        Params => minijinja::Value::from_serialize(&parameters),
        Vars => minijinja::Value::from_serialize(&vars),
        Envs => minijinja::Value::from_serialize(&envs),
    };
    let mut backend_configs = IndexMap::with_capacity(doc.backend_configs.len());
    for (key, template) in &doc.backend_configs {
        let rendered = engine.render(&full_scope, template, &format!("backendConfigs.{key}"))?;
        backend_configs.insert(key.clone(), rendered);
    }

    Ok(ResolvedConfig {
        terraform_version: doc.terraform_version.clone(),
        var_files,
        vars,
        envs,
        backend_configs,
    })
}

/// Render and resolve the var-file list: global entries first, then the
/// module's own entries. Duplicates are kept; Terraform applies var files
/// left to right with later files winning, and that ordering is the caller's
/// contract.
fn resolve_var_files(
    doc: &RawConfigDocument,
    engine: &TemplateEngine,
    params_scope: &minijinja::Value,
    config_path: &Path,
    module_dir: &Path,
    module_name: &str,
) -> Result<Vec<String>> {
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let module_entries = doc
        .module_var_files
        .get(module_name)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    let mut var_files = Vec::with_capacity(doc.global_var_files.len() + module_entries.len());
    for template in doc.global_var_files.iter().chain(module_entries) {
        let rendered = engine.render(params_scope, template, &format!("varFiles.{template}"))?;
        let path = PathBuf::from(&rendered);
        let resolved = if path.is_absolute() {
            path
        } else {
            // Relative entries are anchored at the config file, but Terraform
            // runs with the module directory as its working directory, so the
            // path has to be re-expressed relative to the module.
            relative_to(&config_dir.join(&path), module_dir)
        };
        let on_disk = if resolved.is_absolute() {
            resolved.clone()
        } else {
            module_dir.join(&resolved)
        };
        if !doc.ignore_missing_var_files && !on_disk.is_file() {
            return Err(TfwrapError::var_file(format!(
                "var file {:?} does not exist",
                on_disk
            )));
        }
        var_files.push(resolved.to_string_lossy().into_owned());
    }
    Ok(var_files)
}

/// Resolve global variables, then the module's own variables. Module entries
/// overwrite global ones on key collision.
fn resolve_vars(
    doc: &RawConfigDocument,
    engine: &TemplateEngine,
    params_scope: &minijinja::Value,
    module_name: &str,
) -> Result<IndexMap<String, String>> {
    let empty = IndexMap::new();
    let module_vars = doc.module_vars.get(module_name).unwrap_or(&empty);

    let mut vars = IndexMap::new();
    for (name, value) in doc.global_vars.iter().chain(module_vars.iter()) {
        let rendered = value.try_map_strings(&|s| {
            engine.render(params_scope, s, &format!("vars.{name}"))
        })?;
        vars.insert(name.clone(), rendered.to_var_string());
    }
    Ok(vars)
}

/// Express `target` relative to `base`. Both paths are made absolute against
/// the current directory first so mixed relative/absolute inputs compare.
fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let target = normalize(&cwd.join(target));
    let base = normalize(&cwd.join(base));

    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base_parts.len() {
        result.push("..");
    }
    for part in &target_parts[common..] {
        result.push(part);
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// Lexically remove `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(parts.last(), Some(Component::Normal(_))) {
                    parts.pop();
                } else {
                    parts.push(component);
                }
            }
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TEST_CONFIG: &str = r#"
terraformVersion: "1.4.6"
requiredParams:
  environment: [dev, prod]
defaultParams:
  region: eu-west-1
globalVarFiles:
  - global.tfvars
moduleVarFiles:
  mymodule:
    - "{{ Params.environment }}.tfvars"
globalVars:
  foo: foovalue
  templated: "{{ Params.environment }}-{{ Params.region }}"
moduleVars:
  mymodule:
    bar: barvalue
    foo: module-foovalue
envs:
  TF_IN_AUTOMATION: "1"
  AWS_PROFILE: "{{ Params.environment }}"
backendConfigs:
  key: "state-{{ Vars.foo }}-{{ Envs.AWS_PROFILE }}"
"#;

    struct Fixture {
        _dir: TempDir,
        config_path: PathBuf,
        module_dir: PathBuf,
    }

    fn fixture(config: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("tfwrap.yaml");
        fs::write(&config_path, config).unwrap();
        fs::write(dir.path().join("global.tfvars"), "foo = 1\n").unwrap();
        fs::write(dir.path().join("prod.tfvars"), "bar = 2\n").unwrap();
        let module_dir = dir.path().join("mymodule");
        fs::create_dir(&module_dir).unwrap();
        Fixture {
            _dir: dir,
            config_path,
            module_dir,
        }
    }

    fn prod_params() -> IndexMap<String, String> {
        [("environment".to_string(), "prod".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_full_resolution() {
        let fx = fixture(TEST_CONFIG);
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let resolved = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap();

        assert_eq!(resolved.terraform_version.as_deref(), Some("1.4.6"));
        // Module vars overwrite global vars; global-only keys survive.
        assert_eq!(resolved.vars["foo"], "module-foovalue");
        assert_eq!(resolved.vars["bar"], "barvalue");
        assert_eq!(resolved.vars["templated"], "prod-eu-west-1");
        assert_eq!(resolved.envs["AWS_PROFILE"], "prod");
        // Backend settings see final vars and envs.
        assert_eq!(resolved.backend_configs["key"], "state-module-foovalue-prod");
        // Global var files come first, module entries after, both re-expressed
        // relative to the module directory.
        assert_eq!(
            resolved.var_files,
            vec!["../global.tfvars".to_string(), "../prod.tfvars".to_string()]
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let fx = fixture(TEST_CONFIG);
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let first = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap();
        let second = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_backend_references_final_var_value() {
        // The backend key must see "module-foovalue", not the global
        // "foovalue" that the module override replaced.
        let fx = fixture(TEST_CONFIG);
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let resolved = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap();
        assert!(resolved.backend_configs["key"].contains("module-foovalue"));
        assert!(!resolved.backend_configs["key"].contains("state-foovalue"));
    }

    #[test]
    fn test_missing_var_file_is_an_error() {
        let fx = fixture(TEST_CONFIG);
        fs::remove_file(fx.config_path.parent().unwrap().join("global.tfvars")).unwrap();
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let err = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap_err();
        assert!(matches!(err, TfwrapError::VarFilePath(_)));
    }

    #[test]
    fn test_missing_var_file_tolerated_with_flag() {
        let config = format!("{TEST_CONFIG}ignoreMissingVarFiles: true\n");
        let fx = fixture(&config);
        fs::remove_file(fx.config_path.parent().unwrap().join("global.tfvars")).unwrap();
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let resolved = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap();
        assert_eq!(resolved.var_files.len(), 2);
    }

    #[test]
    fn test_absolute_var_file_kept_verbatim() {
        let fx = fixture(TEST_CONFIG);
        let absolute = fx
            .config_path
            .parent()
            .unwrap()
            .join("global.tfvars")
            .display()
            .to_string();
        let config = TEST_CONFIG.replace("- global.tfvars", &format!("- {absolute}"));
        fs::write(&fx.config_path, config).unwrap();
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let resolved = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap();
        assert_eq!(resolved.var_files[0], absolute);
    }

    #[test]
    fn test_undefined_template_reference_aborts() {
        let config = TEST_CONFIG.replace("{{ Params.environment }}-", "{{ Params.nope }}-");
        let fx = fixture(&config);
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let err = resolve(&doc, &fx.config_path, &fx.module_dir, &prod_params()).unwrap_err();
        assert!(matches!(err, TfwrapError::TemplateRender { .. }));
    }

    #[test]
    fn test_structured_var_renders_as_hcl() {
        let config = r#"
globalVars:
  mapvar:
    value1: "{{ Params.moduleDir }}"
    value2: true
"#;
        let fx = fixture(config);
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let resolved = resolve(&doc, &fx.config_path, &fx.module_dir, &IndexMap::new()).unwrap();
        assert_eq!(
            resolved.vars["mapvar"],
            "{\n  value1 = \"mymodule\"\n  value2 = true\n}"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let fx = fixture("bogusField: true\n");
        let err = RawConfigDocument::load(&fx.config_path).unwrap_err();
        assert!(matches!(err, TfwrapError::ConfigLoad { .. }));
    }

    #[test]
    fn test_module_without_own_entries_gets_globals_only() {
        let fx = fixture(TEST_CONFIG);
        let other = fx.config_path.parent().unwrap().join("othermodule");
        fs::create_dir(&other).unwrap();
        let doc = RawConfigDocument::load(&fx.config_path).unwrap();
        let resolved = resolve(&doc, &fx.config_path, &other, &prod_params()).unwrap();
        assert_eq!(resolved.vars["foo"], "foovalue");
        assert!(!resolved.vars.contains_key("bar"));
        assert_eq!(resolved.var_files, vec!["../global.tfvars".to_string()]);
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/a/b/file.tfvars"), Path::new("/a/b/mod")),
            PathBuf::from("../file.tfvars")
        );
        assert_eq!(
            relative_to(Path::new("/a/b/mod/file.tfvars"), Path::new("/a/b/mod")),
            PathBuf::from("file.tfvars")
        );
        assert_eq!(
            relative_to(Path::new("/x/file.tfvars"), Path::new("/a/b")),
            PathBuf::from("../../x/file.tfvars")
        );
    }
}
