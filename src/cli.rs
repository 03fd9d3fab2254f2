use clap::Parser;
use indexmap::IndexMap;
use std::path::PathBuf;

use crate::orchestrator::Invocation;

/// tfwrap - a Terraform wrapper facilitating configurations for various environments
#[derive(Parser)]
#[command(name = "tfwrap")]
#[command(about = "Runs Terraform against multiple environments from one templated config")]
#[command(version)]
pub struct Cli {
    /// Config file to be used
    #[arg(short, long, default_value = "tfwrap.yaml")]
    pub config: PathBuf,

    /// Params for templating in the config file. May be specified multiple times
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// The module directory to run Terraform in
    #[arg(short, long)]
    pub module_dir: PathBuf,

    /// Print additional debug output to stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Skip the backend drift check
    #[arg(long)]
    pub skip_backend_check: bool,

    /// Do not inject variables, var files, or backend settings
    #[arg(long)]
    pub no_vars: bool,

    /// Arguments forwarded to Terraform
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("no value specified for {raw:?}, expected KEY=VALUE")),
    }
}

impl Cli {
    pub fn into_invocation(self) -> Invocation {
        let params: IndexMap<String, String> = self.params.into_iter().collect();
        Invocation {
            config_file: self.config,
            module_dir: self.module_dir,
            params,
            skip_backend_check: self.skip_backend_check,
            no_vars: self.no_vars,
            args: self.args,
        }
    }
}
