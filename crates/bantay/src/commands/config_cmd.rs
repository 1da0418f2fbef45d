//! Config subcommand handlers.

use dialoguer::Password;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// Copy of `cfg` safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    if out.cloud.api_key.is_some() {
        out.cloud.api_key = Some("****".into());
    }
    out
}

fn render_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg).map_err(|e| CliError::Config {
        message: e.to_string(),
    })
}

fn init(force: bool, global: &GlobalOpts) -> Result<String, CliError> {
    let path = config::config_path(global);
    if path.exists() && !force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }
    bantay_config::save_config(&Config::default(), &path)?;
    Ok(format!("Wrote default config to {}", path.display()))
}

fn set_key() -> Result<String, CliError> {
    let key = Password::new()
        .with_prompt("Cloud API key")
        .interact()
        .map_err(|e| CliError::Validation {
            field: "interactive".into(),
            reason: format!("prompt failed: {e}"),
        })?;
    if key.is_empty() {
        return Err(CliError::Validation {
            field: "api key".into(),
            reason: "cannot be empty".into(),
        });
    }
    bantay_config::store_cloud_api_key(&key)?;
    Ok("Cloud API key stored in system keyring".into())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        ConfigCommand::Init { force } => init(force, global)?,
        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            match global.output {
                OutputFormat::Table | OutputFormat::Plain => render_toml(&cfg)?,
                _ => output::render_single(&global.output, &cfg, |_| String::new())?,
            }
        }
        ConfigCommand::Path => config::config_path(global).display().to_string(),
        ConfigCommand::SetKey => set_key()?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_masked() {
        let mut cfg = Config::default();
        cfg.cloud.api_key = Some("hunter2".into());
        let text = render_toml(&redacted(&cfg)).unwrap_or_default();
        assert!(text.contains("****"));
        assert!(!text.contains("hunter2"));
    }
}
