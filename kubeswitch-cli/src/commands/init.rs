///! `ks init`: write the server URL into the CLI configuration

use anyhow::{bail, Result};
use dialoguer::Input;
use kubeswitch_cli::config::Config;
use kubeswitch_cli::output;

pub fn handle_init(server_url: Option<String>, mut config: Config) -> Result<()> {
    let url = match server_url {
        Some(url) => url,
        None => Input::<String>::new()
            .with_prompt("Server URL")
            .default(config.server_url.clone())
            .interact_text()?,
    };

    config.server_url = normalize_server_url(&url)?;
    let path = config.save()?;

    output::print_success(&format!("Configuration written to {}", path.display()));
    output::print_info(&format!("Server URL set to {}", config.server_url));
    Ok(())
}

fn normalize_server_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() {
        bail!("Server URL cannot be empty");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("Server URL must start with http:// or https://");
    }
    Ok(url.to_string())
}
