///! Command handlers for the `ks` binary

pub mod audit;
pub mod auth;
pub mod cluster;
pub mod init;
pub mod select;
pub mod user;

use anyhow::{anyhow, Result};
use dialoguer::Password;
use kubeswitch_cli::config::Config;
use kubeswitch_cli::console::Console;
use kubeswitch_cli::output::OutputFormat;
use kubeswitch_cli::token_store::FileTokenStore;
use kubeswitch_common::{Cluster, User};

/// Everything a command handler needs
pub struct Context {
    pub console: Console<FileTokenStore>,
    pub config: Config,
    pub format: OutputFormat,
}

/// Accept either a numeric id or a cluster name
pub async fn resolve_cluster(
    console: &mut Console<FileTokenStore>,
    reference: &str,
) -> Result<Cluster> {
    let clusters = console.list_clusters().await?;
    find_by_reference(clusters, reference, |c| c.id, |c| c.name.as_str())
        .cloned()
        .ok_or_else(|| anyhow!("Cluster '{}' not found", reference))
}

/// Accept either a numeric id or a username
pub async fn resolve_user(console: &mut Console<FileTokenStore>, reference: &str) -> Result<User> {
    let users = console.list_users().await?;
    find_by_reference(users, reference, |u| u.id, |u| u.username.as_str())
        .cloned()
        .ok_or_else(|| anyhow!("User '{}' not found", reference))
}

fn find_by_reference<'a, T>(
    items: &'a [T],
    reference: &str,
    id: impl Fn(&T) -> u64,
    name: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    if let Ok(wanted) = reference.parse::<u64>() {
        if let Some(found) = items.iter().find(|item| id(item) == wanted) {
            return Some(found);
        }
    }
    items.iter().find(|item| name(item) == reference)
}

/// Use the given value or prompt for it without echo
pub fn password_or_prompt(value: Option<String>, prompt: &str, confirm: bool) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }

    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation(
            format!("Confirm {}", prompt.to_lowercase()),
            "Passwords do not match",
        );
    }
    Ok(input.interact()?)
}
