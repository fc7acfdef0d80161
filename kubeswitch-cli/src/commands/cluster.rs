use super::{resolve_cluster, resolve_user, Context};
use crate::ClusterCommands;
use anyhow::{Context as _, Result};
use dialoguer::{Confirm, MultiSelect};
use kubeswitch_cli::grants::GrantTarget;
use kubeswitch_cli::output::{self, format_optional_time, truncate};
use kubeswitch_common::{Cluster, Kubeconfig, User};
use std::collections::BTreeSet;
use std::io::Write;
use tabled::Tabled;

#[derive(Tabled)]
struct ClusterRow {
    id: u64,
    name: String,
    description: String,
    created: String,
}

impl From<&Cluster> for ClusterRow {
    fn from(c: &Cluster) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: truncate(c.description.as_deref().unwrap_or("-"), 40),
            created: format_optional_time(c.created_at),
        }
    }
}

#[derive(Tabled)]
pub(crate) struct UserRow {
    id: u64,
    username: String,
    role: String,
    created: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            role: u.role.to_string(),
            created: format_optional_time(u.created_at),
        }
    }
}

/// Landing view: who you are and what you can reach
pub async fn dashboard(ctx: &mut Context) -> Result<()> {
    if let Some(session) = ctx.console.session() {
        output::print_info(&format!("Logged in as {} ({})", username_of(ctx), session.role));
    }
    let clusters = ctx.console.list_clusters().await?;
    let rows: Vec<ClusterRow> = clusters.iter().map(ClusterRow::from).collect();
    output::print_output(rows, clusters, ctx.format)
}

fn username_of(ctx: &Context) -> String {
    ctx.console
        .profile()
        .map(|u| u.username.clone())
        .unwrap_or_else(|| "unknown user".to_string())
}

pub async fn handle_cluster_command(command: ClusterCommands, ctx: &mut Context) -> Result<()> {
    match command {
        ClusterCommands::List => {
            let clusters = ctx.console.list_clusters().await?;
            let rows: Vec<ClusterRow> = clusters.iter().map(ClusterRow::from).collect();
            output::print_output(rows, clusters, ctx.format)?;
        }
        ClusterCommands::Create {
            name,
            kubeconfig,
            description,
        } => {
            let blob = read_kubeconfig(&kubeconfig)?;
            let cluster = ctx.console.create_cluster(&name, description, blob).await?;
            output::print_created("Cluster", &cluster.name, cluster.id);
        }
        ClusterCommands::Delete { cluster, yes } => {
            let cluster = resolve_cluster(&mut ctx.console, &cluster).await?;
            if !yes
                && !Confirm::new()
                    .with_prompt(format!(
                        "Delete cluster '{}'? Its credential and all grants are removed",
                        cluster.name
                    ))
                    .default(false)
                    .interact()?
            {
                output::print_info("Aborted");
                return Ok(());
            }
            ctx.console.delete_cluster(cluster.id).await?;
            output::print_deleted("Cluster", cluster.id);
        }
        ClusterCommands::Config { cluster } => {
            let cluster = resolve_cluster(&mut ctx.console, &cluster).await?;
            let blob = super::select::fetch_for_display(ctx, &cluster).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(blob.as_str().as_bytes())?;
            if !blob.as_str().ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
        ClusterCommands::Import { cluster, file } => {
            let cluster = resolve_cluster(&mut ctx.console, &cluster).await?;
            let blob = read_kubeconfig(&file)?;
            ctx.console.import_credential(cluster.id, blob).await?;
            output::print_success(&format!("Kubeconfig for '{}' replaced", cluster.name));
        }
        ClusterCommands::Grants { cluster } => {
            let cluster = resolve_cluster(&mut ctx.console, &cluster).await?;
            let granted = ctx.console.grants_for_cluster(cluster.id).await?;
            let users = ctx.console.list_users().await?;
            let granted: Vec<User> = users
                .iter()
                .filter(|u| granted.contains(&u.id))
                .cloned()
                .collect();
            let rows: Vec<UserRow> = granted.iter().map(UserRow::from).collect();
            output::print_output(rows, &granted, ctx.format)?;
        }
        ClusterCommands::Grant { cluster, users, none } => {
            let cluster = resolve_cluster(&mut ctx.console, &cluster).await?;
            let target = GrantTarget::Cluster(cluster.id);
            let mut editor = ctx.console.open_grant_editor(target).await?;

            let selection = if none {
                BTreeSet::new()
            } else if !users.is_empty() {
                let mut ids = BTreeSet::new();
                for reference in &users {
                    ids.insert(resolve_user(&mut ctx.console, reference).await?.id);
                }
                ids
            } else {
                let candidates: Vec<User> = ctx.console.list_users().await?.to_vec();
                let labels: Vec<String> = candidates
                    .iter()
                    .map(|u| format!("{} ({})", u.username, u.role))
                    .collect();
                let defaults: Vec<bool> = candidates
                    .iter()
                    .map(|u| editor.current().contains(&u.id))
                    .collect();
                let picked = MultiSelect::new()
                    .with_prompt(format!("Users allowed on '{}' (space to toggle)", cluster.name))
                    .items(&labels)
                    .defaults(&defaults)
                    .interact()?;
                picked.into_iter().map(|i| candidates[i].id).collect()
            };

            let count = selection.len();
            ctx.console.commit_grant_editor(&mut editor, selection).await?;
            output::print_success(&format!(
                "'{}' is now granted to {} user(s)",
                cluster.name, count
            ));
        }
    }
    Ok(())
}

pub(crate) fn read_kubeconfig(path: &str) -> Result<Kubeconfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading kubeconfig {}", path))?;
    Ok(Kubeconfig::new(content))
}
