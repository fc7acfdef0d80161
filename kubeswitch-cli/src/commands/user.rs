use super::cluster::UserRow;
use super::{password_or_prompt, resolve_cluster, resolve_user, Context};
use crate::UserCommands;
use anyhow::{anyhow, Result};
use dialoguer::{Confirm, MultiSelect};
use kubeswitch_cli::grants::GrantTarget;
use kubeswitch_cli::output;
use kubeswitch_common::{Cluster, Role};
use std::collections::BTreeSet;
use tabled::Tabled;

#[derive(Tabled)]
struct GrantedClusterRow {
    id: u64,
    name: String,
}

fn parse_role(role: &str) -> Result<Role> {
    role.parse::<Role>()
        .map_err(|_| anyhow!("Invalid role '{}': expected admin or user", role))
}

pub async fn handle_user_command(command: UserCommands, ctx: &mut Context) -> Result<()> {
    match command {
        UserCommands::List => {
            let users = ctx.console.list_users().await?;
            let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
            output::print_output(rows, users, ctx.format)?;
        }
        UserCommands::Create {
            username,
            password,
            role,
        } => {
            let role = parse_role(&role)?;
            let password = password_or_prompt(password, "Password", true)?;
            let user = ctx.console.create_user(&username, &password, role).await?;
            output::print_created("User", &user.username, user.id);
        }
        UserCommands::Delete { user, yes } => {
            let user = resolve_user(&mut ctx.console, &user).await?;
            if !yes
                && !Confirm::new()
                    .with_prompt(format!("Delete user '{}'?", user.username))
                    .default(false)
                    .interact()?
            {
                output::print_info("Aborted");
                return Ok(());
            }
            ctx.console.delete_user(user.id).await?;
            output::print_deleted("User", user.id);
        }
        UserCommands::ResetPassword { user, password } => {
            let user = resolve_user(&mut ctx.console, &user).await?;
            let password = password_or_prompt(password, "New password", true)?;
            ctx.console.reset_password(user.id, &password).await?;
            output::print_success(&format!("Password for '{}' reset", user.username));
        }
        UserCommands::SetRole { user, role } => {
            let role = parse_role(&role)?;
            let user = resolve_user(&mut ctx.console, &user).await?;
            ctx.console.set_role(user.id, role).await?;
            output::print_success(&format!("'{}' is now {}", user.username, role));
        }
        UserCommands::Grants { user } => {
            let user = resolve_user(&mut ctx.console, &user).await?;
            let granted = ctx.console.grants_for_user(user.id).await?;
            let clusters = ctx.console.list_clusters().await?;
            let granted: Vec<Cluster> = clusters
                .iter()
                .filter(|c| granted.contains(&c.id))
                .cloned()
                .collect();
            let rows: Vec<GrantedClusterRow> = granted
                .iter()
                .map(|c| GrantedClusterRow {
                    id: c.id,
                    name: c.name.clone(),
                })
                .collect();
            output::print_output(rows, &granted, ctx.format)?;
        }
        UserCommands::Grant { user, clusters, none } => {
            let user = resolve_user(&mut ctx.console, &user).await?;
            let mut editor = ctx.console.open_grant_editor(GrantTarget::User(user.id)).await?;

            let selection = if none {
                BTreeSet::new()
            } else if !clusters.is_empty() {
                let mut ids = BTreeSet::new();
                for reference in &clusters {
                    ids.insert(resolve_cluster(&mut ctx.console, reference).await?.id);
                }
                ids
            } else {
                let candidates: Vec<Cluster> = ctx.console.list_clusters().await?.to_vec();
                let labels: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
                let defaults: Vec<bool> = candidates
                    .iter()
                    .map(|c| editor.current().contains(&c.id))
                    .collect();
                let picked = MultiSelect::new()
                    .with_prompt(format!(
                        "Clusters '{}' may access (space to toggle)",
                        user.username
                    ))
                    .items(&labels)
                    .defaults(&defaults)
                    .interact()?;
                picked.into_iter().map(|i| candidates[i].id).collect()
            };

            let count = selection.len();
            ctx.console.commit_grant_editor(&mut editor, selection).await?;
            output::print_success(&format!(
                "'{}' now has access to {} cluster(s)",
                user.username, count
            ));
        }
    }
    Ok(())
}
