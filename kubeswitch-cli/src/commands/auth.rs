///! Authentication commands

use super::{password_or_prompt, Context};
use anyhow::Result;
use dialoguer::Input;
use kubeswitch_cli::output;
use serde::Serialize;

#[derive(Serialize)]
struct Whoami<'a> {
    server: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    username: &'a str,
    role: &'a str,
    logged_in: String,
}

pub async fn handle_login(
    ctx: &mut Context,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => Input::<String>::new().with_prompt("Username").interact_text()?,
    };
    let password = password_or_prompt(password, "Password", false)?;

    let (session, _next) = ctx.console.login(&username, &password).await?;

    output::print_success("Login successful");
    println!("  Username: {}", username);
    println!("  Role: {}", session.role);
    Ok(())
}

pub async fn handle_logout(ctx: &mut Context) -> Result<()> {
    ctx.console.logout().await?;
    output::print_success("Logged out");
    Ok(())
}

pub async fn handle_whoami(ctx: &mut Context) -> Result<()> {
    let Some(session) = ctx.console.session() else {
        output::print_info("Not logged in. Use 'ks login' to authenticate");
        return Ok(());
    };

    let profile = ctx.console.refresh_profile().await?;
    let summary = Whoami {
        server: &ctx.config.server_url,
        id: profile.id,
        username: &profile.username,
        role: profile.role.as_str(),
        logged_in: output::format_relative_time(session.issued_at),
    };

    if ctx.format == output::OutputFormat::Table {
        println!("Server:    {}", summary.server);
        println!("Username:  {}", summary.username);
        if let Some(id) = summary.id {
            println!("User ID:   {}", id);
        }
        println!("Role:      {}", summary.role);
        println!("Logged in: {}", summary.logged_in);
    } else {
        output::print_single(&summary, ctx.format)?;
    }
    Ok(())
}

pub async fn handle_passwd(
    ctx: &mut Context,
    old_password: Option<String>,
    new_password: Option<String>,
) -> Result<()> {
    let old_password = password_or_prompt(old_password, "Current password", false)?;
    let new_password = password_or_prompt(new_password, "New password", true)?;

    ctx.console.change_password(&old_password, &new_password).await?;
    output::print_success("Password changed");
    Ok(())
}
