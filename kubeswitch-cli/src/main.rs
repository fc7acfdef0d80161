///! KubeSwitch CLI
///!
///! Command-line client for the KubeSwitch cluster access server

mod commands;

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use commands::Context;
use kubeswitch_cli::api::ApiClient;
use kubeswitch_cli::backend::Backend;
use kubeswitch_cli::config::Config;
use kubeswitch_cli::console::Console;
use kubeswitch_cli::gate::{Navigation, Route};
use kubeswitch_cli::logging::LoggingConfig;
use kubeswitch_cli::output::{self, OutputFormat};
use kubeswitch_cli::token_store::FileTokenStore;
use kubeswitch_common::{AuthError, DenyReason, Error, ServerError};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ks", author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Server URL (overrides the config file and KUBESWITCH_SERVER)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the CLI configuration (server URL)
    Init {
        /// Server URL; prompted for when omitted
        server_url: Option<String>,
    },
    /// Log in to the server
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Password (will be prompted if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Log out and forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Change your own password
    Passwd {
        #[arg(long)]
        old_password: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Pick a cluster and download its kubeconfig; prints the file path
    Select {
        /// Cluster name or id; an interactive list is shown when omitted
        cluster: Option<String>,
    },
    /// Manage clusters and their credentials
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
    /// Manage users (admin)
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Audit log operations (admin)
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// List clusters visible to you
    List,
    /// Register a cluster with its kubeconfig (admin)
    Create {
        name: String,
        /// Path to the kubeconfig file
        #[arg(short, long)]
        kubeconfig: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a cluster (admin)
    Delete {
        cluster: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print a cluster's kubeconfig
    Config {
        cluster: String,
    },
    /// Replace a cluster's kubeconfig (admin)
    Import {
        cluster: String,
        /// Path to the kubeconfig file
        file: String,
    },
    /// Show which users may access a cluster (admin)
    Grants {
        cluster: String,
    },
    /// Replace the users allowed on a cluster (admin)
    Grant {
        cluster: String,
        /// Usernames or ids; an interactive picker is shown when omitted
        #[arg(short, long = "user")]
        users: Vec<String>,
        /// Revoke every user
        #[arg(long, conflicts_with = "users")]
        none: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users
    List,
    /// Create a user
    Create {
        username: String,
        /// Password (will be prompted if not provided)
        #[arg(short, long)]
        password: Option<String>,
        /// Role (admin or user)
        #[arg(short, long, default_value = "user")]
        role: String,
    },
    /// Delete a user
    Delete {
        user: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Set a new password for a user
    ResetPassword {
        user: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change a user's role
    SetRole {
        user: String,
        /// admin or user
        role: String,
    },
    /// Show which clusters a user may access
    Grants {
        user: String,
    },
    /// Replace the clusters a user may access
    Grant {
        user: String,
        /// Cluster names or ids; an interactive picker is shown when omitted
        #[arg(short, long = "cluster")]
        clusters: Vec<String>,
        /// Revoke every cluster
        #[arg(long, conflicts_with = "clusters")]
        none: bool,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// List audit entries, most recent first
    List {
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only entries by this username
        #[arg(short, long)]
        user: Option<String>,
        /// Only entries with this action
        #[arg(short, long)]
        action: Option<String>,
    },
}

impl Commands {
    /// View a command belongs to; `None` for commands that need no session
    fn route(&self) -> Option<Route> {
        match self {
            Commands::Init { .. } | Commands::Logout | Commands::Completions { .. } => None,
            Commands::Login { .. } => Some(Route::Login),
            Commands::Whoami | Commands::Passwd { .. } => Some(Route::Profile),
            Commands::Select { .. } | Commands::Cluster { .. } => Some(Route::Clusters),
            Commands::User { .. } => Some(Route::Users),
            Commands::Audit { .. } => Some(Route::Audit),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        report(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let level = match cli.verbose {
        0 => config.log_level.clone(),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    };
    LoggingConfig::new(level)
        .with_json(cli.log_json || config.log_json())
        .init()?;

    let format = OutputFormat::parse(cli.output.as_deref().unwrap_or(&config.output));

    match cli.command {
        Commands::Completions { shell } => {
            generate_completions(shell);
            return Ok(());
        }
        Commands::Init { server_url } => return commands::init::handle_init(server_url, config),
        _ => {}
    }

    let api = ApiClient::new(&config.server_url, config.timeout())?;
    let backend: Arc<dyn Backend> = Arc::new(api);
    let mut console = Console::new(backend, FileTokenStore::new()?);
    console.start().await?;

    let mut ctx = Context {
        console,
        config,
        format,
    };

    if let Some(route) = cli.command.route() {
        match ctx.console.navigate(route) {
            Navigation::Proceed(_) => {}
            Navigation::Redirect { to: Route::Login, .. } => {
                return Err(Error::AccessDenied(DenyReason::NotAuthenticated).into());
            }
            Navigation::Redirect { to, .. } => {
                if route == Route::Login {
                    output::print_warning("Already logged in; run 'ks logout' to switch users");
                } else {
                    output::print_warning("This command requires the admin role");
                }
                if to == Route::Dashboard {
                    return commands::cluster::dashboard(&mut ctx).await;
                }
                return Ok(());
            }
        }
    }

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::handle_login(&mut ctx, username, password).await
        }
        Commands::Logout => commands::auth::handle_logout(&mut ctx).await,
        Commands::Whoami => commands::auth::handle_whoami(&mut ctx).await,
        Commands::Passwd {
            old_password,
            new_password,
        } => commands::auth::handle_passwd(&mut ctx, old_password, new_password).await,
        Commands::Select { cluster } => commands::select::handle_select(&mut ctx, cluster).await,
        Commands::Cluster { command } => {
            commands::cluster::handle_cluster_command(command, &mut ctx).await
        }
        Commands::User { command } => commands::user::handle_user_command(command, &mut ctx).await,
        Commands::Audit { command } => {
            commands::audit::handle_audit_command(command, &mut ctx).await
        }
        Commands::Init { .. } | Commands::Completions { .. } => Ok(()),
    }
}

/// Print an error in user terms
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(Error::AccessDenied(DenyReason::NotAuthenticated)) => {
            output::print_error("Not logged in. Use 'ks login' first");
        }
        Some(Error::Auth(AuthError::SessionExpired)) => {
            output::print_error("Session expired or revoked. Use 'ks login' to sign in again");
        }
        Some(Error::Server(ServerError::Validation(validation))) => {
            for line in validation.messages() {
                output::print_error(&line);
            }
        }
        _ => output::print_error(&format!("{:#}", err)),
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "ks", &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_routes() {
        let cli = Cli::parse_from(["ks", "user", "list"]);
        assert_eq!(cli.command.route(), Some(Route::Users));

        let cli = Cli::parse_from(["ks", "-o", "json", "select", "prod"]);
        assert_eq!(cli.command.route(), Some(Route::Clusters));
        assert_eq!(cli.output.as_deref(), Some("json"));

        let cli = Cli::parse_from(["ks", "logout"]);
        assert_eq!(cli.command.route(), None);
        assert!(!cli.log_json);

        let cli = Cli::parse_from(["ks", "whoami", "--log-json"]);
        assert!(cli.log_json);
    }

    #[test]
    fn test_grant_flags_conflict() {
        let conflicting = ["ks", "cluster", "grant", "prod", "--none", "-u", "alice"];
        assert!(Cli::try_parse_from(conflicting).is_err());
        let cli = Cli::parse_from(["ks", "user", "grant", "alice", "-c", "prod", "-c", "7"]);
        match cli.command {
            Commands::User {
                command: UserCommands::Grant { clusters, none, .. },
            } => {
                assert_eq!(clusters, vec!["prod", "7"]);
                assert!(!none);
            }
            _ => panic!("unexpected command"),
        }
    }
}
