///! `ks select`: pick a cluster and download its kubeconfig
///!
///! The file path is the only thing written to stdout so the command can be
///! used as `export KUBECONFIG=$(ks select)`. Prompts and hints go to stderr.

use super::{resolve_cluster, Context};
use anyhow::{bail, Context as _, Result};
use colored::Colorize;
use dialoguer::Select;
use kubeswitch_cli::output;
use kubeswitch_common::{Cluster, Kubeconfig};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub async fn handle_select(ctx: &mut Context, cluster: Option<String>) -> Result<()> {
    let cluster = match cluster {
        Some(reference) => resolve_cluster(&mut ctx.console, &reference).await?,
        None => match pick_cluster(ctx).await? {
            Some(cluster) => cluster,
            None => return Ok(()),
        },
    };

    let cache_dir = ctx.config.kube_cache_dir()?;
    let blob = fetch_for_display(ctx, &cluster).await?;
    let path = write_kubeconfig(&cache_dir, &cluster.name, blob)?;

    println!("{}", path.display());

    eprintln!();
    let selected = format!("Selected cluster '{}'", cluster.name);
    eprintln!("{} {}", "✓".green().bold(), selected.green());
    eprintln!("Config downloaded to: {}", path.display());
    eprintln!();
    output::print_hint("To use this context in the current shell, run:");
    eprintln!("  {}", format!("export KUBECONFIG={}", path.display()).cyan());
    output::print_hint("Or add this alias to your shell profile for quicker switching:");
    eprintln!("  alias kss='export KUBECONFIG=$(ks select)'");
    Ok(())
}

/// Load the credential through the console's credential view
pub(super) async fn fetch_for_display<'a>(
    ctx: &'a mut Context,
    cluster: &Cluster,
) -> Result<&'a Kubeconfig> {
    let ticket = ctx.console.open_credential(cluster.id);
    match ctx.console.fetch_credential_for(ticket, cluster.id).await? {
        Some(blob) => Ok(blob),
        None => bail!("Selection changed while the kubeconfig for '{}' was loading", cluster.name),
    }
}

async fn pick_cluster(ctx: &mut Context) -> Result<Option<Cluster>> {
    let clusters = ctx.console.list_clusters().await?.to_vec();
    if clusters.is_empty() {
        output::print_warning("No clusters available. Ask an administrator for access");
        return Ok(None);
    }

    let labels: Vec<String> = clusters
        .iter()
        .map(|c| match c.description.as_deref() {
            Some(desc) if !desc.is_empty() => format!("{}  {}", c.name, desc.dimmed()),
            _ => c.name.clone(),
        })
        .collect();

    let choice = Select::new()
        .with_prompt("Select cluster")
        .items(&labels)
        .default(0)
        .interact_opt()?;

    Ok(choice.map(|i| clusters[i].clone()))
}

/// File name derived from the cluster name with anything outside
/// `[A-Za-z0-9._-]` replaced, so a name can never escape the cache dir
fn cache_file_name(cluster_name: &str) -> Result<String> {
    let stem: String = cluster_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        bail!("Cluster name '{}' cannot be used as a file name", cluster_name);
    }
    Ok(format!("{}.yaml", stem))
}

fn write_kubeconfig(cache_dir: &Path, cluster_name: &str, blob: &Kubeconfig) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir).with_context(|| format!("creating {}", cache_dir.display()))?;
    let path = cache_dir.join(cache_file_name(cluster_name)?);

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    file.write_all(blob.as_str().as_bytes())?;

    // An existing file keeps its old mode on open, so tighten it explicitly
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    debug!(path = %path.display(), bytes = blob.len(), "wrote kubeconfig");
    Ok(path)
}
