use super::Context;
use crate::AuditCommands;
use anyhow::Result;
use kubeswitch_cli::output::{self, format_relative_time, truncate};
use kubeswitch_common::AuditEntry;
use tabled::Tabled;

#[derive(Tabled)]
struct AuditEntryRow {
    time: String,
    user: String,
    action: String,
    detail: String,
    #[tabled(rename = "source")]
    source_address: String,
}

impl From<&AuditEntry> for AuditEntryRow {
    fn from(e: &AuditEntry) -> Self {
        Self {
            time: format_relative_time(e.created_at),
            user: display_user(e),
            action: e.action.clone(),
            detail: truncate(&e.detail, 60),
            source_address: e.source_address.clone(),
        }
    }
}

/// Username when the server joined it in, otherwise the raw id.
/// A deleted account comes back as a user with an empty name.
fn display_user(entry: &AuditEntry) -> String {
    entry
        .user
        .as_ref()
        .filter(|u| !u.username.is_empty())
        .map(|u| u.username.clone())
        .unwrap_or_else(|| format!("#{}", entry.user_id))
}

fn filter_entries(
    entries: Vec<AuditEntry>,
    user: Option<&str>,
    action: Option<&str>,
    limit: Option<usize>,
) -> Vec<AuditEntry> {
    entries
        .into_iter()
        .filter(|e| user.map_or(true, |u| e.user.as_ref().is_some_and(|eu| eu.username == u)))
        .filter(|e| action.map_or(true, |a| e.action.eq_ignore_ascii_case(a)))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

pub async fn handle_audit_command(command: AuditCommands, ctx: &mut Context) -> Result<()> {
    match command {
        AuditCommands::List { limit, user, action } => {
            let entries = ctx.console.audit_log().await?;
            let entries = filter_entries(entries, user.as_deref(), action.as_deref(), limit);
            let rows: Vec<AuditEntryRow> = entries.iter().map(AuditEntryRow::from).collect();
            output::print_output(rows, &entries, ctx.format)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use kubeswitch_common::AuditUser;

    fn entry(id: u64, username: Option<&str>, action: &str) -> AuditEntry {
        AuditEntry {
            id,
            user_id: id,
            user: username.map(|u| AuditUser {
                username: u.to_string(),
            }),
            action: action.to_string(),
            detail: format!("entry {}", id),
            source_address: "10.0.0.1".to_string(),
            created_at: Utc::now() - Duration::minutes(id as i64),
        }
    }

    #[test]
    fn test_filters_keep_order() {
        let entries = vec![
            entry(1, Some("admin"), "Login"),
            entry(2, Some("alice"), "GetConfig"),
            entry(3, None, "Login"),
            entry(4, Some("admin"), "CreateCluster"),
        ];

        let admin = filter_entries(entries.clone(), Some("admin"), None, None);
        assert_eq!(admin.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 4]);

        let logins = filter_entries(entries.clone(), None, Some("login"), Some(1));
        assert_eq!(logins.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_row_falls_back_to_user_id() {
        let row = AuditEntryRow::from(&entry(3, None, "Login"));
        assert_eq!(row.user, "#3");
        assert_eq!(row.time, "3m ago");

        let row = AuditEntryRow::from(&entry(5, Some(""), "Login"));
        assert_eq!(row.user, "#5");
    }
}
