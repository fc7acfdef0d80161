///! Client-side input checks run before a request is sent
///!
///! The server stays authoritative; these only catch obvious mistakes early.

use kubeswitch_common::Error;
use regex::Regex;
use std::sync::LazyLock;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 20;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_CLUSTER_NAME_LENGTH: usize = 50;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_]+$").unwrap()
});

/// Top-level keys a kubeconfig document must carry
const KUBECONFIG_MARKERS: [&str; 3] = ["apiVersion", "kind", "clusters"];

pub type ValidationResult<T> = Result<T, Error>;

pub fn validate_username(username: &str) -> ValidationResult<()> {
    if username.is_empty() {
        return Err(Error::InvalidInput("username cannot be empty".to_string()));
    }

    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "username must be {}-{} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(Error::InvalidInput(
            "username may only contain letters, digits and underscores".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_cluster_name(name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("cluster name cannot be empty".to_string()));
    }

    if name.chars().count() > MAX_CLUSTER_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "cluster name too long (max {} characters)",
            MAX_CLUSTER_NAME_LENGTH
        )));
    }

    Ok(())
}

/// Superficial structural check: every marker must appear as an unindented
/// `key:` line. Anything deeper is left to the server.
pub fn validate_kubeconfig(content: &str) -> ValidationResult<()> {
    if content.trim().is_empty() {
        return Err(Error::InvalidInput("kubeconfig is empty".to_string()));
    }

    let missing: Vec<&str> = KUBECONFIG_MARKERS
        .iter()
        .copied()
        .filter(|marker| !has_top_level_key(content, marker))
        .collect();

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "kubeconfig is missing top-level keys: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

fn has_top_level_key(content: &str, key: &str) -> bool {
    content.lines().any(|line| {
        line.strip_prefix(key)
            .map(|rest| rest.trim_start().starts_with(':'))
            .unwrap_or(false)
    })
}
