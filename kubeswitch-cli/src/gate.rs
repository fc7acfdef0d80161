///! Access gate and navigation guard
///!
///! `AccessGate::decide` is consulted before every sensitive call. Checks run
///! in a fixed order: session, then role, then (non-admins only) grants.

use crate::grants::GrantMatrix;
use kubeswitch_common::{capabilities_for, Capability, DenyReason, Error, Result, Role, Session};
use std::fmt;
use tracing::debug;

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(Error::AccessDenied(reason)),
        }
    }
}

#[derive(Clone)]
pub struct AccessGate {
    grants: GrantMatrix,
}

impl AccessGate {
    pub fn new(grants: GrantMatrix) -> Self {
        Self { grants }
    }

    /// Session and role checks only; never touches the network
    pub fn check_role(session: Option<&Session>, capability: Capability) -> Decision {
        let Some(session) = session else {
            return Decision::Deny(DenyReason::NotAuthenticated);
        };

        if !capabilities_for(Some(&session.role)).contains(&capability) {
            return Decision::Deny(DenyReason::InsufficientRole);
        }

        Decision::Allow
    }

    pub async fn decide(
        &self,
        session: Option<&Session>,
        capability: Capability,
        cluster_id: Option<u64>,
    ) -> Result<Decision> {
        let decision = Self::check_role(session, capability);
        if !decision.is_allowed() {
            debug!(%capability, ?decision, "denied before grant lookup");
            return Ok(decision);
        }

        let (Some(session), Some(cluster_id)) = (session, cluster_id) else {
            return Ok(Decision::Allow);
        };

        // Administrators see every cluster by definition
        if session.role == Role::Admin {
            return Ok(Decision::Allow);
        }

        let granted = self.grants.own_grants().await?;
        if granted.contains(&cluster_id) {
            Ok(Decision::Allow)
        } else {
            debug!(cluster_id, "no grant for cluster");
            Ok(Decision::Deny(DenyReason::NoGrant))
        }
    }
}

/// Views reachable in the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Clusters,
    Users,
    Audit,
    Profile,
}

impl Route {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Users | Route::Audit)
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
            Route::Clusters => "/clusters",
            Route::Users => "/users",
            Route::Audit => "/audit",
            Route::Profile => "/profile",
        }
    }

    /// Unknown paths fall back to the dashboard
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/clusters" => Route::Clusters,
            "/users" => Route::Users,
            "/audit" => Route::Audit,
            "/profile" => Route::Profile,
            _ => Route::Dashboard,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Anonymous,
    Authenticated,
    AuthenticatedAdmin,
}

impl GuardState {
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            None => GuardState::Anonymous,
            Some(s) if s.is_admin() => GuardState::AuthenticatedAdmin,
            Some(_) => GuardState::Authenticated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed(Route),
    /// Go elsewhere; `then` is where to continue after logging in
    Redirect { to: Route, then: Option<Route> },
}

/// Navigation state machine wrapped around the access gate.
///
/// Sending a plain user to an admin view is a soft redirect to the
/// dashboard, not an error; data calls are still gated separately.
#[derive(Debug)]
pub struct NavigationGuard {
    state: GuardState,
    return_to: Option<Route>,
    pending_redirect: Option<Route>,
}

impl NavigationGuard {
    pub fn new(session: Option<&Session>) -> Self {
        Self {
            state: GuardState::from_session(session),
            return_to: None,
            pending_redirect: None,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn navigate(&mut self, to: Route) -> Navigation {
        match self.state {
            GuardState::Anonymous if to.requires_auth() => {
                self.return_to = Some(to);
                Navigation::Redirect {
                    to: Route::Login,
                    then: Some(to),
                }
            }
            GuardState::Authenticated if to.requires_admin() => Navigation::Redirect {
                to: Route::Dashboard,
                then: None,
            },
            GuardState::Authenticated | GuardState::AuthenticatedAdmin if to == Route::Login => {
                Navigation::Redirect {
                    to: Route::Dashboard,
                    then: None,
                }
            }
            _ => Navigation::Proceed(to),
        }
    }

    /// Returns the view to open next: the one that bounced to login, or the dashboard
    pub fn on_login(&mut self, role: Role) -> Route {
        self.state = if role.is_admin() {
            GuardState::AuthenticatedAdmin
        } else {
            GuardState::Authenticated
        };
        self.pending_redirect = None;

        match self.return_to.take() {
            Some(route) if !(route.requires_admin() && !role.is_admin()) => route,
            _ => Route::Dashboard,
        }
    }

    pub fn on_logout(&mut self) {
        self.state = GuardState::Anonymous;
        self.return_to = None;
    }

    /// The server rejected the token: drop to anonymous and schedule the login view
    pub fn on_auth_invalid(&mut self) {
        self.state = GuardState::Anonymous;
        self.pending_redirect = Some(Route::Login);
    }

    /// Consume the scheduled redirect, if any
    pub fn take_pending_redirect(&mut self) -> Option<Route> {
        self.pending_redirect.take()
    }
}
