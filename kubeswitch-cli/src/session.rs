///! Session lifecycle: login, persistence, profile, logout
///!
///! `SessionManager` is the only owner of session state. The persisted
///! token/role record and the backend's bearer token are always installed and
///! removed together.

use crate::backend::Backend;
use crate::token_store::{StoredAuth, TokenStore};
use chrono::Utc;
use kubeswitch_common::auth::LoginRequest;
use kubeswitch_common::{ChangePasswordRequest, DenyReason, Error, Profile, Result, Session};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionManager<S: TokenStore> {
    backend: Arc<dyn Backend>,
    store: S,
    profile: Option<Profile>,
}

impl<S: TokenStore> SessionManager<S> {
    pub fn new(backend: Arc<dyn Backend>, store: S) -> Self {
        Self {
            backend,
            store,
            profile: None,
        }
    }

    /// Reinstall a persisted session after a restart.
    ///
    /// A record missing its token or role is discarded.
    pub async fn restore(&mut self) -> Result<Option<Session>> {
        match self.store.load()? {
            Some(auth) => {
                self.backend.set_token(Some(auth.token.clone())).await;
                debug!(role = %auth.role, "restored persisted session");
                Ok(Some(self.session_from(auth)))
            }
            None => {
                self.store.clear()?;
                self.backend.set_token(None).await;
                Ok(None)
            }
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Session> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self.backend.login(&request).await.map_err(|e| {
            warn!(username, error = %e, "login failed");
            e
        })?;

        let auth = StoredAuth {
            token: response.token,
            role: response.role,
            issued_at: Utc::now(),
        };
        self.store.save(&auth)?;
        self.backend.set_token(Some(auth.token.clone())).await;
        self.profile = None;

        match response.user {
            Some(user) => self.profile = Some(Profile::from(user)),
            None => {
                if let Err(e) = self.refresh_profile().await {
                    warn!(error = %e, "logged in but could not load profile");
                }
            }
        }

        info!(username, role = %auth.role, "logged in");
        Ok(self.session_from(auth))
    }

    /// Best-effort server notification, then an unconditional local clear.
    ///
    /// Only a failure to remove the local record is reported.
    pub async fn logout(&mut self) -> Result<()> {
        if self.current_session().is_some() {
            if let Err(e) = self.backend.logout().await {
                warn!(error = %e, "server logout failed, clearing local session anyway");
            }
        }

        self.clear_local().await?;
        info!("logged out");
        Ok(())
    }

    /// Drop the session after the server rejected its token
    pub async fn invalidate(&mut self) -> Result<()> {
        warn!("session rejected by server, clearing credentials");
        self.clear_local().await
    }

    /// Re-fetch the profile; on failure the previous profile stays in place
    pub async fn refresh_profile(&mut self) -> Result<Profile> {
        let profile = self.backend.current_user().await?;
        self.profile = Some(profile.clone());
        Ok(profile)
    }

    pub async fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        if self.current_session().is_none() {
            return Err(Error::AccessDenied(DenyReason::NotAuthenticated));
        }

        let request = ChangePasswordRequest {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.backend.change_password(&request).await
    }

    /// Read of the persisted state; never touches the network
    pub fn current_session(&self) -> Option<Session> {
        match self.store.load() {
            Ok(auth) => auth.map(|a| self.session_from(a)),
            Err(e) => {
                warn!(error = %e, "cannot read session record");
                None
            }
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    async fn clear_local(&mut self) -> Result<()> {
        self.profile = None;
        self.backend.set_token(None).await;
        self.store.clear()
    }

    fn session_from(&self, auth: StoredAuth) -> Session {
        Session {
            token: auth.token,
            user_id: self.profile.as_ref().and_then(|p| p.id),
            role: auth.role,
            issued_at: auth.issued_at,
        }
    }
}
