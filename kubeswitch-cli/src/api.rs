///! HTTP client for the KubeSwitch server

use crate::backend::Backend;
use async_trait::async_trait;
use kubeswitch_common::auth::{LoginRequest, LoginResponse};
use kubeswitch_common::{
    AuditEntry, AuthError, ChangePasswordRequest, Cluster, ClusterPermissions,
    CreateClusterRequest, CreateUserRequest, Error, Kubeconfig, KubeconfigPayload,
    Profile, ResetPasswordRequest, Result, Role, ServerError, TransportError, UpdateRoleRequest,
    User, UserPermissions, ValidationError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the current token
    pub async fn get_token(&self) -> Option<String> {
        let t = self.token.read().await;
        t.clone()
    }

    /// Build request with authentication header
    async fn build_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/api{}", self.base_url, path);
        debug!(%method, path, "sending request");
        let mut request = self.client.request(method, &url);

        if let Some(token) = self.get_token().await {
            request = request.bearer_auth(token);
        }

        request
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(path, status, "request rejected by server");
            return Err(classify_failure(status, &body));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        parse_body(status, &body)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.build_request(reqwest::Method::GET, path).await;
        let response = self.send(request, path).await?;
        Self::decode(response).await
    }

    /// GET a collection; an empty one may arrive as `null`
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let items: Option<Vec<T>> = self.get(path).await?;
        Ok(items.unwrap_or_default())
    }

    pub async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.build_request(reqwest::Method::POST, path).await.json(body);
        let response = self.send(request, path).await?;
        Self::decode(response).await
    }

    pub async fn post_empty<B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let request = self.build_request(reqwest::Method::POST, path).await.json(body);
        self.send(request, path).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let request = self.build_request(reqwest::Method::DELETE, path).await;
        self.send(request, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn set_token(&self, token: Option<String>) {
        let mut t = self.token.write().await;
        *t = token;
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        match self.post("/login", request).await {
            Err(Error::Auth(AuthError::SessionExpired)) => {
                Err(Error::Auth(AuthError::InvalidCredentials))
            }
            other => other,
        }
    }

    async fn logout(&self) -> Result<()> {
        self.post_empty("/logout", &serde_json::json!({})).await
    }

    async fn current_user(&self) -> Result<Profile> {
        self.get("/my/user").await
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<()> {
        self.post_empty("/my/password", request).await
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        self.get_list("/clusters").await
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Cluster> {
        self.post("/clusters", request).await
    }

    async fn delete_cluster(&self, cluster_id: u64) -> Result<()> {
        self.delete(&format!("/clusters/{}", cluster_id)).await
    }

    async fn get_kubeconfig(&self, cluster_id: u64) -> Result<Kubeconfig> {
        let payload: KubeconfigPayload = self
            .get(&format!("/clusters/{}/config", cluster_id))
            .await?;
        Ok(payload.kubeconfig)
    }

    async fn import_kubeconfig(&self, cluster_id: u64, kubeconfig: &Kubeconfig) -> Result<()> {
        let payload = KubeconfigPayload {
            kubeconfig: kubeconfig.clone(),
        };
        self.post_empty(&format!("/clusters/{}/import", cluster_id), &payload)
            .await
    }

    async fn cluster_permissions(&self, cluster_id: u64) -> Result<Vec<u64>> {
        let perms: ClusterPermissions = self
            .get(&format!("/clusters/{}/permissions", cluster_id))
            .await?;
        Ok(perms.user_ids)
    }

    async fn set_cluster_permissions(&self, cluster_id: u64, user_ids: &[u64]) -> Result<()> {
        let payload = ClusterPermissions {
            user_ids: user_ids.to_vec(),
        };
        self.post_empty(&format!("/clusters/{}/permissions", cluster_id), &payload)
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.get_list("/users").await
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<User> {
        self.post("/users", request).await
    }

    async fn delete_user(&self, user_id: u64) -> Result<()> {
        self.delete(&format!("/users/{}", user_id)).await
    }

    async fn reset_password(&self, user_id: u64, new_password: &str) -> Result<()> {
        let payload = ResetPasswordRequest {
            new_password: new_password.to_string(),
        };
        self.post_empty(&format!("/users/{}/password", user_id), &payload)
            .await
    }

    async fn update_role(&self, user_id: u64, role: Role) -> Result<()> {
        self.post_empty(&format!("/users/{}/role", user_id), &UpdateRoleRequest { role })
            .await
    }

    async fn user_permissions(&self, user_id: u64) -> Result<Vec<u64>> {
        let perms: UserPermissions = self
            .get(&format!("/users/{}/permissions", user_id))
            .await?;
        Ok(perms.cluster_ids)
    }

    async fn set_user_permissions(&self, user_id: u64, cluster_ids: &[u64]) -> Result<()> {
        let payload = UserPermissions {
            cluster_ids: cluster_ids.to_vec(),
        };
        self.post_empty(&format!("/users/{}/permissions", user_id), &payload)
            .await
    }

    async fn audit_log(&self) -> Result<Vec<AuditEntry>> {
        self.get_list("/audit").await
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        warn!("request timed out");
        Error::Transport(TransportError::Timeout)
    } else {
        warn!(error = %err, "network failure");
        Error::Transport(TransportError::NetworkUnavailable)
    }
}

/// Decode a 2xx body; anything unreadable is reported as a server fault
pub(crate) fn parse_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        Error::Server(ServerError::Internal {
            status,
            message: format!("malformed response: {}", e),
        })
    })
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    errors: Option<BTreeMap<String, FieldMessages>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldMessages {
    One(String),
    Many(Vec<String>),
}

impl From<FieldMessages> for Vec<String> {
    fn from(m: FieldMessages) -> Self {
        match m {
            FieldMessages::One(s) => vec![s],
            FieldMessages::Many(v) => v,
        }
    }
}

/// Map a non-2xx response onto the client error taxonomy
pub(crate) fn classify_failure(status: u16, body: &str) -> Error {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let text = parsed.message.clone().or_else(|| parsed.error.clone());

    match status {
        400 | 422 => {
            let fields = parsed
                .errors
                .unwrap_or_default()
                .into_iter()
                .map(|(field, msgs)| (field, Vec::from(msgs)))
                .collect();
            Error::Server(ServerError::Validation(ValidationError {
                message: text.unwrap_or_else(|| "Invalid request parameters".to_string()),
                fields,
            }))
        }
        401 => Error::Auth(AuthError::SessionExpired),
        403 => Error::Server(ServerError::Forbidden(text.unwrap_or_else(|| {
            "You do not have permission to perform this operation".to_string()
        }))),
        404 => Error::Server(ServerError::NotFound(
            text.unwrap_or_else(|| "The requested resource does not exist".to_string()),
        )),
        _ => Error::Server(ServerError::Internal {
            status,
            message: text.unwrap_or_else(|| "Server error, please try again later".to_string()),
        }),
    }
}
