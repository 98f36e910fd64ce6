use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{DatabaseProvider, DatabaseType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignoutRequest {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateConnectionRequest {
    pub db_type: DatabaseType,
    pub db_provider: DatabaseProvider,
    pub db_name: String,
    pub credentials: BTreeMap<String, String>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionCreated {
    pub connection_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionSummary {
    pub id: String,
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub db_provider_name: String,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionList {
    #[serde(default)]
    pub connections: Vec<ConnectionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub connection_id: String,
    pub model_provider: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub tool_calls: Vec<serde_json::Value>,
}

/// Which backend call failed; picks the fallback message when the error body
/// carries no `detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    Signup,
    Login,
    Signout,
    CreateConnection,
    ListConnections,
    Chat,
}

impl ApiOperation {
    #[must_use]
    pub fn fallback_detail(self) -> &'static str {
        match self {
            Self::Signup => "Signup failed",
            Self::Login => "Login failed",
            Self::Signout => "Signout failed",
            Self::CreateConnection => "Connection failed",
            Self::ListConnections | Self::Chat => "Request failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("could not reach the backend: {0}")]
    Transport(String),
    #[error("unexpected response from the backend: {0}")]
    Decode(String),
}

impl ApiError {
    /// Builds the error for a non-2xx response, keeping the body's `detail`
    /// verbatim when present.
    #[must_use]
    pub fn rejected(status: u16, detail: Option<String>, operation: ApiOperation) -> Self {
        let detail = detail
            .filter(|detail| !detail.trim().is_empty())
            .unwrap_or_else(|| operation.fallback_detail().to_string());
        Self::Rejected { status, detail }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

/// Error body shape shared by every backend endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// `detail` is normally a string; validation errors send a structure, which
    /// is rendered as compact JSON instead.
    #[must_use]
    pub fn into_detail(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(detail) => Some(detail),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
pub trait CopilotApi: Send + Sync {
    async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ApiError>;
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;
    async fn signout(&self, request: &SignoutRequest) -> Result<Ack, ApiError>;
    async fn create_connection(
        &self,
        request: &CreateConnectionRequest,
    ) -> Result<ConnectionCreated, ApiError>;
    async fn list_connections(&self, access_token: &str) -> Result<ConnectionList, ApiError>;
    async fn chat(&self, access_token: &str, request: &ChatRequest)
        -> Result<ChatResponse, ApiError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{
        Ack, ApiError, ChatRequest, ChatResponse, ConnectionCreated, ConnectionList,
        CopilotApi, CreateConnectionRequest, LoginRequest, LoginResponse, SignoutRequest,
        SignupRequest, SignupResponse, User,
    };

    /// Scripted backend counting every call it receives.
    #[derive(Debug, Default)]
    pub(crate) struct FakeApi {
        pub calls: AtomicUsize,
        pub fail_with: Mutex<Option<ApiError>>,
        pub connection_id: Mutex<Option<String>>,
        pub last_create: Mutex<Option<CreateConnectionRequest>>,
        pub last_signout: Mutex<Option<SignoutRequest>>,
        pub chat_reply: Mutex<Option<String>>,
    }

    impl FakeApi {
        pub(crate) fn failing(error: ApiError) -> Self {
            Self {
                fail_with: Mutex::new(Some(error)),
                ..Self::default()
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }

        fn record(&self) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match self.fail_with.lock().expect("fake lock").clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    pub(crate) fn sample_user() -> User {
        User {
            id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            name: Some("Ada".to_string()),
        }
    }

    #[async_trait]
    impl CopilotApi for FakeApi {
        async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ApiError> {
            self.record()?;
            Ok(SignupResponse {
                message: Some("User registered successfully".to_string()),
                user: User {
                    id: "user-1".to_string(),
                    email: request.email.clone(),
                    name: Some(request.name.clone()),
                },
            })
        }

        async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
            self.record()?;
            Ok(LoginResponse {
                user: User {
                    email: request.email.clone(),
                    ..sample_user()
                },
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
            })
        }

        async fn signout(&self, request: &SignoutRequest) -> Result<Ack, ApiError> {
            *self.last_signout.lock().expect("fake lock") = Some(request.clone());
            self.record()?;
            Ok(Ack { message: None })
        }

        async fn create_connection(
            &self,
            request: &CreateConnectionRequest,
        ) -> Result<ConnectionCreated, ApiError> {
            *self.last_create.lock().expect("fake lock") = Some(request.clone());
            self.record()?;
            Ok(ConnectionCreated {
                connection_id: self
                    .connection_id
                    .lock()
                    .expect("fake lock")
                    .clone()
                    .unwrap_or_else(|| "abc123".to_string()),
                message: None,
            })
        }

        async fn list_connections(&self, _access_token: &str) -> Result<ConnectionList, ApiError> {
            self.record()?;
            Ok(ConnectionList::default())
        }

        async fn chat(
            &self,
            _access_token: &str,
            request: &ChatRequest,
        ) -> Result<ChatResponse, ApiError> {
            self.record()?;
            let reply = self
                .chat_reply
                .lock()
                .expect("fake lock")
                .clone()
                .unwrap_or_else(|| format!("echo: {}", request.message));
            Ok(ChatResponse {
                response: reply,
                tool_calls: Vec::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, ApiOperation, ConnectionList, ErrorBody, LoginResponse};

    #[test]
    fn rejected_keeps_detail_verbatim() {
        let error = ApiError::rejected(
            400,
            Some("Invalid login credentials".to_string()),
            ApiOperation::Login,
        );
        assert_eq!(error.to_string(), "Invalid login credentials");
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn rejected_falls_back_per_operation() {
        let error = ApiError::rejected(500, None, ApiOperation::CreateConnection);
        assert_eq!(error.to_string(), "Connection failed");

        let error = ApiError::rejected(500, Some("  ".to_string()), ApiOperation::Chat);
        assert_eq!(error.to_string(), "Request failed");
    }

    #[test]
    fn error_body_detail_handles_structured_payloads() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"Connection not found"}"#).expect("valid json");
        assert_eq!(body.into_detail().as_deref(), Some("Connection not found"));

        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":[{"msg":"field required"}]}"#).expect("valid json");
        assert_eq!(
            body.into_detail().as_deref(),
            Some(r#"[{"msg":"field required"}]"#)
        );

        let body: ErrorBody = serde_json::from_str("{}").expect("valid json");
        assert!(body.into_detail().is_none());
    }

    #[test]
    fn login_response_accepts_missing_refresh_token() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"message":"Login successful","access_token":"a","user":{"id":"u","email":"e@x.io"}}"#,
        )
        .expect("valid login payload");
        assert_eq!(response.access_token, "a");
        assert!(response.refresh_token.is_none());
        assert!(response.user.name.is_none());
    }

    #[test]
    fn connection_list_defaults_to_empty() {
        let list: ConnectionList = serde_json::from_str("{}").expect("valid json");
        assert!(list.connections.is_empty());
    }
}
