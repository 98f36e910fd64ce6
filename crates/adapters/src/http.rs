use std::time::Duration;

use async_trait::async_trait;
use dbcopilot_core::api::{
    Ack, ApiError, ApiOperation, ChatRequest, ChatResponse, ConnectionCreated, ConnectionList,
    CopilotApi, CreateConnectionRequest, ErrorBody, LoginRequest, LoginResponse, SignoutRequest,
    SignupRequest, SignupResponse,
};
use dbcopilot_core::config::ApiSettings;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

const SIGNUP_PATH: &str = "/api/signup";
const LOGIN_PATH: &str = "/api/login";
const SIGNOUT_PATH: &str = "/api/signout";
const CREATE_CONNECTION_PATH: &str = "/api/database/create_connection";
const CONNECTIONS_PATH: &str = "/api/database/connections";
const CHAT_PATH: &str = "/api/chat";

/// `reqwest` client for the Database Copilot backend.
#[derive(Debug, Clone)]
pub struct HttpCopilotApi {
    base_url: String,
    client: Client,
}

impl HttpCopilotApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, ApiError> {
        Self::new(settings.base_url.clone(), settings.timeout())
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
        operation: ApiOperation,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = with_bearer(self.client.post(self.url(path)).json(body), bearer);
        send(request, path, operation).await
    }

    async fn get_json<T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        operation: ApiOperation,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let request = with_bearer(self.client.get(self.url(path)), bearer);
        send(request, path, operation).await
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) if !token.is_empty() => request.bearer_auth(token),
        _ => request,
    }
}

async fn send<T>(request: RequestBuilder, path: &str, operation: ApiOperation) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    tracing::debug!(path, "sending backend request");
    let response = request.send().await.map_err(to_transport_error)?;
    decode(response, operation).await
}

async fn decode<T>(response: Response, operation: ApiOperation) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.bytes().await.map_err(to_transport_error)?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_detail);
        tracing::debug!(status = status.as_u16(), ?detail, "backend rejected request");
        return Err(ApiError::rejected(status.as_u16(), detail, operation));
    }

    serde_json::from_slice(&body).map_err(|error| ApiError::Decode(error.to_string()))
}

fn to_transport_error(error: reqwest::Error) -> ApiError {
    ApiError::Transport(error.to_string())
}

#[async_trait]
impl CopilotApi for HttpCopilotApi {
    async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ApiError> {
        self.post_json(SIGNUP_PATH, request, None, ApiOperation::Signup)
            .await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.post_json(LOGIN_PATH, request, None, ApiOperation::Login)
            .await
    }

    async fn signout(&self, request: &SignoutRequest) -> Result<Ack, ApiError> {
        self.post_json(SIGNOUT_PATH, request, None, ApiOperation::Signout)
            .await
    }

    async fn create_connection(
        &self,
        request: &CreateConnectionRequest,
    ) -> Result<ConnectionCreated, ApiError> {
        self.post_json(
            CREATE_CONNECTION_PATH,
            request,
            None,
            ApiOperation::CreateConnection,
        )
        .await
    }

    async fn list_connections(&self, access_token: &str) -> Result<ConnectionList, ApiError> {
        self.get_json(
            CONNECTIONS_PATH,
            Some(access_token),
            ApiOperation::ListConnections,
        )
        .await
    }

    async fn chat(
        &self,
        access_token: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ApiError> {
        self.post_json(CHAT_PATH, request, Some(access_token), ApiOperation::Chat)
            .await
    }
}
