use thiserror::Error;

use crate::api::{ApiError, CopilotApi, LoginRequest, SignoutRequest, SignupRequest, User};
use crate::routes::Route;
use crate::session::{Session, SessionContext, SessionError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Passwords do not match!")]
    PasswordMismatch,
    #[error("{0} is required.")]
    MissingField(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("signed in, but the session could not be stored: {0}")]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<SignupRequest, AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::MissingField("Full name"));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::InvalidEmail);
        }
        if self.password.is_empty() {
            return Err(AuthError::MissingField("Password"));
        }
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        Ok(SignupRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, AuthError> {
        if !is_valid_email(&self.email) {
            return Err(AuthError::InvalidEmail);
        }
        if self.password.is_empty() {
            return Err(AuthError::MissingField("Password"));
        }

        Ok(LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// `local@domain.tld` with no whitespace anywhere.
#[must_use]
pub fn is_valid_email(raw: &str) -> bool {
    let email = raw.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

/// Creates the account; the user signs in separately afterwards.
pub async fn signup(api: &dyn CopilotApi, form: &SignupForm) -> Result<(User, Route), AuthError> {
    let request = form.validate()?;
    let response = api.signup(&request).await?;
    tracing::info!(user_id = %response.user.id, "account created");
    Ok((response.user, Route::Login))
}

pub async fn login(
    api: &dyn CopilotApi,
    session: &SessionContext,
    form: &LoginForm,
) -> Result<(User, Route), AuthError> {
    let request = form.validate()?;
    let response = api.login(&request).await?;
    let session_value = Session::from(response);
    let user = session_value.user.clone();
    session.store_session(session_value)?;
    tracing::info!(user_id = %user.id, "signed in");
    Ok((user, Route::Home))
}

#[derive(Debug)]
pub struct LogoutOutcome {
    pub route: Route,
    pub remote_error: Option<ApiError>,
    pub local_error: Option<SessionError>,
}

/// Signs out remotely when a token is stored, then always clears the local
/// session. Neither failure blocks the other step.
pub async fn logout(api: &dyn CopilotApi, session: &SessionContext) -> LogoutOutcome {
    let mut remote_error = None;
    if let Some(current) = session.current() {
        let request = SignoutRequest {
            access_token: current.access_token,
            refresh_token: current.refresh_token,
        };
        if let Err(error) = api.signout(&request).await {
            tracing::warn!(%error, "remote signout failed, clearing local session anyway");
            remote_error = Some(error);
        }
    }

    let local_error = session.clear().err();
    if let Some(error) = &local_error {
        tracing::error!(%error, "failed to clear stored session");
    } else {
        tracing::info!("signed out");
    }

    LogoutOutcome {
        route: Route::Landing,
        remote_error,
        local_error,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_email, login, logout, signup, AuthError, LoginForm, SignupForm};
    use crate::api::testing::FakeApi;
    use crate::api::ApiError;
    use crate::routes::Route;
    use crate::session::SessionContext;

    fn signup_form() -> SignupForm {
        SignupForm {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
        }
    }

    fn login_form() -> LoginForm {
        LoginForm {
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email(" ada@mail.example.io "));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.io"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada@.com"));
    }

    #[tokio::test]
    async fn signup_validation_blocks_network_call() {
        let api = FakeApi::default();
        let mut form = signup_form();
        form.confirm_password = "different".to_string();

        let err = signup(&api, &form).await.expect_err("mismatch blocks");
        assert!(matches!(err, AuthError::PasswordMismatch));
        assert_eq!(err.to_string(), "Passwords do not match!");

        form = signup_form();
        form.email = "not-an-email".to_string();
        assert!(matches!(
            signup(&api, &form).await,
            Err(AuthError::InvalidEmail)
        ));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn signup_routes_to_login() {
        let api = FakeApi::default();
        let (user, route) = signup(&api, &signup_form())
            .await
            .expect("signup succeeds");
        assert_eq!(route, Route::Login);
        assert_eq!(user.name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn login_stores_session_trio() {
        let api = FakeApi::default();
        let session = SessionContext::in_memory();

        let (_, route) = login(&api, &session, &login_form())
            .await
            .expect("login succeeds");
        assert_eq!(route, Route::Home);

        let stored = session.current().expect("session stored");
        assert_eq!(stored.access_token, "access");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(stored.user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn failed_login_leaves_session_empty() {
        let api = FakeApi::failing(ApiError::Rejected {
            status: 400,
            detail: "Invalid login credentials".to_string(),
        });
        let session = SessionContext::in_memory();

        let err = login(&api, &session, &login_form())
            .await
            .expect_err("login rejected");
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_session_even_when_signout_fails() {
        let session = SessionContext::in_memory();
        login(&FakeApi::default(), &session, &login_form())
            .await
            .expect("login succeeds");
        let mut receiver = session.subscribe();

        let api = FakeApi::failing(ApiError::Transport("connection refused".to_string()));
        let outcome = logout(&api, &session).await;

        assert_eq!(outcome.route, Route::Landing);
        assert!(outcome.remote_error.is_some());
        assert!(outcome.local_error.is_none());
        assert!(!session.is_authenticated());
        assert!(receiver.has_changed().expect("sender alive"));

        let sent = api
            .last_signout
            .lock()
            .expect("fake lock")
            .clone()
            .expect("signout attempted");
        assert_eq!(sent.access_token, "access");
        assert_eq!(sent.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn logout_without_session_skips_remote_call() {
        let api = FakeApi::default();
        let session = SessionContext::in_memory();

        let outcome = logout(&api, &session).await;
        assert_eq!(outcome.route, Route::Landing);
        assert_eq!(api.call_count(), 0);
    }
}
