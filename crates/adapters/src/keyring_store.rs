use dbcopilot_core::api::User;
use dbcopilot_core::session::{Session, SessionError, SessionStore};

pub const DEFAULT_KEYRING_SERVICE: &str = "dbcopilot";

const ACCESS_TOKEN_ACCOUNT: &str = "access_token";
const REFRESH_TOKEN_ACCOUNT: &str = "refresh_token";
const USER_ACCOUNT: &str = "user";

/// Keeps the session trio in the OS credential store, one entry per value.
#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    service: String,
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE)
    }
}

impl KeyringSessionStore {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        let service = if service.trim().is_empty() {
            DEFAULT_KEYRING_SERVICE.to_string()
        } else {
            service
        };
        Self { service }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entries(&self) -> OsEntries<'_> {
        OsEntries {
            service: &self.service,
        }
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        load_session(&self.entries())
    }

    fn save(&mut self, session: &Session) -> Result<(), SessionError> {
        save_session(&mut self.entries(), session)
    }

    fn clear(&mut self) -> Result<(), SessionError> {
        clear_session(&mut self.entries())
    }
}

/// Per-account secret storage under one service name.
trait CredentialEntries {
    fn read(&self, account: &str) -> Result<Option<String>, SessionError>;
    fn write(&mut self, account: &str, value: &str) -> Result<(), SessionError>;
    fn delete(&mut self, account: &str) -> Result<(), SessionError>;
}

fn load_session(entries: &impl CredentialEntries) -> Result<Option<Session>, SessionError> {
    let Some(access_token) = entries.read(ACCESS_TOKEN_ACCOUNT)? else {
        return Ok(None);
    };
    let Some(raw_user) = entries.read(USER_ACCOUNT)? else {
        return Ok(None);
    };
    let user: User = serde_json::from_str(&raw_user)?;
    let refresh_token = entries.read(REFRESH_TOKEN_ACCOUNT)?;

    Ok(Some(Session {
        access_token,
        refresh_token,
        user,
    }))
}

/// Writes all three entries. If one fails, every entry touched so far is put
/// back to the value it had before the call.
fn save_session(
    entries: &mut impl CredentialEntries,
    session: &Session,
) -> Result<(), SessionError> {
    let user = serde_json::to_string(&session.user)?;
    let desired = [
        (ACCESS_TOKEN_ACCOUNT, Some(session.access_token.as_str())),
        (USER_ACCOUNT, Some(user.as_str())),
        (REFRESH_TOKEN_ACCOUNT, session.refresh_token.as_deref()),
    ];

    let mut previous = Vec::with_capacity(desired.len());
    for (account, _) in &desired {
        previous.push((*account, entries.read(account)?));
    }

    for (index, (account, value)) in desired.iter().enumerate() {
        let result = match value {
            Some(value) => entries.write(account, value),
            None => entries.delete(account),
        };
        if let Err(error) = result {
            tracing::warn!(account, %error, "keyring write failed, restoring previous session");
            restore_entries(entries, &previous[..=index]);
            return Err(error);
        }
    }
    Ok(())
}

fn restore_entries(entries: &mut impl CredentialEntries, previous: &[(&str, Option<String>)]) {
    for (account, value) in previous {
        let result = match value {
            Some(value) => entries.write(account, value),
            None => entries.delete(account),
        };
        if let Err(error) = result {
            tracing::error!(account, %error, "failed to restore keyring entry");
        }
    }
}

fn clear_session(entries: &mut impl CredentialEntries) -> Result<(), SessionError> {
    let mut first_error = None;
    for account in [ACCESS_TOKEN_ACCOUNT, REFRESH_TOKEN_ACCOUNT, USER_ACCOUNT] {
        if let Err(error) = entries.delete(account) {
            first_error.get_or_insert(error);
        }
    }
    first_error.map_or(Ok(()), Err)
}

struct OsEntries<'a> {
    service: &'a str,
}

impl CredentialEntries for OsEntries<'_> {
    fn read(&self, account: &str) -> Result<Option<String>, SessionError> {
        read_entry(self.service, account)
    }

    fn write(&mut self, account: &str, value: &str) -> Result<(), SessionError> {
        write_entry(self.service, account, value)
    }

    fn delete(&mut self, account: &str) -> Result<(), SessionError> {
        delete_entry(self.service, account)
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn entry(service: &str, account: &str) -> Result<keyring::Entry, SessionError> {
    keyring::Entry::new(service, account).map_err(to_session_error)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn read_entry(service: &str, account: &str) -> Result<Option<String>, SessionError> {
    match entry(service, account)?.get_password() {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(error) => Err(to_session_error(error)),
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn write_entry(service: &str, account: &str, value: &str) -> Result<(), SessionError> {
    entry(service, account)?
        .set_password(value)
        .map_err(to_session_error)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn delete_entry(service: &str, account: &str) -> Result<(), SessionError> {
    match entry(service, account)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(error) => Err(to_session_error(error)),
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn to_session_error(error: keyring::Error) -> SessionError {
    SessionError::Backend(error.to_string())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn read_entry(_service: &str, _account: &str) -> Result<Option<String>, SessionError> {
    Ok(None)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn write_entry(_service: &str, _account: &str, _value: &str) -> Result<(), SessionError> {
    Err(SessionError::Backend(
        "no OS keyring is available on this platform".to_string(),
    ))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn delete_entry(_service: &str, _account: &str) -> Result<(), SessionError> {
    Ok(())
}
