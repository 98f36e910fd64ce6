use std::collections::BTreeMap;

use thiserror::Error;

use crate::api::{ApiError, ConnectionCreated, CopilotApi, CreateConnectionRequest};
use crate::registry::{CredentialRegistry, DatabaseProvider, DatabaseType};
use crate::routes::Route;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("select a database type first")]
    TypeNotSelected,
    #[error("`{provider}` is not a {db_type} provider", db_type = .db_type.label())]
    ProviderMismatch {
        db_type: DatabaseType,
        provider: DatabaseProvider,
    },
    #[error("select a database provider first")]
    ProviderNotSelected,
    #[error("`{field}` is not a credential field for {provider}")]
    UnknownField {
        provider: DatabaseProvider,
        field: String,
    },
    #[error("enter a name for this connection")]
    MissingName,
    #[error("`{0}` is required")]
    MissingCredential(String),
    #[error("Connection failed: {0}")]
    Api(#[from] ApiError),
}

/// Form state for creating a backend connection: type, then provider, then
/// the name and the provider's credential fields.
#[derive(Debug, Clone)]
pub struct ConnectionWizard {
    registry: CredentialRegistry,
    db_type: Option<DatabaseType>,
    provider: Option<DatabaseProvider>,
    name: String,
    credentials: BTreeMap<String, String>,
}

impl ConnectionWizard {
    #[must_use]
    pub fn new(registry: CredentialRegistry) -> Self {
        Self {
            registry,
            db_type: None,
            provider: None,
            name: String::new(),
            credentials: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    #[must_use]
    pub fn db_type(&self) -> Option<DatabaseType> {
        self.db_type
    }

    #[must_use]
    pub fn provider(&self) -> Option<DatabaseProvider> {
        self.provider
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn credentials(&self) -> &BTreeMap<String, String> {
        &self.credentials
    }

    #[must_use]
    pub fn credential(&self, field: &str) -> &str {
        self.credentials.get(field).map_or("", String::as_str)
    }

    #[must_use]
    pub fn available_providers(&self) -> &'static [DatabaseProvider] {
        self.db_type
            .map(|db_type| self.registry.providers_for(db_type))
            .unwrap_or_default()
    }

    /// Fields to render, exactly the registry's list for the chosen provider.
    #[must_use]
    pub fn credential_fields(&self) -> &[String] {
        self.provider
            .map(|provider| self.registry.fields_for(provider))
            .unwrap_or_default()
    }

    pub fn select_type(&mut self, db_type: DatabaseType) {
        self.db_type = Some(db_type);
        self.provider = None;
        self.name.clear();
        self.credentials.clear();
    }

    pub fn select_provider(&mut self, provider: DatabaseProvider) -> Result<(), WizardError> {
        let db_type = self.db_type.ok_or(WizardError::TypeNotSelected)?;
        if !self.registry.providers_for(db_type).contains(&provider) {
            return Err(WizardError::ProviderMismatch { db_type, provider });
        }

        self.provider = Some(provider);
        self.credentials.clear();
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_credential(
        &mut self,
        field: &str,
        value: impl Into<String>,
    ) -> Result<(), WizardError> {
        let provider = self.provider.ok_or(WizardError::ProviderNotSelected)?;
        if !self.credential_fields().iter().any(|known| known == field) {
            return Err(WizardError::UnknownField {
                provider,
                field: field.to_string(),
            });
        }

        self.credentials.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Whether the connect control is active.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.provider.is_some()
    }

    pub fn build_request(
        &self,
        user_id: impl Into<String>,
    ) -> Result<CreateConnectionRequest, WizardError> {
        let provider = self.provider.ok_or(WizardError::ProviderNotSelected)?;
        let db_type = self.db_type.unwrap_or_else(|| provider.database_type());

        let name = self.name.trim();
        if name.is_empty() {
            return Err(WizardError::MissingName);
        }

        let mut credentials = BTreeMap::new();
        for field in self.credential_fields() {
            let value = self.credential(field);
            if value.trim().is_empty() {
                return Err(WizardError::MissingCredential(field.clone()));
            }
            credentials.insert(field.clone(), value.to_string());
        }

        Ok(CreateConnectionRequest {
            db_type,
            db_provider: provider,
            db_name: name.to_string(),
            credentials,
            user_id: user_id.into(),
        })
    }

    /// Validates and sends the form. The wizard is left untouched either way,
    /// so a failed attempt can be corrected and resubmitted.
    pub async fn submit(
        &self,
        api: &dyn CopilotApi,
        user_id: &str,
    ) -> Result<ConnectionCreated, WizardError> {
        let request = self.build_request(user_id)?;
        tracing::debug!(
            provider = %request.db_provider,
            db_name = %request.db_name,
            "creating connection"
        );
        let created = api.create_connection(&request).await?;
        tracing::info!(connection_id = %created.connection_id, "connection created");
        Ok(created)
    }
}

impl ConnectionCreated {
    #[must_use]
    pub fn route(&self) -> Route {
        Route::chat(self.connection_id.clone())
    }
}
