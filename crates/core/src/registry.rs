use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Sql,
    NoSql,
}

impl DatabaseType {
    pub const ALL: [Self; 2] = [Self::Sql, Self::NoSql];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::NoSql => "nosql",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Sql => "SQL",
            Self::NoSql => "NoSQL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseProvider {
    Mysql,
    Postgresql,
    Supabase,
    Mongodb,
}

impl DatabaseProvider {
    pub const ALL: [Self; 4] = [Self::Mysql, Self::Postgresql, Self::Supabase, Self::Mongodb];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
            Self::Supabase => "supabase",
            Self::Mongodb => "mongodb",
        }
    }

    #[must_use]
    pub fn database_type(self) -> DatabaseType {
        match self {
            Self::Mysql | Self::Postgresql | Self::Supabase => DatabaseType::Sql,
            Self::Mongodb => DatabaseType::NoSql,
        }
    }

    /// Capitalized provider name as shown in selectors, e.g. `Postgresql`.
    #[must_use]
    pub fn label(self) -> String {
        capitalize(self.as_str())
    }
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown database provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for DatabaseProvider {
    type Err = UnknownProvider;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == raw.trim())
            .ok_or_else(|| UnknownProvider(raw.to_string()))
    }
}

const SQL_PROVIDERS: [DatabaseProvider; 3] = [
    DatabaseProvider::Mysql,
    DatabaseProvider::Postgresql,
    DatabaseProvider::Supabase,
];
const NOSQL_PROVIDERS: [DatabaseProvider; 1] = [DatabaseProvider::Mongodb];

const HOST_FIELDS: [&str; 5] = ["host", "port", "username", "password", "database"];
const CONNECTION_STRING_FIELDS: [&str; 1] = ["connection_string"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),
    #[error("credential field list for `{provider}` contains a blank name")]
    BlankField { provider: DatabaseProvider },
    #[error("credential field `{field}` is listed twice for `{provider}`")]
    DuplicateField {
        provider: DatabaseProvider,
        field: String,
    },
}

/// Lookup table from database type to providers and from provider to the
/// ordered credential fields the connection form asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRegistry {
    fields: BTreeMap<DatabaseProvider, Vec<String>>,
}

impl Default for CredentialRegistry {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        for provider in DatabaseProvider::ALL {
            let names: &[&str] = match provider {
                DatabaseProvider::Mysql | DatabaseProvider::Postgresql => &HOST_FIELDS,
                DatabaseProvider::Supabase | DatabaseProvider::Mongodb => {
                    &CONNECTION_STRING_FIELDS
                }
            };
            fields.insert(
                provider,
                names.iter().map(|name| (*name).to_string()).collect(),
            );
        }
        Self { fields }
    }
}

impl CredentialRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Replaces the field lists of the providers named in `overrides`, keeping
    /// the defaults for every other provider.
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, RegistryError> {
        for (raw_provider, names) in overrides {
            let provider = raw_provider.parse::<DatabaseProvider>()?;
            let mut seen = Vec::with_capacity(names.len());
            for name in names {
                let name = name.trim();
                if name.is_empty() {
                    return Err(RegistryError::BlankField { provider });
                }
                if seen.iter().any(|existing: &String| existing == name) {
                    return Err(RegistryError::DuplicateField {
                        provider,
                        field: name.to_string(),
                    });
                }
                seen.push(name.to_string());
            }
            self.fields.insert(provider, seen);
        }
        Ok(self)
    }

    #[must_use]
    pub fn providers_for(&self, db_type: DatabaseType) -> &'static [DatabaseProvider] {
        match db_type {
            DatabaseType::Sql => &SQL_PROVIDERS,
            DatabaseType::NoSql => &NOSQL_PROVIDERS,
        }
    }

    #[must_use]
    pub fn fields_for(&self, provider: DatabaseProvider) -> &[String] {
        self.fields.get(&provider).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Human label for a credential field: `connection_string` -> `Connection String`.
#[must_use]
pub fn field_label(field: &str) -> String {
    field
        .split('_')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn is_secret_field(field: &str) -> bool {
    field.contains("password") || field.contains("key")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
