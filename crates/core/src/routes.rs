use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Signup,
    Home,
    Chat { connection_id: String },
}

impl Route {
    #[must_use]
    pub fn chat(connection_id: impl Into<String>) -> Self {
        Self::Chat {
            connection_id: connection_id.into(),
        }
    }

    #[must_use]
    pub fn requires_session(&self) -> bool {
        matches!(self, Self::Home | Self::Chat { .. })
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Landing => "Welcome",
            Self::Login => "Sign In",
            Self::Signup => "Create Account",
            Self::Home => "Connect a Database",
            Self::Chat { .. } => "Database Copilot",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landing => f.write_str("/"),
            Self::Login => f.write_str("/login"),
            Self::Signup => f.write_str("/signup"),
            Self::Home => f.write_str("/home"),
            Self::Chat { connection_id } => write!(f, "/chat?connectionId={connection_id}"),
        }
    }
}
