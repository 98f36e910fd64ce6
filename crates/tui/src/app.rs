use std::sync::Arc;

use dbcopilot_core::api::{ApiError, ConnectionCreated, ConnectionList, ConnectionSummary, User};
use dbcopilot_core::auth::{AuthError, LoginForm, LogoutOutcome, SignupForm};
use dbcopilot_core::chat::{ChatError, ChatSurface, PendingExchange};
use dbcopilot_core::guard::{AuthGuard, GuardDecision};
use dbcopilot_core::registry::{CredentialRegistry, DatabaseType};
use dbcopilot_core::routes::Route;
use dbcopilot_core::session::SessionContext;
use dbcopilot_core::wizard::{ConnectionWizard, WizardError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectionKey {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug)]
pub(crate) enum Msg {
    Quit,
    ToggleHelp,
    NextField,
    PrevField,
    TogglePane,
    Submit,
    Back,
    Logout,
    Refresh,
    Navigate(DirectionKey),
    Input(char),
    Backspace,
    Tick,
    Completed(Outcome),
}

/// Result of a [`Command`] finished off the UI loop.
#[derive(Debug)]
pub(crate) enum Outcome {
    SignedUp(Result<User, AuthError>),
    SignedIn(Result<User, AuthError>),
    SignedOut(LogoutOutcome),
    ConnectionCreated(Result<ConnectionCreated, WizardError>),
    ConnectionsLoaded(Result<ConnectionList, ApiError>),
    ChatReplied {
        connection_id: String,
        reply: Result<String, ChatError>,
    },
}

/// Side effects requested by the app; executed by the runner.
#[derive(Debug, Clone)]
pub(crate) enum Command {
    Signup(SignupForm),
    Login(LoginForm),
    Logout,
    CreateConnection {
        wizard: Box<ConnectionWizard>,
        user_id: String,
    },
    LoadConnections,
    AskAssistant(PendingExchange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginField {
    Email,
    Password,
}

impl LoginField {
    fn next(self) -> Self {
        match self {
            Self::Email => Self::Password,
            Self::Password => Self::Email,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignupField {
    Name,
    Email,
    Password,
    ConfirmPassword,
}

impl SignupField {
    const ORDER: [Self; 4] = [Self::Name, Self::Email, Self::Password, Self::ConfirmPassword];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Name => "Full Name",
            Self::Email => "Email Address",
            Self::Password => "Password",
            Self::ConfirmPassword => "Confirm Password",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WizardFocus {
    DatabaseType,
    Provider,
    Name,
    Credential(usize),
    Connect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HomePane {
    Wizard,
    Connections,
}

#[derive(Debug)]
pub(crate) struct TuiApp {
    pub(crate) session: Arc<SessionContext>,
    guard: AuthGuard,
    pub(crate) route: Route,
    pub(crate) login_form: LoginForm,
    pub(crate) login_field: LoginField,
    pub(crate) signup_form: SignupForm,
    pub(crate) signup_field: SignupField,
    pub(crate) wizard: ConnectionWizard,
    pub(crate) wizard_focus: WizardFocus,
    pub(crate) home_pane: HomePane,
    pub(crate) connections: Vec<ConnectionSummary>,
    pub(crate) selected_connection: usize,
    pub(crate) connections_loading: bool,
    pub(crate) chat: Option<ChatSurface>,
    pub(crate) busy: bool,
    pub(crate) show_help: bool,
    pub(crate) should_quit: bool,
    pub(crate) status_line: String,
    pub(crate) ticks: u64,
}

impl TuiApp {
    pub(crate) fn new(session: Arc<SessionContext>, registry: CredentialRegistry) -> Self {
        let guard = AuthGuard::new(&session);
        Self {
            session,
            guard,
            route: Route::Landing,
            login_form: LoginForm::default(),
            login_field: LoginField::Email,
            signup_form: SignupForm::default(),
            signup_field: SignupField::Name,
            wizard: ConnectionWizard::new(registry),
            wizard_focus: WizardFocus::DatabaseType,
            home_pane: HomePane::Wizard,
            connections: Vec::new(),
            selected_connection: 0,
            connections_loading: false,
            chat: None,
            busy: false,
            show_help: false,
            should_quit: false,
            status_line: "Press l to sign in or s to create an account".to_string(),
            ticks: 0,
        }
    }

    /// Opens Home straight away when a stored session exists.
    pub(crate) fn start(&mut self) -> Vec<Command> {
        if self.session.is_authenticated() {
            self.navigate(Route::Home)
        } else {
            Vec::new()
        }
    }

    pub(crate) fn handle(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Msg::ToggleHelp => {
                self.show_help = !self.show_help;
                Vec::new()
            }
            Msg::Tick => {
                self.on_tick();
                Vec::new()
            }
            Msg::Completed(outcome) => self.on_outcome(outcome),
            Msg::Logout => {
                if self.route.requires_session() && !self.busy {
                    self.busy = true;
                    self.status_line = "Signing out...".to_string();
                    vec![Command::Logout]
                } else {
                    Vec::new()
                }
            }
            other => match self.route.clone() {
                Route::Landing => self.handle_landing(&other),
                Route::Login => self.handle_login(other),
                Route::Signup => self.handle_signup(other),
                Route::Home => self.handle_home(other),
                Route::Chat { .. } => self.handle_chat(other),
            },
        }
    }

    fn on_tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        if let Some(GuardDecision::Redirect(target)) = self.guard.poll_change() {
            if self.route.requires_session() {
                tracing::info!(from = %self.route, to = %target, "session ended, leaving guarded view");
                self.leave_guarded_views();
                self.route = target;
                self.status_line = "Session ended, please sign in again".to_string();
            }
        }
    }

    /// Goes to `route`, or to the guard's redirect target when the route
    /// needs a session that is not there.
    pub(crate) fn navigate(&mut self, route: Route) -> Vec<Command> {
        let target = self.guard.resolve(route.clone());
        if target != route {
            self.status_line = "Sign in to continue".to_string();
        }

        if !matches!(target, Route::Chat { .. }) {
            self.chat = None;
        }

        let mut commands = Vec::new();
        match &target {
            Route::Home => {
                self.home_pane = HomePane::Wizard;
                self.connections_loading = true;
                commands.push(Command::LoadConnections);
            }
            Route::Chat { connection_id } => {
                let already_open = self
                    .chat
                    .as_ref()
                    .is_some_and(|chat| chat.connection_id() == connection_id);
                if !already_open {
                    self.chat = Some(ChatSurface::new(connection_id.clone()));
                }
            }
            Route::Landing | Route::Login | Route::Signup => {}
        }

        tracing::debug!(route = %target, "navigated");
        self.route = target;
        commands
    }

    fn leave_guarded_views(&mut self) {
        self.chat = None;
        self.connections.clear();
        self.selected_connection = 0;
        self.wizard = ConnectionWizard::new(self.wizard.registry().clone());
        self.wizard_focus = WizardFocus::DatabaseType;
    }

    fn handle_landing(&mut self, msg: &Msg) -> Vec<Command> {
        match msg {
            Msg::Input('l' | 'L') | Msg::Submit => self.navigate(Route::Login),
            Msg::Input('s' | 'S') => self.navigate(Route::Signup),
            Msg::Input('q') | Msg::Back => {
                self.should_quit = true;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_login(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::NextField
            | Msg::PrevField
            | Msg::Navigate(DirectionKey::Up | DirectionKey::Down) => {
                self.login_field = self.login_field.next();
            }
            Msg::Input(ch) => self.login_text_mut().push(ch),
            Msg::Backspace => {
                self.login_text_mut().pop();
            }
            Msg::Back => return self.navigate(Route::Landing),
            Msg::Submit => return self.submit_login(),
            _ => {}
        }
        Vec::new()
    }

    fn login_text_mut(&mut self) -> &mut String {
        match self.login_field {
            LoginField::Email => &mut self.login_form.email,
            LoginField::Password => &mut self.login_form.password,
        }
    }

    fn submit_login(&mut self) -> Vec<Command> {
        if self.busy {
            return Vec::new();
        }
        if let Err(error) = self.login_form.validate() {
            self.status_line = error.to_string();
            return Vec::new();
        }
        self.busy = true;
        self.status_line = "Signing in...".to_string();
        vec![Command::Login(self.login_form.clone())]
    }

    fn handle_signup(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::NextField | Msg::Navigate(DirectionKey::Down) => {
                self.signup_field = cycle(&SignupField::ORDER, self.signup_field, 1);
            }
            Msg::PrevField | Msg::Navigate(DirectionKey::Up) => {
                self.signup_field = cycle(&SignupField::ORDER, self.signup_field, -1);
            }
            Msg::Input(ch) => self.signup_text_mut().push(ch),
            Msg::Backspace => {
                self.signup_text_mut().pop();
            }
            Msg::Back => return self.navigate(Route::Landing),
            Msg::Submit => return self.submit_signup(),
            _ => {}
        }
        Vec::new()
    }

    fn signup_text_mut(&mut self) -> &mut String {
        match self.signup_field {
            SignupField::Name => &mut self.signup_form.name,
            SignupField::Email => &mut self.signup_form.email,
            SignupField::Password => &mut self.signup_form.password,
            SignupField::ConfirmPassword => &mut self.signup_form.confirm_password,
        }
    }

    fn submit_signup(&mut self) -> Vec<Command> {
        if self.busy {
            return Vec::new();
        }
        if let Err(error) = self.signup_form.validate() {
            self.status_line = error.to_string();
            return Vec::new();
        }
        self.busy = true;
        self.status_line = "Creating account...".to_string();
        vec![Command::Signup(self.signup_form.clone())]
    }

    fn handle_home(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::TogglePane => {
                self.home_pane = match self.home_pane {
                    HomePane::Wizard => HomePane::Connections,
                    HomePane::Connections => HomePane::Wizard,
                };
                Vec::new()
            }
            Msg::Refresh => {
                self.connections_loading = true;
                vec![Command::LoadConnections]
            }
            other => match self.home_pane {
                HomePane::Wizard => self.handle_wizard(other),
                HomePane::Connections => self.handle_connections(&other),
            },
        }
    }

    pub(crate) fn wizard_focus_order(&self) -> Vec<WizardFocus> {
        let mut order = vec![WizardFocus::DatabaseType];
        if self.wizard.db_type().is_some() {
            order.push(WizardFocus::Provider);
        }
        if self.wizard.provider().is_some() {
            order.push(WizardFocus::Name);
            order.extend((0..self.wizard.credential_fields().len()).map(WizardFocus::Credential));
            order.push(WizardFocus::Connect);
        }
        order
    }

    fn handle_wizard(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::NextField | Msg::Navigate(DirectionKey::Down) => self.step_wizard_focus(1),
            Msg::PrevField | Msg::Navigate(DirectionKey::Up) => self.step_wizard_focus(-1),
            Msg::Navigate(DirectionKey::Left) => self.cycle_wizard_choice(-1),
            Msg::Navigate(DirectionKey::Right) => self.cycle_wizard_choice(1),
            Msg::Input(ch) => self.edit_wizard_text(|text| text.push(ch)),
            Msg::Backspace => self.edit_wizard_text(|text| {
                text.pop();
            }),
            Msg::Submit => return self.submit_wizard(),
            _ => {}
        }
        Vec::new()
    }

    fn step_wizard_focus(&mut self, step: isize) {
        let order = self.wizard_focus_order();
        self.wizard_focus = cycle(&order, self.wizard_focus, step);
    }

    fn cycle_wizard_choice(&mut self, step: isize) {
        match self.wizard_focus {
            WizardFocus::DatabaseType => {
                let next = match self.wizard.db_type() {
                    Some(current) => cycle(&DatabaseType::ALL, current, step),
                    None => DatabaseType::ALL[0],
                };
                self.wizard.select_type(next);
                self.status_line = format!("Database type: {}", next.label());
            }
            WizardFocus::Provider => {
                let providers = self.wizard.available_providers();
                let Some(first) = providers.first().copied() else {
                    return;
                };
                let next = match self.wizard.provider() {
                    Some(current) => cycle(providers, current, step),
                    None => first,
                };
                match self.wizard.select_provider(next) {
                    Ok(()) => self.status_line = format!("Provider: {}", next.label()),
                    Err(error) => self.status_line = error.to_string(),
                }
            }
            WizardFocus::Name | WizardFocus::Credential(_) | WizardFocus::Connect => {}
        }
    }

    fn edit_wizard_text(&mut self, edit: impl FnOnce(&mut String)) {
        match self.wizard_focus {
            WizardFocus::Name => {
                let mut name = self.wizard.name().to_string();
                edit(&mut name);
                self.wizard.set_name(name);
            }
            WizardFocus::Credential(index) => {
                let Some(field) = self.wizard.credential_fields().get(index).cloned() else {
                    return;
                };
                let mut value = self.wizard.credential(&field).to_string();
                edit(&mut value);
                if let Err(error) = self.wizard.set_credential(&field, value) {
                    self.status_line = error.to_string();
                }
            }
            WizardFocus::DatabaseType | WizardFocus::Provider | WizardFocus::Connect => {}
        }
    }

    fn submit_wizard(&mut self) -> Vec<Command> {
        if self.busy {
            return Vec::new();
        }
        if !self.wizard.can_submit() {
            self.status_line = WizardError::ProviderNotSelected.to_string();
            return Vec::new();
        }
        let Some(user) = self.session.user() else {
            return self.navigate(Route::Landing);
        };
        if let Err(error) = self.wizard.build_request(user.id.clone()) {
            self.status_line = error.to_string();
            return Vec::new();
        }

        self.busy = true;
        self.status_line = "Connecting...".to_string();
        vec![Command::CreateConnection {
            wizard: Box::new(self.wizard.clone()),
            user_id: user.id,
        }]
    }

    fn handle_connections(&mut self, msg: &Msg) -> Vec<Command> {
        match msg {
            Msg::Navigate(DirectionKey::Up | DirectionKey::Left) | Msg::PrevField => {
                self.selected_connection = self.selected_connection.saturating_sub(1);
            }
            Msg::Navigate(DirectionKey::Down | DirectionKey::Right) | Msg::NextField => {
                let max_index = self.connections.len().saturating_sub(1);
                self.selected_connection = (self.selected_connection + 1).min(max_index);
            }
            Msg::Submit => {
                if let Some(connection) = self.connections.get(self.selected_connection) {
                    let route = Route::chat(connection.id.clone());
                    return self.navigate(route);
                }
                self.status_line = "No connections yet".to_string();
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_chat(&mut self, msg: Msg) -> Vec<Command> {
        if matches!(msg, Msg::Back) {
            return self.navigate(Route::Home);
        }

        let Some(chat) = self.chat.as_mut() else {
            return Vec::new();
        };
        match msg {
            Msg::Input(ch) => {
                if !chat.push_input(ch) {
                    self.status_line = "Message is too long".to_string();
                }
            }
            Msg::Backspace => {
                chat.pop_input();
            }
            Msg::Submit => {
                if let Some(exchange) = chat.begin_send() {
                    return vec![Command::AskAssistant(exchange)];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn on_outcome(&mut self, outcome: Outcome) -> Vec<Command> {
        match outcome {
            Outcome::SignedUp(result) => {
                self.busy = false;
                match result {
                    Ok(user) => {
                        self.login_form = LoginForm {
                            email: user.email,
                            password: String::new(),
                        };
                        self.login_field = LoginField::Password;
                        self.signup_form = SignupForm::default();
                        self.signup_field = SignupField::Name;
                        let commands = self.navigate(Route::Login);
                        self.status_line =
                            "Account created successfully! Please sign in.".to_string();
                        return commands;
                    }
                    Err(error) => self.status_line = error.to_string(),
                }
            }
            Outcome::SignedIn(result) => {
                self.busy = false;
                match result {
                    Ok(user) => {
                        self.login_form.password.clear();
                        let commands = self.navigate(Route::Home);
                        self.status_line = format!("Signed in as {}", user.email);
                        return commands;
                    }
                    Err(error) => self.status_line = error.to_string(),
                }
            }
            Outcome::SignedOut(outcome) => {
                self.busy = false;
                self.leave_guarded_views();
                self.route = outcome.route;
                self.status_line = match (&outcome.remote_error, &outcome.local_error) {
                    (_, Some(error)) => format!("Signed out, but {error}"),
                    (Some(error), None) => format!("Signed out locally ({error})"),
                    (None, None) => "Signed out".to_string(),
                };
            }
            Outcome::ConnectionCreated(result) => {
                self.busy = false;
                match result {
                    Ok(created) => {
                        let commands = self.navigate(created.route());
                        self.status_line = created
                            .message
                            .unwrap_or_else(|| "Connected".to_string());
                        return commands;
                    }
                    Err(error) => self.status_line = error.to_string(),
                }
            }
            Outcome::ConnectionsLoaded(result) => {
                self.connections_loading = false;
                match result {
                    Ok(list) => {
                        self.connections = list.connections;
                        self.selected_connection = self
                            .selected_connection
                            .min(self.connections.len().saturating_sub(1));
                    }
                    Err(error) => {
                        self.status_line = format!("Failed to fetch connections: {error}");
                    }
                }
            }
            Outcome::ChatReplied {
                connection_id,
                reply,
            } => {
                let Some(chat) = self
                    .chat
                    .as_mut()
                    .filter(|chat| chat.connection_id() == connection_id)
                else {
                    tracing::debug!(%connection_id, "reply for a closed chat dropped");
                    return Vec::new();
                };
                chat.complete(reply);
                if let Some(error) = chat.last_error() {
                    self.status_line = error.to_string();
                }
            }
        }
        Vec::new()
    }
}

fn cycle<T: Copy + PartialEq>(items: &[T], current: T, step: isize) -> T {
    let Some(position) = items.iter().position(|item| *item == current) else {
        return items.first().copied().unwrap_or(current);
    };
    let len = isize::try_from(items.len()).unwrap_or(isize::MAX);
    let position = isize::try_from(position).unwrap_or(0);
    let next = (position + step).rem_euclid(len);
    usize::try_from(next)
        .ok()
        .and_then(|index| items.get(index).copied())
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dbcopilot_core::api::{
        ApiError, ConnectionCreated, ConnectionList, ConnectionSummary, User,
    };
    use dbcopilot_core::auth::LogoutOutcome;
    use dbcopilot_core::registry::{CredentialRegistry, DatabaseProvider, DatabaseType};
    use dbcopilot_core::routes::Route;
    use dbcopilot_core::session::{Session, SessionContext};
    use dbcopilot_core::wizard::WizardError;

    use super::{Command, DirectionKey, HomePane, Msg, Outcome, TuiApp, WizardFocus};

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            name: None,
        }
    }

    fn signed_in_app() -> TuiApp {
        let session = Arc::new(SessionContext::in_memory());
        session
            .store_session(Session {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
                user: user(),
            })
            .expect("store should succeed");
        let mut app = TuiApp::new(session, CredentialRegistry::default());
        let commands = app.start();
        assert!(matches!(commands.as_slice(), [Command::LoadConnections]));
        app
    }

    fn type_text(app: &mut TuiApp, text: &str) -> Vec<Command> {
        let mut commands = Vec::new();
        for ch in text.chars() {
            commands.extend(app.handle(Msg::Input(ch)));
        }
        commands
    }

    fn fill_supabase(app: &mut TuiApp) {
        app.handle(Msg::Navigate(DirectionKey::Right));
        assert_eq!(app.wizard.db_type(), Some(DatabaseType::Sql));
        app.handle(Msg::NextField);
        assert_eq!(app.wizard_focus, WizardFocus::Provider);
        for _ in 0..3 {
            app.handle(Msg::Navigate(DirectionKey::Right));
        }
        assert_eq!(app.wizard.provider(), Some(DatabaseProvider::Supabase));
        app.handle(Msg::NextField);
        type_text(app, "prod");
        app.handle(Msg::NextField);
        assert_eq!(app.wizard_focus, WizardFocus::Credential(0));
        type_text(app, "postgres://db");
    }

    #[test]
    fn guarded_view_without_session_redirects_to_landing() {
        let session = Arc::new(SessionContext::in_memory());
        let mut app = TuiApp::new(session, CredentialRegistry::default());
        assert!(app.start().is_empty());

        let commands = app.navigate(Route::chat("abc123"));
        assert!(commands.is_empty());
        assert_eq!(app.route, Route::Landing);
        assert!(app.chat.is_none());
    }

    #[test]
    fn wizard_submit_without_provider_issues_no_command() {
        let mut app = signed_in_app();
        assert!(app.handle(Msg::Submit).is_empty());
        assert_eq!(app.status_line, WizardError::ProviderNotSelected.to_string());
        assert!(!app.busy);
    }

    #[test]
    fn wizard_flow_emits_create_connection_and_opens_chat() {
        let mut app = signed_in_app();
        fill_supabase(&mut app);

        let commands = app.handle(Msg::Submit);
        let [Command::CreateConnection { wizard, user_id }] = commands.as_slice() else {
            panic!("expected a create connection command, got {commands:?}");
        };
        assert_eq!(user_id, "user-1");
        assert_eq!(wizard.credential("connection_string"), "postgres://db");
        assert!(app.busy);
        assert!(app.handle(Msg::Submit).is_empty());

        app.handle(Msg::Completed(Outcome::ConnectionCreated(Ok(ConnectionCreated {
            connection_id: "abc123".to_string(),
            message: None,
        }))));
        assert_eq!(app.route, Route::chat("abc123"));
        assert_eq!(
            app.chat.as_ref().map(|chat| chat.connection_id()),
            Some("abc123")
        );
        assert!(!app.busy);
    }

    #[test]
    fn failed_create_keeps_wizard_state_and_shows_detail() {
        let mut app = signed_in_app();
        fill_supabase(&mut app);
        app.handle(Msg::Submit);

        app.handle(Msg::Completed(Outcome::ConnectionCreated(Err(
            WizardError::Api(ApiError::Rejected {
                status: 400,
                detail: "Supabase connection failed".to_string(),
            }),
        ))));
        assert_eq!(app.route, Route::Home);
        assert_eq!(
            app.status_line,
            "Connection failed: Supabase connection failed"
        );
        assert_eq!(app.wizard.name(), "prod");
        assert_eq!(app.wizard.credential("connection_string"), "postgres://db");
    }

    #[test]
    fn changing_type_from_the_form_resets_provider() {
        let mut app = signed_in_app();
        fill_supabase(&mut app);
        app.wizard_focus = WizardFocus::DatabaseType;

        app.handle(Msg::Navigate(DirectionKey::Right));
        assert_eq!(app.wizard.db_type(), Some(DatabaseType::NoSql));
        assert!(app.wizard.provider().is_none());
        assert!(app.wizard.credentials().is_empty());
        assert_eq!(
            app.wizard_focus_order(),
            vec![WizardFocus::DatabaseType, WizardFocus::Provider]
        );
    }

    #[test]
    fn chat_send_is_blocked_while_reply_pending() {
        let mut app = signed_in_app();
        app.navigate(Route::chat("abc123"));
        type_text(&mut app, "how many users?");

        let commands = app.handle(Msg::Submit);
        assert!(matches!(commands.as_slice(), [Command::AskAssistant(_)]));
        type_text(&mut app, "again");
        assert!(app.handle(Msg::Submit).is_empty());

        app.handle(Msg::Completed(Outcome::ChatReplied {
            connection_id: "abc123".to_string(),
            reply: Ok("42".to_string()),
        }));
        let chat = app.chat.as_ref().expect("chat open");
        assert_eq!(chat.messages().len(), 3);
        assert!(!chat.is_pending());
        assert_eq!(chat.input(), "again");
    }

    #[test]
    fn reply_for_closed_chat_is_dropped() {
        let mut app = signed_in_app();
        app.navigate(Route::chat("abc123"));
        type_text(&mut app, "hi");
        app.handle(Msg::Submit);
        app.handle(Msg::Back);
        assert_eq!(app.route, Route::Home);
        assert!(app.chat.is_none());

        app.handle(Msg::Completed(Outcome::ChatReplied {
            connection_id: "abc123".to_string(),
            reply: Ok("late".to_string()),
        }));
        assert!(app.chat.is_none());
    }

    #[test]
    fn logout_redirects_on_next_tick_via_session_change() {
        let mut app = signed_in_app();
        app.navigate(Route::chat("abc123"));

        let commands = app.handle(Msg::Logout);
        assert!(matches!(commands.as_slice(), [Command::Logout]));

        app.session.clear().expect("clear should succeed");
        app.handle(Msg::Tick);
        assert_eq!(app.route, Route::Landing);
        assert!(app.chat.is_none());

        app.handle(Msg::Completed(Outcome::SignedOut(LogoutOutcome {
            route: Route::Landing,
            remote_error: Some(ApiError::Transport("refused".to_string())),
            local_error: None,
        })));
        assert_eq!(app.route, Route::Landing);
        assert!(app.status_line.starts_with("Signed out locally"));
        assert!(!app.busy);
    }

    #[test]
    fn connections_list_opens_chat() {
        let mut app = signed_in_app();
        app.handle(Msg::Completed(Outcome::ConnectionsLoaded(Ok(ConnectionList {
            connections: vec![
                ConnectionSummary {
                    id: "c1".to_string(),
                    db_name: "analytics".to_string(),
                    db_provider_name: "mysql".to_string(),
                    connected: true,
                },
                ConnectionSummary {
                    id: "c2".to_string(),
                    db_name: "events".to_string(),
                    db_provider_name: "mongodb".to_string(),
                    connected: false,
                },
            ],
        }))));
        assert!(!app.connections_loading);

        app.handle(Msg::TogglePane);
        assert_eq!(app.home_pane, HomePane::Connections);
        app.handle(Msg::Navigate(DirectionKey::Down));
        app.handle(Msg::Navigate(DirectionKey::Down));
        assert_eq!(app.selected_connection, 1);

        app.handle(Msg::Submit);
        assert_eq!(app.route, Route::chat("c2"));
    }

    #[test]
    fn login_validation_blocks_command() {
        let session = Arc::new(SessionContext::in_memory());
        let mut app = TuiApp::new(session, CredentialRegistry::default());
        app.handle(Msg::Input('l'));
        assert_eq!(app.route, Route::Login);

        type_text(&mut app, "not-an-email");
        assert!(app.handle(Msg::Submit).is_empty());
        assert_eq!(app.status_line, "Please enter a valid email address.");
    }

    #[test]
    fn signup_success_prefills_login() {
        let session = Arc::new(SessionContext::in_memory());
        let mut app = TuiApp::new(session, CredentialRegistry::default());
        app.handle(Msg::Input('s'));
        assert_eq!(app.route, Route::Signup);

        type_text(&mut app, "Ada");
        app.handle(Msg::NextField);
        type_text(&mut app, "ada@example.com");
        app.handle(Msg::NextField);
        type_text(&mut app, "pw");
        app.handle(Msg::NextField);
        type_text(&mut app, "pw");
        let commands = app.handle(Msg::Submit);
        assert!(matches!(commands.as_slice(), [Command::Signup(_)]));

        app.handle(Msg::Completed(Outcome::SignedUp(Ok(user()))));
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.login_form.email, "ada@example.com");
        assert_eq!(
            app.status_line,
            "Account created successfully! Please sign in."
        );
    }
}
