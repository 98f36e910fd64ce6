mod app;
mod keymap;
mod render;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use dbcopilot_core::api::{ApiError, CopilotApi};
use dbcopilot_core::auth;
use dbcopilot_core::chat::ChatResponder;
use dbcopilot_core::registry::CredentialRegistry;
use dbcopilot_core::session::SessionContext;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::app::{Command, Msg, Outcome, TuiApp};
use crate::keymap::map_key_event;
use crate::render::render;

const TICK_RATE: Duration = Duration::from_millis(120);
const WORKER_THREADS: usize = 2;
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the interface talks to, built by the binary.
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn CopilotApi>,
    pub session: Arc<SessionContext>,
    pub responder: Arc<dyn ChatResponder>,
    pub registry: CredentialRegistry,
}

pub fn run(services: Services) -> Result<(), TuiError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("dbcopilot-worker")
        .enable_all()
        .build()?;

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &runtime, services);
    let restore_result = restore_terminal(&mut terminal);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    runtime: &Runtime,
    services: Services,
) -> Result<(), TuiError> {
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let executor = Executor::new(&services, runtime.handle().clone(), outcome_tx);
    let mut app = TuiApp::new(services.session, services.registry);
    executor.dispatch(app.start());
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render(frame, &app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key) {
                        executor.dispatch(app.handle(message));
                    }
                }
            }
        }

        while let Ok(outcome) = outcome_rx.try_recv() {
            executor.dispatch(app.handle(Msg::Completed(outcome)));
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.handle(Msg::Tick);
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Runs commands on the runtime and reports each result back to the loop.
struct Executor {
    api: Arc<dyn CopilotApi>,
    session: Arc<SessionContext>,
    responder: Arc<dyn ChatResponder>,
    handle: Handle,
    outcomes: UnboundedSender<Outcome>,
}

impl Executor {
    fn new(services: &Services, handle: Handle, outcomes: UnboundedSender<Outcome>) -> Self {
        Self {
            api: Arc::clone(&services.api),
            session: Arc::clone(&services.session),
            responder: Arc::clone(&services.responder),
            handle,
            outcomes,
        }
    }

    fn dispatch(&self, commands: Vec<Command>) {
        for command in commands {
            let api = Arc::clone(&self.api);
            let session = Arc::clone(&self.session);
            let responder = Arc::clone(&self.responder);
            let outcomes = self.outcomes.clone();

            self.handle.spawn(async move {
                let outcome = execute(command, api.as_ref(), &session, responder.as_ref()).await;
                if outcomes.send(outcome).is_err() {
                    tracing::debug!("interface closed before command finished");
                }
            });
        }
    }
}

async fn execute(
    command: Command,
    api: &dyn CopilotApi,
    session: &SessionContext,
    responder: &dyn ChatResponder,
) -> Outcome {
    match command {
        Command::Signup(form) => {
            Outcome::SignedUp(auth::signup(api, &form).await.map(|(user, _)| user))
        }
        Command::Login(form) => {
            Outcome::SignedIn(auth::login(api, session, &form).await.map(|(user, _)| user))
        }
        Command::Logout => Outcome::SignedOut(auth::logout(api, session).await),
        Command::CreateConnection { wizard, user_id } => {
            Outcome::ConnectionCreated(wizard.submit(api, &user_id).await)
        }
        Command::LoadConnections => {
            let result = match session.access_token() {
                Some(token) => api.list_connections(&token).await,
                None => Err(ApiError::Rejected {
                    status: 401,
                    detail: "Not authenticated".to_string(),
                }),
            };
            if let Err(error) = &result {
                tracing::warn!(%error, "failed to fetch connections");
            }
            Outcome::ConnectionsLoaded(result)
        }
        Command::AskAssistant(exchange) => {
            let reply = responder.reply(&exchange).await;
            Outcome::ChatReplied {
                connection_id: exchange.connection_id,
                reply,
            }
        }
    }
}
