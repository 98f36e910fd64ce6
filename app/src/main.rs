use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use dbcopilot_adapters::{HttpCopilotApi, KeyringSessionStore};
use dbcopilot_core::api::CopilotApi;
use dbcopilot_core::chat::{BackendResponder, CannedResponder, ChatResponder};
use dbcopilot_core::config::{
    default_config_dir, log_file_path, session_file_path, AppConfig, ChatMode, SessionStoreKind,
};
use dbcopilot_core::session::{
    FileSessionStore, MemorySessionStore, SessionContext, SessionStore,
};
use dbcopilot_tui::{Services, TuiError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn run_app(
    config: &AppConfig,
    config_dir: &Path,
    run_tui: impl FnOnce(Services) -> Result<(), TuiError>,
) -> Result<(), Box<dyn Error>> {
    let services = build_services(config, config_dir)?;
    tracing::info!(
        base_url = %config.api.base_url,
        chat_mode = ?config.chat.mode,
        signed_in = services.session.is_authenticated(),
        "starting interface"
    );
    run_tui(services)?;
    Ok(())
}

fn build_services(config: &AppConfig, config_dir: &Path) -> Result<Services, Box<dyn Error>> {
    let registry = config.credential_registry()?;

    let store: Box<dyn SessionStore> = match config.session.store {
        SessionStoreKind::File => Box::new(FileSessionStore::new(session_file_path(config_dir))),
        SessionStoreKind::Keyring => Box::new(KeyringSessionStore::new(
            config.session.keyring_service.clone().unwrap_or_default(),
        )),
        SessionStoreKind::Memory => Box::new(MemorySessionStore::new()),
    };
    let session = Arc::new(SessionContext::load(store)?);

    let api: Arc<dyn CopilotApi> = Arc::new(HttpCopilotApi::from_settings(&config.api)?);
    let responder: Arc<dyn ChatResponder> = match config.chat.mode {
        ChatMode::Backend => Arc::new(BackendResponder::new(
            Arc::clone(&api),
            Arc::clone(&session),
            config.chat.model_provider.clone(),
        )),
        ChatMode::Canned => Arc::new(CannedResponder::new(config.chat.reply_delay())),
    };

    Ok(Services {
        api,
        session,
        responder,
        registry,
    })
}

/// Logs go to a file in the config directory. `RUST_LOG` wins over
/// `[logging] filter`.
fn init_logging(config: &AppConfig, config_dir: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(config_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(config_dir))?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.filter)?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let config_dir = default_config_dir()?;
    let config = AppConfig::load_default()?;
    init_logging(&config, &config_dir)?;
    run_app(&config, &config_dir, dbcopilot_tui::run)
}
