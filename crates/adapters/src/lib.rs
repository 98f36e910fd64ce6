pub mod http;
pub mod keyring_store;

pub use http::HttpCopilotApi;
pub use keyring_store::KeyringSessionStore;
