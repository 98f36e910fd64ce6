pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod guard;
pub mod registry;
pub mod routes;
pub mod session;
pub mod wizard;
