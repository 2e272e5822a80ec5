//! Note-taking service library
//!
//! This library provides the notes HTTP API (users, sessions, note CRUD over
//! a JSON document store), the client data layer that talks to it, and the
//! search helpers the client runs over its in-memory note list.

mod auth;
mod cli;
mod client;
mod config;
mod envelope;
mod errors;
mod helper;
mod note;
mod search;
mod server;
mod service;
mod storage;
mod types;
mod user;

// Re-export key components
pub use auth::*;
pub use cli::*;
pub use client::*;
pub use config::*;
pub use envelope::*;
pub use errors::*;
pub use helper::*;
pub use note::*;
pub use search::*;
pub use server::*;
pub use service::*;
pub use storage::*;
pub use types::*;
pub use user::*;
