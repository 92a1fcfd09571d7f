//! Conversation & notification state engine.
//!
//! Everything here works against `parlor_db::Database` and reports
//! `parlor_types::CoreError`. `service::ChatService` is the surface the
//! transport layer talks to.

pub mod channels;
pub mod contacts;
pub mod friendship;
pub mod groups;
pub mod mentions;
pub mod profiles;
pub mod read_state;
pub mod retry;
pub mod service;

pub use parlor_types::CoreError;

pub type Result<T> = std::result::Result<T, CoreError>;
