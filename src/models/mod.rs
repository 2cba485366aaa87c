//! Data models shared across the application: settings, profiles, sessions,
//! transfer options, batch jobs, chats and history records.

pub mod batch;
pub mod chat;
pub mod file;
pub mod history;
pub mod profile;
pub mod session;
pub mod settings;
pub mod transfer;
