// idox-editor library entry point: autosave, persistence, sharing.

pub mod autosave;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod presence;
pub mod service;
pub mod session;
pub mod share;
pub mod stats;
pub mod store;
