//! User settings subsystem.
//!
//! Backs the `/Settings/v.1.0/Language` endpoints. The store is opened by
//! the mandatory `settings` module and shared read-mostly with handlers.

pub mod store;

pub use store::{Settings, SettingsError, SettingsStore};
