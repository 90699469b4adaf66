//! metabee - course marketplace backend
//!
//! This crate provides account registration and login, signed session tokens
//! and the authentication gate that protects every user-facing endpoint.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod server;
pub mod telemetry;
