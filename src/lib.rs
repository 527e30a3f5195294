//! readit: a REST backend for book tracking and social reading.
//!
//! Users keep a shelf of catalog books with their reading progress,
//! befriend each other, and earn a rank from the size of their shelf.
//! Librarians curate the catalog and admins manage accounts.
//!
//! # Features
//!
//! - Cookie sessions carrying signed JWTs
//! - Book catalog with pagination and infinite scrolling
//! - Per-user shelves with pages read and genre overrides
//! - Friend requests and friend lists
//! - Profile and book photos with automatic downscaling
//! - Librarian and admin gates

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Account registration and user management.
pub mod accounts;
/// Password hashing and session tokens.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book catalog and user shelves.
pub mod library;
/// Photo storage.
pub mod photos;
/// HTTP server.
pub mod server;
/// Friend requests.
pub mod social;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
