//! Single-directory HTTP file exchange.
//!
//! `GET ?file=<name>` streams a file from the configured parent directory,
//! `POST` with a `multipart/form-data` body stores the uploaded file (shrinking
//! oversized images) and answers with its public url.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod mime;
pub mod models;
pub mod multipart;
pub mod server;
pub mod session;
pub mod state;
pub mod transfer;
pub mod upload;
pub mod utils;
