//! Sitegate - a local development server for PHP projects
//!
//! This library maps hostnames to local project directories and dispatches
//! incoming HTTP requests to the right handler:
//! - Derives a site name from the Host header (tld and leading www stripped)
//! - Selects a framework driver that understands the project's layout
//! - Streams static assets directly from disk
//! - Executes the project's front controller through a one-shot php-cgi run
//! - Supports custom per-site and user-extension drivers as declarative specs

pub mod config;
pub mod context;
pub mod dispatch;
pub mod driver;
pub mod envfile;
pub mod error;
pub mod php;
pub mod registry;
pub mod server;
pub mod sites;
