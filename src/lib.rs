//! tapline connector host library
//!
//! Sandboxed data connectors for untrusted display plugins: SSRF blocklist,
//! per-plugin permission enforcement, the admin connector tester and the
//! long-lived JSON-API and RSS connector engines.

pub mod cli;
pub mod config;
pub mod connectors;
pub mod logging;
pub mod plugins;
pub mod server;
