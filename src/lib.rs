//! Integration Gateway Library
//!
//! Manifest-driven tool generation and permission-checked proxy execution
//! for third-party provider APIs.
//!
//! # Features
//!
//! - **Manifests**: one declarative YAML record per provider, validated at load
//! - **Tool generation**: schema-validated tools derived per user from manifests
//! - **Access resolution**: org ceiling, connection state and user choice combined
//! - **Proxy execution**: path-safe request building and blocklist enforcement
//! - **Feature status**: available, limited or disabled with actionable guidance

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod manifest;
pub mod proxy;
pub mod status;
pub mod tools;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(format!("Failed to install subscriber: {e}")))?,
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(format!("Failed to install subscriber: {e}")))?,
    }

    Ok(())
}
