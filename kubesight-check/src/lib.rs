//! KubeSight check
//!
//! Runs a KubeSight engine against a fixture-backed control plane and
//! ships its samples on a fixed interval.
//!
//! # Overview
//!
//! - [`CheckConfig`] loads and validates the JSON5 configuration
//! - [`Fixture`] feeds cluster objects into a [`MemoryControlPlane`](kubesight_engine::MemoryControlPlane)
//! - [`CheckRunner`] owns the engine and drives periodic runs until shutdown
//! - [`build_sender`] picks where samples go
//!
//! # Example
//!
//! ```ignore
//! use kubesight_check::{CheckConfig, CheckRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CheckConfig::load("kubesight.json5")?;
//!     CheckRunner::new(config).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod config;
pub mod error;
pub mod fixture;
pub mod runner;
pub mod sender;

pub use args::CheckArgs;
pub use config::{CheckConfig, ControlPlaneConfig, KsmConfig, SenderConfig};
pub use error::{CheckError, Result};
pub use fixture::{Fixture, FixtureSync};
pub use runner::CheckRunner;
pub use sender::{JsonLinesSender, LogSender, build_sender};

/// Name the check reports under.
pub const CHECK_NAME: &str = "kube-state-metrics-alpha";
