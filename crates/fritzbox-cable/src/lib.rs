//! Prometheus exporter core for the DOCSIS statistics of FRITZ!Box Cable routers.
//!
//! A scrape cycle logs in via `login_sid.lua`, fetches the `docInfo` page from
//! `data.lua`, turns every channel into observations and publishes them into a
//! [`prometheus::Registry`].
//!
//! ```no_run
//! use fritzbox_cable::{Exporter, RouterConfig};
//!
//! # async fn run() -> fritzbox_cable::Result<()> {
//! let config = RouterConfig::new("http://192.168.178.1/").with_credentials("admin", "secret");
//! let exporter = Exporter::new(config)?;
//! let exposition = exporter.collect().await?;
//! println!("{exposition}");
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod exporter;
pub mod fetch;
pub mod metrics;
pub mod session;

pub use channel::{ChannelRecord, ChannelSet, ChannelType, Direction, FieldParseError, Observation};
pub use client::{RequestObserver, RouterClient};
pub use config::RouterConfig;
pub use error::{Error, Result};
pub use exporter::{Exporter, ScrapePhase, ScrapeReport};
pub use metrics::MetricsPublisher;
pub use session::{Session, SessionClient, challenge_response};
