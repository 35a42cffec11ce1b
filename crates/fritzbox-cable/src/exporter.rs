//! One scrape cycle: login, fetch, decode, publish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::channel::{self, ChannelSet, extract_observations};
use crate::client::{RequestObserver, RouterClient};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::fetch::{DATA_RESOURCE, DOC_INFO_PAGE, fetch};
use crate::metrics::MetricsPublisher;
use crate::session::{Session, SessionClient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrapePhase {
    #[default]
    Idle,
    LoggingIn,
    Fetching,
    Parsing,
    Publishing,
}

/// Outcome of a single cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeReport {
    /// Login, fetch and decode all succeeded.
    pub up: bool,
    pub channels: usize,
    /// Observations written to the registry.
    pub published: usize,
    /// Slots skipped because a field did not parse.
    pub parse_errors: usize,
    /// Error kind that failed the cycle, if any.
    pub error: Option<&'static str>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct CycleState {
    phase: ScrapePhase,
    session: Option<Session>,
    cycles: u64,
}

impl CycleState {
    fn enter(&mut self, phase: ScrapePhase) {
        trace!(from = ?self.phase, to = ?phase, cycle = self.cycles, "scrape phase");
        self.phase = phase;
    }
}

#[derive(Debug, Default)]
struct PublishStats {
    channels: usize,
    published: usize,
    parse_errors: usize,
}

/// Scrapes the router on demand and keeps the registry up to date.
///
/// Cycles are serialized: the lock is held from login until the exposition
/// is rendered, so concurrent callers queue and each runs a full cycle.
pub struct Exporter {
    sessions: SessionClient,
    publisher: Arc<MetricsPublisher>,
    state: Mutex<CycleState>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("sessions", &self.sessions)
            .field("namespace", &self.publisher.namespace())
            .finish()
    }
}

impl Exporter {
    /// Create an exporter with its own registry.
    pub fn new(config: RouterConfig) -> Result<Self> {
        Self::with_publisher(config, Arc::new(MetricsPublisher::new()?))
    }

    /// Create an exporter publishing into `publisher`.
    pub fn with_publisher(config: RouterConfig, publisher: Arc<MetricsPublisher>) -> Result<Self> {
        let observer: Arc<dyn RequestObserver> = publisher.clone();
        let client = RouterClient::new(&config)?.with_observer(observer);
        let sessions = SessionClient::new(client, config.username, config.password);

        Ok(Self {
            sessions,
            publisher,
            state: Mutex::new(CycleState::default()),
        })
    }

    pub fn publisher(&self) -> &MetricsPublisher {
        &self.publisher
    }

    /// Number of cycles run so far.
    pub async fn cycles(&self) -> u64 {
        self.state.lock().await.cycles
    }

    /// Run a cycle without rendering the registry.
    pub async fn scrape(&self) -> ScrapeReport {
        let mut state = self.state.lock().await;
        self.run_cycle(&mut state).await
    }

    /// Run a cycle and render the registry in the text exposition format.
    ///
    /// Router failures are reflected in the `up` metric; only rendering
    /// failures are returned.
    pub async fn collect(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let report = self.run_cycle(&mut state).await;
        trace!(up = report.up, "rendering exposition");
        self.publisher.encode()
    }

    async fn run_cycle(&self, state: &mut CycleState) -> ScrapeReport {
        let started = Instant::now();
        state.cycles += 1;
        state.session = None;
        self.publisher.begin_cycle();

        let outcome = self.cycle(state).await;
        state.enter(ScrapePhase::Idle);
        let elapsed = started.elapsed();

        match outcome {
            Ok(stats) => {
                self.publisher.set_up(true);
                debug!(
                    cycle = state.cycles,
                    channels = stats.channels,
                    published = stats.published,
                    parse_errors = stats.parse_errors,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "scrape finished"
                );
                ScrapeReport {
                    up: true,
                    channels: stats.channels,
                    published: stats.published,
                    parse_errors: stats.parse_errors,
                    error: None,
                    elapsed,
                }
            }
            Err(e) => {
                if let Error::Decode { document, .. } = &e {
                    self.publisher.record_parse_error(document);
                }
                self.publisher.set_up(false);
                warn!(cycle = state.cycles, kind = e.kind(), error = %e, "scrape failed");
                ScrapeReport {
                    up: false,
                    error: Some(e.kind()),
                    elapsed,
                    ..ScrapeReport::default()
                }
            }
        }
    }

    async fn cycle(&self, state: &mut CycleState) -> Result<PublishStats> {
        state.enter(ScrapePhase::LoggingIn);
        let session = self.sessions.login().await?;

        state.enter(ScrapePhase::Fetching);
        let session = state.session.insert(session);
        let body = fetch(self.sessions.router(), DATA_RESOURCE, session).await?;

        state.enter(ScrapePhase::Parsing);
        let channels = channel::decode(&body)?;

        state.enter(ScrapePhase::Publishing);
        Ok(self.publish_channels(&channels))
    }

    fn publish_channels(&self, channels: &ChannelSet) -> PublishStats {
        let mut stats = PublishStats {
            channels: channels.channel_count(),
            ..PublishStats::default()
        };

        for (direction, channel_type, records) in channels.groups() {
            for record in records {
                for observation in extract_observations(channel_type, direction, record) {
                    let published = match observation {
                        Ok(observation) => self.publisher.publish(&observation).map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    };

                    match published {
                        Ok(()) => stats.published += 1,
                        Err(reason) => {
                            debug!(%direction, %channel_type, %reason, "skipping channel value");
                            self.publisher.record_parse_error(DOC_INFO_PAGE);
                            stats.parse_errors += 1;
                        }
                    }
                }
            }
        }

        stats
    }
}
