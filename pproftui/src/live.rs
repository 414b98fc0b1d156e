//! Live polling of a pprof HTTP endpoint.
//!
//! Fetches run on their own threads and report back through an `mpsc`
//! channel, so the thread that owns the [`Session`](crate::session::Session)
//! never blocks on the network. Every dispatched fetch carries a generation
//! number; the session drops results older than the last one it applied.

use std::io::Read;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::graph;
use crate::model::ProfileData;
use crate::project::ProjectFilter;

/// Failure to retrieve a profile snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http get {url}: {message}")]
    Transport { url: String, message: String },

    #[error("bad status from {url}: {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("IO error reading response: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can produce raw profile bytes on demand.
pub trait ProfileSource: Send + Sync + 'static {
    fn fetch(&self) -> Result<Vec<u8>, FetchError>;

    /// Short label for status lines.
    fn describe(&self) -> String;
}

/// A pprof endpoint such as `http://localhost:6060/debug/pprof/profile?seconds=5`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ProfileSource for HttpSource {
    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        fetch_url(&self.url, self.timeout)
    }

    fn describe(&self) -> String {
        format!("Live: {}", self.url)
    }
}

/// Blocking GET of a profile.
pub fn fetch_url(url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    debug!(url, "fetching profile");
    let response = match ureq::get(url).timeout(timeout).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                body: body.trim().to_string(),
            });
        }
        Err(ureq::Error::Transport(transport)) => {
            return Err(FetchError::Transport {
                url: url.to_string(),
                message: transport.to_string(),
            });
        }
    };

    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;
    info!(url, bytes = bytes.len(), "fetched profile");
    Ok(bytes)
}

/// Messages delivered to the session's event loop.
#[derive(Debug)]
pub enum LiveEvent {
    /// Time to start another fetch.
    Tick,
    Loaded {
        generation: u64,
        data: Box<ProfileData>,
    },
    Failed {
        generation: u64,
        error: crate::Error,
    },
}

/// Fetch, decode and build one snapshot.
pub fn load_snapshot<S: ProfileSource + ?Sized>(
    source: &S,
    filter: Option<&ProjectFilter>,
) -> crate::Result<ProfileData> {
    let bytes = source.fetch()?;
    graph::load_bytes(&bytes, filter)
}

/// Dispatches background fetches, numbering each one.
pub struct Poller<S: ProfileSource> {
    source: Arc<S>,
    filter: Option<ProjectFilter>,
    sender: Sender<LiveEvent>,
    next_generation: u64,
}

impl<S: ProfileSource> Poller<S> {
    pub fn new(source: S, filter: Option<ProjectFilter>, sender: Sender<LiveEvent>) -> Self {
        Self {
            source: Arc::new(source),
            filter,
            sender,
            next_generation: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start a fetch on a new thread and return its generation. Earlier
    /// fetches still in flight are not cancelled.
    pub fn dispatch(&mut self) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        let source = Arc::clone(&self.source);
        let filter = self.filter.clone();
        let sender = self.sender.clone();

        thread::spawn(move || {
            let event = match load_snapshot(source.as_ref(), filter.as_ref()) {
                Ok(data) => LiveEvent::Loaded {
                    generation,
                    data: Box::new(data),
                },
                Err(error) => {
                    warn!(generation, %error, "live fetch failed");
                    LiveEvent::Failed { generation, error }
                }
            };
            // The receiver is gone once the session shuts down.
            let _ = sender.send(event);
        });
        generation
    }
}

/// Emit [`LiveEvent::Tick`] every `interval` until the receiver hangs up.
pub fn spawn_ticker(interval: Duration, sender: Sender<LiveEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            thread::sleep(interval);
            if sender.send(LiveEvent::Tick).is_err() {
                break;
            }
        }
    })
}
