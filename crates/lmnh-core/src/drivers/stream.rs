use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

use crate::loader::Loader;
use crate::source::{SourceError, StreamSource};
use crate::types::RawRecord;

use super::{load_record, LoadSummary, RowReport};

/// What the stream cap counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapMode {
    /// Every poll, empty or not.
    #[default]
    Iterations,
    /// Only polls that delivered a message.
    Messages,
}

#[derive(Debug, Error)]
#[error("unknown cap mode '{0}', expected 'iterations' or 'messages'")]
pub struct ParseCapModeError(String);

impl FromStr for CapMode {
    type Err = ParseCapModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iterations" => Ok(CapMode::Iterations),
            "messages" => Ok(CapMode::Messages),
            _ => Err(ParseCapModeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Stop after this many counted polls; `None` runs until stopped.
    /// The cap is checked before each poll: `Some(n)` makes exactly `n`
    /// polls and `Some(0)` makes none, not the `n + 1` a check after polling
    /// would give.
    pub cap: Option<u64>,
    pub cap_by: CapMode,
    pub poll_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            cap: None,
            cap_by: CapMode::Iterations,
            poll_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub polls: u64,
    pub messages: u64,
    pub load: LoadSummary,
}

impl StreamSummary {
    fn cap_reached(&self, options: &StreamOptions) -> bool {
        match (options.cap, options.cap_by) {
            (None, _) => false,
            (Some(cap), CapMode::Iterations) => self.polls >= cap,
            (Some(cap), CapMode::Messages) => self.messages >= cap,
        }
    }
}

/// Poll `source` and load every message until the cap is reached, the source
/// is exhausted, or `stop` turns true. The stop flag is checked between polls.
pub async fn run_stream<S>(
    loader: &Loader,
    source: &mut S,
    options: &StreamOptions,
    stop: watch::Receiver<bool>,
) -> Result<StreamSummary>
where
    S: StreamSource + ?Sized,
{
    let mut summary = StreamSummary::default();

    loop {
        if *stop.borrow() {
            info!(polls = summary.polls, "Stop requested, closing stream");
            break;
        }
        if summary.cap_reached(options) {
            break;
        }

        summary.polls += 1;
        let payload = match source.poll(options.poll_timeout).await {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(SourceError::Exhausted) => {
                info!(polls = summary.polls, "Event source exhausted");
                break;
            }
            Err(SourceError::Transport(err)) => {
                error!("Event source error: {err}");
                continue;
            }
            Err(err) => return Err(err).context("reading from the event source failed"),
        };
        summary.messages += 1;

        let text = String::from_utf8_lossy(&payload);
        let report = match RawRecord::from_json(&payload) {
            Ok(raw) => load_record(loader, &raw).await?,
            Err(err) => RowReport::Invalid(err),
        };
        match &report {
            RowReport::Invalid(err) => error!("INVALID: {text}, with ERROR: {err}"),
            _ => info!("MESSAGE: {text}"),
        }
        summary.load.record(&report);
    }

    Ok(summary)
}
