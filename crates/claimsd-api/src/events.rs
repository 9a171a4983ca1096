//! Claims-watch push events.
//!
//! The service exposes `/api/v1/claims/watch` as a `text/event-stream`
//! (server-sent events). Each event carries a `type` and a data payload;
//! the two types the refresh engine reacts to are [`EVENT_HELLO`] (sent once
//! after connecting) and [`EVENT_CLAIMS_UPDATED`] (sent whenever the service
//! has new claims data).
//!
//! The subscription is a plain [`Stream`]; reconnect policy is the caller's
//! concern (the client crate's watch task reconnects with a fixed delay).

use futures_util::Stream;
use futures_util::StreamExt;

use crate::client::{ApiClient, WATCH_PATH};
use crate::error::Error;

/// Event type sent by the service right after the subscription opens.
pub const EVENT_HELLO: &str = "hello";

/// Event type sent by the service when the claims data changed.
pub const EVENT_CLAIMS_UPDATED: &str = "claims-updated";

/// A single push event from the claims-watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsEvent {
    /// Event type (`hello`, `claims-updated`, ...). Defaults to `message`
    /// when the stream omits the `event:` field.
    pub event_type: String,
    /// Raw event payload. Usually a small JSON fragment; the refresh engine
    /// only dispatches on the type.
    pub data: String,
}

impl ApiClient {
    /// Subscribe to the claims-watch event stream.
    ///
    /// Yields events until the server closes the stream (clean end) or the
    /// connection fails (`Err` item, after which the stream is exhausted).
    pub fn subscribe(
        &self,
        product: Option<&str>,
    ) -> impl Stream<Item = Result<ClaimsEvent, Error>> + Send + 'static {
        let http = self.http().clone();
        let url = self.service_url(WATCH_PATH, product);

        async_stream::try_stream! {
            let url = url?;
            tracing::debug!("GET {url} (event stream)");

            let resp = http.get(url).send().await.map_err(Error::Transport)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Api { status: status.as_u16(), body })?;
                return;
            }

            let mut body = resp.bytes_stream();
            let mut parser = EventParser::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(Error::Transport)?;
                for event in parser.push(&chunk) {
                    yield event;
                }
            }
        }
    }
}

// ── Wire parsing ─────────────────────────────────────────────────────

/// Incremental `text/event-stream` parser.
///
/// Feed it raw body chunks, get back completed events. Field handling per
/// the SSE wire format: `event:` sets the type, `data:` lines accumulate
/// (joined with newlines), `:` lines are comments, a blank line dispatches.
/// `id:` and `retry:` fields are ignored — the service does not use them.
pub(crate) struct EventParser {
    buf: String,
    event_type: String,
    data: String,
}

impl EventParser {
    pub(crate) fn new() -> Self {
        Self {
            buf: String::new(),
            event_type: String::new(),
            data: String::new(),
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<ClaimsEvent> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else {
                self.field(line);
            }
        }
        events
    }

    /// Complete the pending event, if any fields were collected.
    fn dispatch(&mut self) -> Option<ClaimsEvent> {
        if self.event_type.is_empty() && self.data.is_empty() {
            return None;
        }

        let event_type = if self.event_type.is_empty() {
            "message".to_owned()
        } else {
            std::mem::take(&mut self.event_type)
        };

        Some(ClaimsEvent {
            event_type,
            data: std::mem::take(&mut self.data),
        })
    }

    /// Process one non-blank line.
    fn field(&mut self, line: &str) {
        if line.starts_with(':') {
            // Comment / keep-alive line.
            return;
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match name {
            "event" => self.event_type = value.to_owned(),
            "data" => {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
            }
            _ => {}
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
