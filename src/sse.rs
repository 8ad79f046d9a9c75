//! Incremental `text/event-stream` parser.
//!
//! Follows the event stream interpretation rules of the HTML Living Standard:
//! - `event:` sets the type of the next event (default `message`);
//! - `data:` lines are joined with `\n`;
//! - `id:` persists across events until changed;
//! - lines starting with `:` are comments and are ignored;
//! - a blank line dispatches the pending event, unless it has no data.
//!
//! Lines may end in LF, CR or CRLF. A trailing event that is not terminated by
//! a blank line before the stream ends is discarded. A line longer than the
//! configured limit is reported as [`SseError::LineTooLong`] and skipped.

use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Event type used when the server does not send an `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Default upper bound on a single line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

/// Errors produced by [`SseEventStream`].
#[derive(Debug, PartialEq, Eq)]
pub enum SseError<E> {
    /// The underlying byte stream failed.
    Transport(E),
    /// A line grew past the limit (in bytes) without a terminator.
    LineTooLong(usize),
}

impl<E: Display> Display for SseError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => e.fmt(f),
            Self::LineTooLong(max) => write!(f, "event stream line exceeds {max} bytes"),
        }
    }
}

impl<E: std::error::Error> std::error::Error for SseError<E> {}

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type label.
    pub event: String,
    /// Data payload.
    pub data: String,
    /// Last event id seen on the stream.
    pub id: Option<String>,
    /// Reconnection time in milliseconds, if this event carried one.
    pub retry: Option<u64>,
}

#[derive(Debug, Default)]
struct Pending {
    event: Option<String>,
    data: Vec<String>,
    retry: Option<u64>,
}

/// Stream of [`SseEvent`]s parsed from a byte stream.
pub struct SseEventStream<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: Pending,
    last_id: Option<String>,
    max_line_len: usize,
    /// Set after an overlong line until its terminator is seen.
    skipping: bool,
    done: bool,
}

impl<S, E> SseEventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    /// Wrap a byte stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pending: Pending::default(),
            last_id: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            skipping: false,
            done: false,
        }
    }

    /// Limit the length of a single line. Defaults to
    /// [`DEFAULT_MAX_LINE_LEN`].
    pub fn with_max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }

    /// Read the next event.
    ///
    /// Returns `Ok(None)` once the underlying stream has ended. Errors from
    /// the byte stream are passed through; reading may continue afterwards.
    ///
    /// An overlong line drops the event being assembled and yields
    /// [`SseError::LineTooLong`] once; parsing resumes after its terminator.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, SseError<E>> {
        loop {
            while let Some(line) = self.take_line() {
                if std::mem::take(&mut self.skipping) {
                    continue;
                }
                if let Some(event) = self.feed_line(&line) {
                    return Ok(Some(event));
                }
            }

            if self.buffer.len() > self.max_line_len {
                self.buffer.clear();
                self.pending = Pending::default();
                self.skipping = true;
                return Err(SseError::LineTooLong(self.max_line_len));
            }

            if self.done {
                return Ok(None);
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => return Err(SseError::Transport(err)),
                None => self.done = true,
            }
        }
    }

    /// Split the next complete line off the buffer.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r')?;
        let skip = if self.buffer[pos] == b'\r' {
            match self.buffer.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                // A lone CR at the end may be the first half of CRLF.
                None if !self.done => return None,
                None => 1,
            }
        } else {
            1
        };

        let line = String::from_utf8_lossy(&self.buffer[..pos]).into_owned();
        self.buffer.drain(..pos + skip);
        Some(line)
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => self.pending.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.pending.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(&mut self.pending);
        if pending.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: pending
                .event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data: pending.data.join("\n"),
            id: self.last_id.clone(),
            retry: pending.retry,
        })
    }
}

impl<S> std::fmt::Debug for SseEventStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseEventStream")
            .field("buffered", &self.buffer.len())
            .field("last_id", &self.last_id)
            .field("max_line_len", &self.max_line_len)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
