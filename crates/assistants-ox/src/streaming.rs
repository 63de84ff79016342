use std::{pin::Pin, str::FromStr, time::Duration};

use async_stream::try_stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream::BoxStream};
use tracing::trace;

use crate::{
    error::AssistantsError,
    event::{EventName, MessageDeltaObject, RunEvent, RunObject},
};

const DATA_PREFIX: &str = "data: ";
const EVENT_PREFIX: &str = "event:";

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Splits a response body into `\n`-terminated lines as bytes arrive
///
/// Only the current partial line is buffered. A trailing `\r` is dropped, and a
/// final line without a terminator is still returned at end of stream.
pub struct LineReader {
    byte_stream: ByteStream,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a terminator
    scanned: usize,
    idle_timeout: Option<Duration>,
    exhausted: bool,
}

impl LineReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_stream(response.bytes_stream())
    }

    pub fn from_stream(
        stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            byte_stream: Box::pin(stream),
            buffer: Vec::new(),
            scanned: 0,
            idle_timeout: None,
            exhausted: false,
        }
    }

    /// Fail with [`AssistantsError::IdleTimeout`] when no chunk arrives within `limit`
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    /// Next line without its terminator, or `None` once the body is exhausted
    pub async fn next_line(&mut self) -> Result<Option<String>, AssistantsError> {
        loop {
            if let Some(pos) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                let line = self.buffer.drain(..=self.scanned + pos).collect::<Vec<u8>>();
                self.scanned = 0;
                return decode_line(line).map(Some);
            }
            self.scanned = self.buffer.len();

            if self.exhausted {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                self.scanned = 0;
                return decode_line(std::mem::take(&mut self.buffer)).map(Some);
            }

            match self.next_chunk().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => self.exhausted = true,
            }
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, AssistantsError> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.byte_stream.next())
                .await
                .map_err(|_| AssistantsError::IdleTimeout(limit))?,
            None => self.byte_stream.next().await,
        };

        next.transpose().map_err(AssistantsError::Stream)
    }
}

fn decode_line(bytes: Vec<u8>) -> Result<String, AssistantsError> {
    let mut line = String::from_utf8(bytes)?;
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
    Ok(line)
}

/// Strip the `data: ` marker (if present) and surrounding whitespace
fn data_payload(line: &str) -> &str {
    line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim()
}

/// Decodes the run event stream one record at a time
///
/// A record is an `event: <name>` line; for the events this reader cares about
/// the payload is the single line right after it. Any line that is not an
/// `event:` line, and not consumed as a payload, is skipped. After a terminal
/// event the reader stops pulling from the body.
pub struct RunEventReader {
    lines: LineReader,
    finished: bool,
}

impl RunEventReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_lines(LineReader::new(response))
    }

    pub fn from_lines(lines: LineReader) -> Self {
        Self {
            lines,
            finished: false,
        }
    }

    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.lines = self.lines.with_idle_timeout(limit);
        self
    }

    /// Next decoded event, or `None` at end of stream or after a terminal event
    pub async fn next_event(&mut self) -> Result<Option<RunEvent>, AssistantsError> {
        if self.finished {
            return Ok(None);
        }

        while let Some(line) = self.lines.next_line().await? {
            trace!(line = %line, "upstream line");

            let Some(name) = line.strip_prefix(EVENT_PREFIX) else {
                continue;
            };
            let name = name.trim();

            let event = match EventName::from_str(name) {
                Ok(EventName::RunCreated) => self.read_run_created().await?,
                Ok(EventName::MessageDelta) => match self.read_message_delta().await? {
                    Some(event) => event,
                    None => break,
                },
                Ok(EventName::RunCompleted) => RunEvent::RunCompleted,
                Ok(EventName::Done) => RunEvent::Done,
                Err(_) => RunEvent::Other(name.to_string()),
            };

            if event.is_terminal() {
                self.finished = true;
            }
            return Ok(Some(event));
        }

        self.finished = true;
        Ok(None)
    }

    async fn read_run_created(&mut self) -> Result<RunEvent, AssistantsError> {
        let line = self.lines.next_line().await?.ok_or_else(|| {
            AssistantsError::InvalidEventData(format!(
                "stream ended before the {} payload",
                EventName::RunCreated
            ))
        })?;

        let run: RunObject = serde_json::from_str(data_payload(&line)).map_err(|e| {
            AssistantsError::InvalidEventData(format!("{}: {e}", EventName::RunCreated))
        })?;

        Ok(RunEvent::RunCreated(run))
    }

    /// `None` when the body ends where the payload line should be
    async fn read_message_delta(&mut self) -> Result<Option<RunEvent>, AssistantsError> {
        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };

        if !line.starts_with(DATA_PREFIX) {
            return Ok(Some(RunEvent::UnframedDelta(line)));
        }

        let delta: MessageDeltaObject = serde_json::from_str(data_payload(&line)).map_err(|e| {
            AssistantsError::InvalidEventData(format!("{}: {e}", EventName::MessageDelta))
        })?;

        Ok(Some(RunEvent::MessageDelta(delta)))
    }

    /// Turn the reader into a stream of events
    pub fn into_stream(self) -> BoxStream<'static, Result<RunEvent, AssistantsError>> {
        let mut reader = self;
        Box::pin(try_stream! {
            while let Some(event) = reader.next_event().await? {
                yield event;
            }
        })
    }
}
