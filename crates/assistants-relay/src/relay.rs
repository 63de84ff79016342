use assistants_ox::{Assistants, CreateThreadAndRunRequest, RunEvent, RunEventReader, ThreadMessage};
use async_stream::try_stream;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{
    config::{ConfigError, RelayConfig},
    error::RelayError,
    event::ClientEvent,
};

/// Client events of one relay call, in upstream order
pub type RelayStream = BoxStream<'static, Result<ClientEvent, RelayError>>;

/// One conversation turn submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    /// Thread to continue; absent or empty starts a new one
    #[serde(default)]
    pub thread_id: Option<String>,

    pub messages: Vec<ThreadMessage>,
}

impl RelayRequest {
    pub fn resumes_thread(&self) -> bool {
        self.thread_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Forwards conversation turns to an assistant and re-streams the run
#[derive(Debug, Clone)]
pub struct Relay {
    assistants: Assistants,
    assistant_id: String,
    secrets: Result<(), ConfigError>,
}

impl Relay {
    /// Build the upstream client. Missing secrets do not fail here; they fail
    /// every call to [`Relay::open`] instead.
    pub fn new(config: &RelayConfig) -> Result<Self, ConfigError> {
        let client = Assistants::http_client(config.connect_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let assistants = Assistants::builder()
            .api_key(config.api_key.clone())
            .base_url(config.base_url.clone())
            .beta_header(config.beta_header.clone())
            .client(client)
            .maybe_response_timeout(config.response_timeout())
            .maybe_idle_timeout(config.idle_timeout())
            .build();

        Ok(Self {
            assistants,
            assistant_id: config.assistant_id.clone(),
            secrets: config.validate_secrets(),
        })
    }

    /// Start one relay call
    ///
    /// Resolves once the upstream accepted the run, so every failure up to
    /// that point can still be reported with a proper status. The returned
    /// stream then yields client events as upstream records are decoded.
    pub async fn open(&self, request: RelayRequest) -> Result<RelayStream, RelayError> {
        self.secrets.clone()?;

        let run_request = CreateThreadAndRunRequest::builder()
            .assistant_id(self.assistant_id.clone())
            .maybe_thread_id(request.thread_id)
            .messages(request.messages)
            .build();

        let reader = self
            .assistants
            .create_thread_and_run_stream(&run_request)
            .await?;

        Ok(relay_events(reader))
    }
}

/// Per-call counters, logged when the call ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub sessions_announced: u32,
    pub text_fragments: u32,
    pub non_text_fragments: u32,
    pub unframed_deltas: u32,
    pub ignored_events: u32,
}

/// Logs the call outcome when the stream is dropped, including when the
/// client disconnects half-way
struct CallTrace {
    stats: RelayStats,
    outcome: Option<&'static str>,
}

impl CallTrace {
    fn finish(&mut self, outcome: &'static str) {
        self.outcome = Some(outcome);
    }
}

impl Drop for CallTrace {
    fn drop(&mut self) {
        let stats = self.stats;
        match self.outcome {
            Some(outcome) => info!(
                outcome,
                sessions = stats.sessions_announced,
                text_fragments = stats.text_fragments,
                non_text_fragments = stats.non_text_fragments,
                unframed_deltas = stats.unframed_deltas,
                ignored_events = stats.ignored_events,
                "relay call finished"
            ),
            None => debug!(
                text_fragments = stats.text_fragments,
                "relay stream dropped before completion, upstream read cancelled"
            ),
        }
    }
}

pub(crate) fn relay_events(mut reader: RunEventReader) -> RelayStream {
    Box::pin(try_stream! {
        let mut call = CallTrace { stats: RelayStats::default(), outcome: None };

        loop {
            let next = reader
                .next_event()
                .await
                .inspect_err(|_| call.finish("failed"))?;

            let Some(event) = next else {
                debug!("upstream ended without a terminal event");
                call.finish("end_of_stream");
                break;
            };

            match event {
                RunEvent::RunCreated(run) => {
                    call.stats.sessions_announced += 1;
                    debug!(thread_id = %run.thread_id, "run created");
                    yield ClientEvent::Session { thread_id: run.thread_id };
                }
                RunEvent::MessageDelta(delta) => {
                    for fragment in delta.delta.content {
                        match fragment.text_value() {
                            Some("") => {}
                            Some(text) => {
                                call.stats.text_fragments += 1;
                                yield ClientEvent::Text(text.to_string());
                            }
                            None => call.stats.non_text_fragments += 1,
                        }
                    }
                }
                RunEvent::UnframedDelta(line) => {
                    call.stats.unframed_deltas += 1;
                    debug!(%line, "skipping delta without a data line");
                }
                RunEvent::RunCompleted => {
                    call.finish("completed");
                    break;
                }
                RunEvent::Done => {
                    call.finish("done");
                    break;
                }
                RunEvent::Other(name) => {
                    call.stats.ignored_events += 1;
                    trace!(event = %name, "ignoring event");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistants_ox::LineReader;
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};

    fn events_from(body: &'static str) -> RelayStream {
        let chunks: Vec<Result<Bytes, reqwest::Error>> =
            vec![Ok(Bytes::from_static(body.as_bytes()))];
        relay_events(RunEventReader::from_lines(LineReader::from_stream(stream::iter(chunks))))
    }

    fn text(value: &str) -> ClientEvent {
        ClientEvent::Text(value.to_string())
    }

    #[tokio::test]
    async fn test_session_then_text_in_order() {
        let events: Vec<ClientEvent> = events_from(concat!(
            "event: thread.run.created\n",
            "data: {\"thread_id\":\"abc123\"}\n\n",
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"Hel\"}}]}}\n\n",
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"lo\"}}]}}\n\n",
            "event: thread.run.completed\n",
            "data: {}\n\n",
        ))
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(
            events,
            [
                ClientEvent::Session {
                    thread_id: "abc123".to_string()
                },
                text("Hel"),
                text("lo"),
            ]
        );
    }

    #[tokio::test]
    async fn test_text_before_session_is_not_reordered() {
        let events: Vec<ClientEvent> = events_from(concat!(
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"early\"}}]}}\n",
            "event: thread.run.created\n",
            "data: {\"thread_id\":\"t\"}\n",
        ))
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(events[0], text("early"));
        assert!(matches!(events[1], ClientEvent::Session { .. }));
    }

    #[tokio::test]
    async fn test_only_text_fragments_are_forwarded() {
        let events: Vec<ClientEvent> = events_from(concat!(
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[",
            "{\"index\":0,\"type\":\"text\",\"text\":{\"value\":\"Hello\"}},",
            "{\"index\":1,\"type\":\"image_file\",\"image_file\":{\"file_id\":\"f\"}},",
            "{\"index\":2,\"type\":\"text\",\"text\":{\"value\":\"\"}}",
            "]}}\n",
            "event: done\n",
        ))
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(events, [text("Hello")]);
    }

    #[tokio::test]
    async fn test_leniency_for_unframed_deltas_and_unknown_events() {
        let events: Vec<ClientEvent> = events_from(concat!(
            "event: thread.run.step.delta\n",
            "data: {\"whatever\":true}\n",
            "event: thread.message.delta\n",
            "not a data line\n",
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"ok\"}}]}}\n",
        ))
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(events, [text("ok")]);
    }

    #[tokio::test]
    async fn test_decode_failure_ends_stream_with_error() {
        let results: Vec<Result<ClientEvent, RelayError>> = events_from(concat!(
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"partial\"}}]}}\n",
            "event: thread.run.created\n",
            "data: {oops\n",
            "event: thread.message.delta\n",
            "data: {\"delta\":{\"content\":[{\"type\":\"text\",\"text\":{\"value\":\"never\"}}]}}\n",
        ))
        .collect()
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &text("partial"));
        assert!(matches!(results[1], Err(RelayError::StreamDecode(_))));
    }

    #[tokio::test]
    async fn test_nothing_is_read_after_completion() {
        let events: Vec<Result<ClientEvent, RelayError>> = events_from(concat!(
            "event: thread.run.completed\n",
            "data: {}\n",
            "event: thread.run.created\n",
            "data: {oops\n",
        ))
        .collect()
        .await;

        assert!(events.is_empty());
    }

    #[test]
    fn test_resumes_thread() {
        let mut request = RelayRequest {
            thread_id: None,
            messages: vec![ThreadMessage::user("hi")],
        };
        assert!(!request.resumes_thread());
        request.thread_id = Some(String::new());
        assert!(!request.resumes_thread());
        request.thread_id = Some("thread_1".into());
        assert!(request.resumes_thread());
    }
}
