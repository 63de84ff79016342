use bon::Builder;
use serde::{Deserialize, Serialize};

/// A single conversation message seeded into a new thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Author role, passed through untouched ("user", "assistant", ...)
    pub role: String,

    /// Plain text content
    pub content: String,
}

impl ThreadMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// The `thread` object of a create-thread-and-run request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSeed {
    pub messages: Vec<ThreadMessage>,
}

/// Request body for `POST /threads/runs`
///
/// Always asks for a streamed run. `thread_id` is only serialized when a
/// non-empty id was supplied, so the first turn of a conversation lets the
/// provider allocate a new thread.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct CreateThreadAndRunRequest {
    /// Messages the thread is seeded with, in conversation order
    #[builder(field)]
    pub thread: ThreadSeed,

    /// Existing thread to continue
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(field)]
    pub thread_id: Option<String>,

    /// Assistant that executes the run
    #[builder(into)]
    pub assistant_id: String,

    #[builder(skip = true)]
    pub stream: bool,
}

impl CreateThreadAndRunRequest {
    /// Messages that will seed the thread
    pub fn messages(&self) -> &[ThreadMessage] {
        &self.thread.messages
    }
}

// Builder extensions for convenience methods
impl<S: create_thread_and_run_request_builder::State> CreateThreadAndRunRequestBuilder<S> {
    /// Add a user message
    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.thread.messages.push(ThreadMessage::user(content));
        self
    }

    /// Add an assistant message
    pub fn assistant_message(mut self, content: impl Into<String>) -> Self {
        self.thread.messages.push(ThreadMessage::assistant(content));
        self
    }

    /// Add a message
    pub fn message(mut self, message: ThreadMessage) -> Self {
        self.thread.messages.push(message);
        self
    }

    /// Add several messages, keeping their order
    pub fn messages(mut self, messages: impl IntoIterator<Item = ThreadMessage>) -> Self {
        self.thread.messages.extend(messages);
        self
    }

    /// Continue an existing thread. An empty id is treated as "no thread".
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        let thread_id = thread_id.into();
        self.thread_id = (!thread_id.is_empty()).then_some(thread_id);
        self
    }

    /// Same as [`Self::thread_id`], accepting an optional id
    pub fn maybe_thread_id(self, thread_id: Option<String>) -> Self {
        match thread_id {
            Some(thread_id) => self.thread_id(thread_id),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_without_thread_id() {
        let request = CreateThreadAndRunRequest::builder()
            .assistant_id("asst_1")
            .user_message("Hi")
            .build();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "assistant_id": "asst_1",
                "thread": {"messages": [{"role": "user", "content": "Hi"}]},
                "stream": true
            })
        );
    }

    #[test]
    fn test_payload_with_thread_id() {
        let request = CreateThreadAndRunRequest::builder()
            .assistant_id("asst_1")
            .thread_id("thread_abc")
            .user_message("Hi")
            .build();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["thread_id"], "thread_abc");
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_empty_thread_id_is_omitted() {
        let request = CreateThreadAndRunRequest::builder()
            .assistant_id("asst_1")
            .maybe_thread_id(Some(String::new()))
            .build();

        assert_eq!(request.thread_id, None);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("thread_id").is_none());
    }

    #[test]
    fn test_messages_keep_order() {
        let request = CreateThreadAndRunRequest::builder()
            .assistant_id("asst_1")
            .user_message("first")
            .assistant_message("second")
            .messages([ThreadMessage::new("user", "third")])
            .build();

        let contents: Vec<&str> = request
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert_eq!(request.messages()[1].role, "assistant");
    }
}
