use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Event names of the run stream this crate decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum EventName {
    #[strum(serialize = "thread.run.created")]
    RunCreated,

    #[strum(serialize = "thread.message.delta")]
    MessageDelta,

    #[strum(serialize = "thread.run.completed")]
    RunCompleted,

    #[strum(serialize = "done")]
    Done,
}

/// A decoded record of the run event stream
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run was created; carries the (possibly new) thread id
    RunCreated(RunObject),

    /// Incremental message content
    MessageDelta(MessageDeltaObject),

    /// A `thread.message.delta` event whose next line was not a `data: ` line.
    /// The offending line is consumed and carried here.
    UnframedDelta(String),

    RunCompleted,

    Done,

    /// Any event name not listed in [`EventName`]; its payload is not read
    Other(String),
}

impl RunEvent {
    /// Returns true if nothing meaningful follows this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted | Self::Done)
    }

    /// Event name as it appeared on the wire
    pub fn name(&self) -> &str {
        match self {
            Self::RunCreated(_) => EventName::RunCreated.into(),
            Self::MessageDelta(_) | Self::UnframedDelta(_) => EventName::MessageDelta.into(),
            Self::RunCompleted => EventName::RunCompleted.into(),
            Self::Done => EventName::Done.into(),
            Self::Other(name) => name,
        }
    }
}

/// The parts of a run object needed to continue a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunObject {
    /// Thread the run executes on
    pub thread_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Payload of a `thread.message.delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeltaObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub delta: MessageDelta,
}

impl MessageDeltaObject {
    /// Text values of all `text` fragments, in fragment order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.delta.content.iter().filter_map(DeltaContent::text_value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Vec<DeltaContent>,
}

/// One content fragment of a delta. Only `text` fragments carry a value this
/// crate understands; image and other fragments keep just their tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaContent {
    #[serde(default)]
    pub index: u32,

    #[serde(default)]
    pub r#type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextDelta>,
}

impl DeltaContent {
    /// Text value when this fragment is of type `text`
    pub fn text_value(&self) -> Option<&str> {
        if self.r#type != "text" {
            return None;
        }
        self.text.as_ref().map(|text| text.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDelta {
    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_event_name_parsing() {
        assert_eq!(
            EventName::from_str("thread.run.created").unwrap(),
            EventName::RunCreated
        );
        assert_eq!(EventName::from_str("done").unwrap(), EventName::Done);
        assert!(EventName::from_str("thread.run.step.created").is_err());
        assert_eq!(EventName::MessageDelta.to_string(), "thread.message.delta");
    }

    #[test]
    fn test_delta_texts_skip_non_text_fragments() {
        let data = r#"{
            "id": "msg_1",
            "object": "thread.message.delta",
            "delta": {"content": [
                {"index": 0, "type": "text", "text": {"value": "Hello", "annotations": []}},
                {"index": 1, "type": "image_file", "image_file": {"file_id": "file_1"}}
            ]}
        }"#;
        let delta: MessageDeltaObject = serde_json::from_str(data).unwrap();

        assert_eq!(delta.delta.content.len(), 2);
        assert_eq!(delta.texts().collect::<Vec<_>>(), ["Hello"]);
    }

    #[test]
    fn test_delta_without_content() {
        let delta: MessageDeltaObject = serde_json::from_str(r#"{"delta": {}}"#).unwrap();
        assert_eq!(delta.texts().count(), 0);
    }

    #[test]
    fn test_run_object_requires_thread_id() {
        let run: RunObject =
            serde_json::from_str(r#"{"id":"run_1","object":"thread.run","thread_id":"thread_1","status":"queued"}"#)
                .unwrap();
        assert_eq!(run.thread_id, "thread_1");
        assert_eq!(run.status.as_deref(), Some("queued"));

        assert!(serde_json::from_str::<RunObject>(r#"{"id":"run_1"}"#).is_err());
    }

    #[test]
    fn test_terminal_events() {
        assert!(RunEvent::RunCompleted.is_terminal());
        assert!(RunEvent::Done.is_terminal());
        assert!(!RunEvent::Other("thread.run.step.created".into()).is_terminal());
        assert_eq!(RunEvent::UnframedDelta(String::new()).name(), "thread.message.delta");
    }
}
