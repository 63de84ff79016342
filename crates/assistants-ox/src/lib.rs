//! Streaming client for the OpenAI Assistants API
//!
//! This crate covers the one call a relay needs from the Assistants v2 API:
//! creating a thread and a run in a single request with `stream: true`, then
//! decoding the server-sent event stream record by record.
//!
//! - Typed request payload for `POST /threads/runs`
//! - Structured decoding of API error bodies
//! - Line-oriented SSE reading that never buffers the whole body
//! - Run events (`thread.run.created`, `thread.message.delta`, ...) decoded lazily
//!
//! # Example
//!
//! ```rust,no_run
//! use assistants_ox::{Assistants, CreateThreadAndRunRequest, RunEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Assistants::new("your-api-key");
//!
//!     let request = CreateThreadAndRunRequest::builder()
//!         .assistant_id("asst_123")
//!         .user_message("Hello, world!")
//!         .build();
//!
//!     let mut events = client.create_thread_and_run_stream(&request).await?;
//!     while let Some(event) = events.next_event().await? {
//!         if let RunEvent::MessageDelta(delta) = event {
//!             for text in delta.texts() {
//!                 print!("{text}");
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod request;
pub mod streaming;

pub use client::Assistants;
pub use error::{ApiErrorDetail, AssistantsError};
pub use event::{DeltaContent, EventName, MessageDelta, MessageDeltaObject, RunEvent, RunObject, TextDelta};
pub use request::{CreateThreadAndRunRequest, ThreadMessage, ThreadSeed};
pub use streaming::{LineReader, RunEventReader};
