//! HTTP relay re-streaming OpenAI Assistants runs as plain incremental text
//!
//! A client posts a conversation turn; the relay creates a streamed run for it
//! upstream and forwards, as they are decoded, the thread id to use for the
//! next turn and every text fragment of the reply.

pub mod config;
pub mod error;
pub mod event;
pub mod relay;
pub mod server;

pub use config::{ConfigError, RelayConfig};
pub use error::RelayError;
pub use event::{ClientEvent, StreamFormat};
pub use relay::{Relay, RelayRequest, RelayStats, RelayStream};
pub use server::router;
