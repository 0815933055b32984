//! # a3s-cron-relay
//!
//! Streams LLM explanations and generations of cron expressions, turning the
//! text into structured rows while it is still arriving.
//!
//! ## Overview
//!
//! A relay server accepts an explain or generate request, opens one streaming
//! completion against an OpenAI-compatible provider, and forwards the text
//! chunks to the caller unchanged and in order. On the receiving side an
//! incremental parser reassembles chunks into lines and converts each complete
//! line into a [`Record`] as soon as its newline arrives.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_cron_relay::{Dialect, RecordParser};
//!
//! let records = RecordParser::parse_all(
//!     Dialect::DETAILED,
//!     ["0 | (0 - 59) | at min", "ute 0\n5 | (0 - 23) | at 5am"],
//! );
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[1].get("meaning"), Some("at 5am"));
//! ```
//!
//! ## Architecture
//!
//! - **UpstreamSource** trait: a provider that streams completion text
//! - **Relay**: bounded, cancellable chunk forwarding, one task per request
//! - **RecordParser**: chunk-boundary-independent line and record parsing
//! - **RequestSession** / **SessionSlot**: one submission's lifetime, with
//!   supersession of the previous submission
//! - **RelayClient**: submits requests to a relay server

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod dirs;
pub mod error;
pub mod expression;
pub mod parser;
pub mod prompt;
pub mod relay;
pub mod server;
pub mod session;
pub mod upstream;

pub use client::RelayClient;
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use expression::validate_expression;
pub use parser::{Dialect, ParserState, Record, RecordParser};
pub use prompt::{build_request, Mode};
pub use relay::{Relay, RelayStream};
pub use session::{RequestSession, SessionEvent, SessionHandle, SessionSlot};
pub use upstream::UpstreamSource;
