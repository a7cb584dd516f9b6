//! ComfyUI WebSocket and REST client library.
//!
//! Provides typed message parsing, the WebSocket notification channel,
//! HTTP API wrappers, and the submit / await-completion / fetch-outputs
//! cycle used to run one job graph on a ComfyUI server.

pub mod api;
pub mod artifacts;
pub mod client;
pub mod execution;
pub mod executor;
pub mod messages;
pub mod processor;
