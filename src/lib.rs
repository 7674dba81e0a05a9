//! Dot Traffic: routes inbound agency email and Teams messages to workflows.

pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod lookup;
pub mod routing;
pub mod server;
