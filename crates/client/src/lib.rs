//! HTTP implementations of the reply and synthesis seams, talking to a
//! `lingo-gateway` compatible server.

mod config;
pub mod consts;
mod error_body;
mod reply_client;
mod stats;
mod tts_client;

pub use config::{Config, ConfigBuilder};
pub use reply_client::HttpReplyClient;
pub use stats::Stats;
pub use tts_client::HttpSynthesisClient;
