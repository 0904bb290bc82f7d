pub mod annotate;
pub mod config;
pub mod conversation;
pub mod error;
pub mod kb;
pub mod literals;

pub use annotate::{FlowGraph, FlowGraphBuilder, SilverAnnotator};
pub use config::Config;
pub use conversation::{Answer, Conversation, Turn};
pub use error::{ConvflowError, Result};
pub use kb::{HttpKb, KbService, StaticKb};
