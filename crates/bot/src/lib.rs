//! Chat command surface: parsing, dispatch, reply rendering and the webhook
//! HTTP server.

pub mod app;
pub mod command;
pub mod dispatcher;
pub mod middleware;
pub mod render;
pub mod reply;

pub use command::{InboundCommand, Operation, ParseError};
pub use dispatcher::CommandDispatcher;
pub use reply::{Reply, ReplyOption};
