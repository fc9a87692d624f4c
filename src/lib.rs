pub mod config;
pub mod directory;
pub mod error;
pub mod event;
pub mod history;
pub mod http;
pub mod lobby;
pub mod node;
pub mod room;
pub mod rpc;
pub mod source;
pub mod transport;
pub mod r#type;
pub mod websocket;

#[cfg(test)]
mod mock;
