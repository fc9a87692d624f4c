// --- crates.io ---
use async_trait::async_trait;
use serde_json::Value;
// --- roomwatcher ---
use crate::{error::RoomwatcherResult, http::Http, websocket::Websocket};

#[async_trait]
pub trait Transport: Send + Sync {
	/// Send one JSON-RPC request and wait for its `result`.
	async fn request(&self, method: &str, params: Value) -> RoomwatcherResult<Value>;
}

/// Pick the transport from the uri scheme, `ws://` and `wss://` keep a socket open.
pub async fn connect(uri: &str) -> RoomwatcherResult<Box<dyn Transport>> {
	if uri.starts_with("ws://") || uri.starts_with("wss://") {
		Ok(Box::new(Websocket::connect(uri.to_owned()).await?))
	} else {
		Ok(Box::new(Http::new(uri)?))
	}
}
