// --- crates.io ---
use async_std::sync::Mutex;
use async_trait::async_trait;
use futures::AsyncReadExt;
use isahc::{HttpClient, Request};
use serde_json::Value;
// --- roomwatcher ---
use crate::{
	error::{FetchError, RoomwatcherResult},
	r#type::*,
	rpc,
	transport::Transport,
};

pub struct Http {
	pub uri: String,
	pub client: HttpClient,
	pub rpc_id: Mutex<Id>,
}
impl Http {
	pub fn new(uri: impl Into<String>) -> RoomwatcherResult<Self> {
		let uri = uri.into();
		tracing::info!("`Http` sending requests to `{}`", uri);

		Ok(Self {
			uri,
			client: HttpClient::new()?,
			rpc_id: Mutex::new(1),
		})
	}

	async fn next_rpc_id(&self) -> Id {
		let mut rpc_id = self.rpc_id.lock().await;
		let id = *rpc_id;

		*rpc_id = rpc_id.checked_add(1).unwrap_or(1);

		id
	}
}
#[async_trait]
impl Transport for Http {
	async fn request(&self, method: &str, params: Value) -> RoomwatcherResult<Value> {
		let payload = rpc::request_with_id(method, params, self.next_rpc_id().await);
		tracing::trace!("{}", payload);

		let request = Request::post(&self.uri)
			.header("content-type", "application/json")
			// node side gateways must not answer from a cache
			.header("cache-control", "no-cache")
			.body(serde_json::to_vec(&payload)?)?;
		let mut response = self.client.send_async(request).await?;

		if !response.status().is_success() {
			return Err(FetchError::HttpStatus(response.status().as_u16()).into());
		}

		let mut body = Vec::new();

		response
			.body_mut()
			.read_to_end(&mut body)
			.await
			.map_err(FetchError::from)?;

		let response = serde_json::from_slice::<Value>(&body)?;
		tracing::trace!("{:?}", response);

		rpc::take_result(response)
	}
}
