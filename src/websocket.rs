// --- std ---
use std::{collections::HashMap, fmt::Display};
// --- crates.io ---
use async_std::{
	channel::{self, Sender},
	sync::{Arc, Mutex},
	task::{self, JoinHandle},
};
use async_trait::async_trait;
use async_tungstenite::{
	async_std as tungstenite_async_std,
	tungstenite::{client::IntoClientRequest, Message},
};
use futures::{
	future::{self, Either},
	pin_mut, SinkExt, StreamExt,
};
use serde_json::Value;
// --- roomwatcher ---
use crate::{
	error::{RoomwatcherResult, WebsocketError},
	r#type::*,
	rpc,
	transport::Transport,
};

type Pending = Arc<Mutex<HashMap<Id, Sender<Value>>>>;

#[derive(Debug)]
pub struct Websocket {
	pub handle: Option<JoinHandle<RoomwatcherResult<()>>>,
	pub sender: Sender<String>,
	pub rpc_id: RpcId,
	pub pending: Pending,
}
impl Websocket {
	pub async fn connect(
		uri: impl Display + IntoClientRequest + Send + Unpin,
	) -> RoomwatcherResult<Self> {
		tracing::info!("`Websocket` starting a new connection to `{}`", uri);

		let (client_sender, node_receiver) = channel::unbounded::<String>();
		let pending = Arc::new(Mutex::new(HashMap::new()));
		let (websocket, _) = tungstenite_async_std::connect_async(uri).await?;
		let (mut write, mut read) = websocket.split();
		let pending_cloned = pending.clone();
		let handle = task::spawn(async move {
			let result: RoomwatcherResult<()> = async {
				let mut read_future = read.next();

				loop {
					let recv_future = node_receiver.recv();

					pin_mut!(recv_future);

					match future::select(recv_future, read_future).await {
						Either::Left((msg, read_future_continue)) => {
							// every client side sender is gone
							let msg = match msg {
								Ok(msg) => msg,
								Err(_) => break,
							};
							tracing::trace!("{}", msg);

							write.send(Message::Text(msg)).await?;

							read_future = read_future_continue;
						}
						Either::Right((msg, _)) => {
							match msg {
								Some(msg) => {
									match msg? {
										Message::Text(text) => {
											dispatch(text.as_bytes(), &pending_cloned).await
										}
										Message::Binary(bytes) => {
											dispatch(&bytes, &pending_cloned).await
										}
										Message::Close(frame) => {
											tracing::info!("`Websocket` closed by node {:?}", frame);

											break;
										}
										_ => (),
									}

									read_future = read.next();
								}
								None => break,
							};
						}
					}
				}

				Ok(())
			}
			.await;

			// refuse new requests first, then wake every waiting one
			node_receiver.close();
			pending_cloned.lock().await.clear();

			result
		});

		Ok(Self {
			handle: Some(handle),
			sender: client_sender,
			rpc_id: RpcId(Mutex::new(1)),
			pending,
		})
	}

	pub async fn disconnect(self) {
		if let Some(handle) = self.handle {
			handle.cancel().await;
		}
	}

	pub async fn send(&self, msg: impl Into<String>) -> RoomwatcherResult<()> {
		Ok(self
			.sender
			.send(msg.into())
			.await
			.map_err(|_| WebsocketError::AlreadyClosed)?)
	}

	pub async fn rpc_id(&self) -> Id {
		self.rpc_id.get().await
	}
}
#[async_trait]
impl Transport for Websocket {
	async fn request(&self, method: &str, params: Value) -> RoomwatcherResult<Value> {
		let rpc_id = self.rpc_id().await;
		let (sender, receiver) = channel::bounded(1);

		self.pending.lock().await.insert(rpc_id, sender);

		let msg = serde_json::to_string(&rpc::request_with_id(method, params, rpc_id))?;

		if let Err(e) = self.send(msg).await {
			self.pending.lock().await.remove(&rpc_id);

			return Err(e);
		}

		let response = receiver
			.recv()
			.await
			.map_err(|_| WebsocketError::AlreadyClosed)?;

		rpc::take_result(response)
	}
}

async fn dispatch(msg: &[u8], pending: &Mutex<HashMap<Id, Sender<Value>>>) {
	let msg = match serde_json::from_slice::<Value>(msg) {
		Ok(msg) => msg,
		Err(e) => {
			tracing::error!("Failed to parse node message: {}", e);

			return;
		}
	};
	tracing::trace!("{:?}", msg);

	if let Some(rpc_id) = msg["id"].as_u64() {
		let sender = pending.lock().await.remove(&rpc_id);

		if let Some(sender) = sender {
			let _ = sender.send(msg).await;
		}
	} else {
		// subscriptions are never opened on this socket
		tracing::error!("{:?}", msg);
	}
}

#[derive(Debug)]
pub struct RpcId(Mutex<Id>);
impl RpcId {
	pub async fn get(&self) -> Id {
		let mut mutex = self.0.lock().await;
		let id = *mutex;

		if id == Id::MAX {
			*mutex = 1;
		} else {
			*mutex += 1;
		}

		id
	}
}
