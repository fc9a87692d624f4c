// --- std ---
use std::time::{Duration, Instant};
// --- crates.io ---
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_primitives::U64;
use async_std::sync::Mutex;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
// --- roomwatcher ---
use crate::{
	directory::ContractInfo,
	error::{FetchError, RoomwatcherResult},
	r#type::*,
	rpc,
	source::*,
	transport::{self, Transport},
};

/// Point-in-time contract reads.
#[async_trait]
pub trait ContractReader: Send + Sync {
	async fn call(
		&self,
		contract: &ContractInfo,
		function_name: &str,
		args: &[DynSolValue],
	) -> RoomwatcherResult<Vec<DynSolValue>>;
}

pub struct Node {
	pub uri: String,
	pub transport: Box<dyn Transport>,
	pub chain_id: ChainId,
	pub height_cache_ttl: Duration,
	pub height: Mutex<Option<(Instant, BlockNumber)>>,
}
impl Node {
	pub async fn connect(
		uri: impl Into<String>,
		height_cache_ttl: Duration,
	) -> RoomwatcherResult<Self> {
		let uri = uri.into();
		let transport = transport::connect(&uri).await?;
		let chain_id: ChainId = transport
			.request(rpc::CHAIN_ID, json!([]))
			.await
			.and_then(|chain_id| Ok(serde_json::from_value::<U64>(chain_id)?))?
			.to();

		tracing::info!("Connected to chain `{}` at `{}`", chain_id, uri);

		Ok(Self {
			uri,
			transport,
			chain_id,
			height_cache_ttl,
			height: Mutex::new(None),
		})
	}

	pub fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	async fn request<T>(&self, method: &str, params: Value) -> RoomwatcherResult<Option<T>>
	where
		T: DeserializeOwned,
	{
		let result = self.transport.request(method, params).await?;

		if result.is_null() {
			return Ok(None);
		}

		Ok(Some(serde_json::from_value(result)?))
	}

	async fn request_by_hash<T>(
		&self,
		method: &str,
		params: Value,
		kind: &'static str,
		hash: Hash,
	) -> RoomwatcherResult<T>
	where
		T: DeserializeOwned,
	{
		self.request(method, params).await?.ok_or_else(|| {
			FetchError::NotFound {
				kind,
				hash: hash.to_string(),
			}
			.into()
		})
	}
}
#[async_trait]
impl LogSource for Node {
	async fn current_height(&self, cache: CachePolicy) -> RoomwatcherResult<BlockNumber> {
		if cache == CachePolicy::Allow {
			if let Some((at, height)) = *self.height.lock().await {
				if at.elapsed() < self.height_cache_ttl {
					return Ok(height);
				}
			}
		}

		// no lock across the request, sibling subscriptions share this node
		let height: BlockNumber = self
			.request::<U64>(rpc::BLOCK_NUMBER, json!([]))
			.await?
			.ok_or_else(|| FetchError::UnexpectedResponse("null block number".into()))?
			.to();
		let mut cached = self.height.lock().await;
		let newest = cached.map_or(height, |(_, cached)| cached.max(height));

		*cached = Some((Instant::now(), newest));

		Ok(height)
	}

	async fn logs(&self, query: &LogQuery) -> RoomwatcherResult<Vec<RawLog>> {
		Ok(self
			.request(rpc::GET_LOGS, rpc::get_logs_params(query))
			.await?
			.unwrap_or_default())
	}

	async fn block_by_hash(&self, hash: Hash) -> RoomwatcherResult<BlockRecord> {
		self.request_by_hash(
			rpc::GET_BLOCK_BY_HASH,
			rpc::get_block_by_hash_params(hash),
			"block",
			hash,
		)
		.await
	}

	async fn transaction_by_hash(&self, hash: Hash) -> RoomwatcherResult<TransactionRecord> {
		self.request_by_hash(
			rpc::GET_TRANSACTION_BY_HASH,
			rpc::hash_params(hash),
			"transaction",
			hash,
		)
		.await
	}

	async fn transaction_receipt(&self, hash: Hash) -> RoomwatcherResult<ReceiptRecord> {
		self.request_by_hash(
			rpc::GET_TRANSACTION_RECEIPT,
			rpc::hash_params(hash),
			"receipt",
			hash,
		)
		.await
	}
}
#[async_trait]
impl ContractReader for Node {
	async fn call(
		&self,
		contract: &ContractInfo,
		function_name: &str,
		args: &[DynSolValue],
	) -> RoomwatcherResult<Vec<DynSolValue>> {
		let function = contract.function(function_name)?;
		let input = Bytes::from(function.abi_encode_input(args).map_err(FetchError::from)?);
		let output = self
			.request::<Bytes>(rpc::CALL, rpc::call_params(contract.address, &input))
			.await?
			.unwrap_or_default();

		Ok(function
			.abi_decode_output(&output)
			.map_err(FetchError::from)?)
	}
}
