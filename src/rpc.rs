//! JSON-RPC 2.0 payloads for the `eth` namespace.

// --- crates.io ---
use serde_json::{json, Value};
// --- roomwatcher ---
use crate::{
	error::{FetchError, RoomwatcherResult},
	r#type::*,
	source::LogQuery,
};

pub const BLOCK_NUMBER: &str = "eth_blockNumber";
pub const CALL: &str = "eth_call";
pub const CHAIN_ID: &str = "eth_chainId";
pub const GET_BLOCK_BY_HASH: &str = "eth_getBlockByHash";
pub const GET_LOGS: &str = "eth_getLogs";
pub const GET_TRANSACTION_BY_HASH: &str = "eth_getTransactionByHash";
pub const GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";

pub fn request_with_id(method: &str, params: Value, id: Id) -> Value {
	json!({
		"jsonrpc": "2.0",
		"id": id,
		"method": method,
		"params": params,
	})
}

/// Unwrap the `result` of a response, turning a node-side `error` object into [`FetchError::Rpc`].
pub fn take_result(mut response: Value) -> RoomwatcherResult<Value> {
	if let Some(error) = response.get("error") {
		return Err(FetchError::Rpc {
			code: error["code"].as_i64().unwrap_or_default(),
			message: error["message"].as_str().unwrap_or_default().into(),
		}
		.into());
	}

	match response.get_mut("result") {
		Some(result) => Ok(result.take()),
		None => Err(FetchError::UnexpectedResponse(response.to_string()).into()),
	}
}

pub fn quantity(number: u64) -> String {
	format!("{:#x}", number)
}

pub fn get_logs_params(query: &LogQuery) -> Value {
	let mut topics = query
		.topics
		.iter()
		.map(|topic| topic.map_or(Value::Null, |topic| json!(topic)))
		.collect::<Vec<_>>();

	while topics.last() == Some(&Value::Null) {
		topics.pop();
	}

	json!([{
		"address": query.address,
		"topics": topics,
		"fromBlock": quantity(query.from_block),
		"toBlock": quantity(query.to_block),
	}])
}

pub fn get_block_by_hash_params(hash: Hash) -> Value {
	json!([hash, false])
}

pub fn hash_params(hash: Hash) -> Value {
	json!([hash])
}

pub fn call_params(to: Address, data: &Bytes) -> Value {
	json!([{ "to": to, "data": data }, "latest"])
}
