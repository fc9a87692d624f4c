//! The remote log source and the records it hands back.

// --- crates.io ---
use alloy_primitives::U64;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
// --- roomwatcher ---
use crate::{error::RoomwatcherResult, r#type::*};

#[async_trait]
pub trait LogSource: Send + Sync {
	/// Current head of the chain.
	///
	/// [`CachePolicy::Bypass`] must always reach the node, a stale height would stall the cursor below the
	/// true head.
	async fn current_height(&self, cache: CachePolicy) -> RoomwatcherResult<BlockNumber>;

	async fn logs(&self, query: &LogQuery) -> RoomwatcherResult<Vec<RawLog>>;

	async fn block_by_hash(&self, hash: Hash) -> RoomwatcherResult<BlockRecord>;

	async fn transaction_by_hash(&self, hash: Hash) -> RoomwatcherResult<TransactionRecord>;

	async fn transaction_receipt(&self, hash: Hash) -> RoomwatcherResult<ReceiptRecord>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
	Allow,
	Bypass,
}

/// An `eth_getLogs` query, `None` topics match anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
	pub address: Address,
	pub topics: Vec<Option<Hash>>,
	pub from_block: BlockNumber,
	pub to_block: BlockNumber,
}
impl LogQuery {
	pub fn matches(&self, log: &RawLog) -> bool {
		if log.address != self.address {
			return false;
		}

		// pending logs carry no block number
		if let Some(number) = log.block_number() {
			if number < self.from_block || number > self.to_block {
				return false;
			}
		}

		self.topics
			.iter()
			.enumerate()
			.all(|(i, topic)| match topic {
				Some(topic) => log.topics.get(i) == Some(topic),
				None => true,
			})
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
	pub address: Address,
	#[serde(default)]
	pub block_hash: Option<Hash>,
	#[serde(default)]
	pub block_number: Option<U64>,
	#[serde(default)]
	pub transaction_hash: Option<Hash>,
	#[serde(default)]
	pub log_index: Option<U64>,
	pub topics: Vec<Hash>,
	pub data: Bytes,
}
impl RawLog {
	pub fn block_number(&self) -> Option<BlockNumber> {
		self.block_number.map(|number| number.to())
	}

	pub fn log_index(&self) -> Option<u64> {
		self.log_index.map(|index| index.to())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
	pub hash: Hash,
	pub number: U64,
	pub parent_hash: Hash,
	pub timestamp: U64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
	pub hash: Hash,
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	pub value: Balance,
	pub input: Bytes,
	#[serde(default)]
	pub block_hash: Option<Hash>,
	#[serde(default)]
	pub block_number: Option<U64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
	pub transaction_hash: Hash,
	pub block_hash: Hash,
	pub block_number: U64,
	#[serde(default)]
	pub status: Option<U64>,
	pub gas_used: U64,
	pub logs: Vec<RawLog>,
}
impl ReceiptRecord {
	pub fn succeeded(&self) -> bool {
		self.status.map_or(true, |status| status == U64::from(1))
	}
}
