//! A scripted in-memory chain for the unit tests.

// --- std ---
use std::{
	collections::{HashMap, HashSet},
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
};
// --- crates.io ---
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{address, keccak256, U64};
use async_trait::async_trait;
// --- roomwatcher ---
use crate::{
	directory::{ContractDirectory, ContractInfo, DeployedContracts},
	error::{FetchError, RoomwatcherResult},
	node::ContractReader,
	r#type::*,
	source::*,
};

pub const BETTING_ROOM: &str = "BettingRoom";
pub const DEPLOYMENTS: &str = include_str!("../res/deployments.json");

pub const ROOM: Address = address!("0x00000000000000000000000000000000000000aa");
pub const GAME: Address = address!("0x00000000000000000000000000000000000000ee");
pub const ALICE: Address = address!("0x000000000000000000000000000000000000000a");
pub const BOB: Address = address!("0x000000000000000000000000000000000000000b");
pub const CAROL: Address = address!("0x000000000000000000000000000000000000000c");

pub fn deployments() -> DeployedContracts {
	DeployedContracts::from_json(DEPLOYMENTS, 31337).unwrap()
}

pub fn betting_room() -> Arc<ContractInfo> {
	deployments().resolve(BETTING_ROOM).unwrap()
}

pub fn contract_address() -> Address {
	address!("0x5fbdb2315678afecb367f032d93f642f64180aa3")
}

pub fn block_hash(number: BlockNumber) -> Hash {
	Hash::left_padding_from(&number.to_be_bytes())
}

fn log(block: BlockNumber, event_name: &str, indexed: &[Address], body: Vec<DynSolValue>) -> RawLog {
	static TRANSACTIONS: AtomicUsize = AtomicUsize::new(0);

	let info = betting_room();
	let event = info.event(event_name).unwrap();
	let nonce = TRANSACTIONS.fetch_add(1, Ordering::SeqCst);
	let mut topics = vec![event.selector()];

	topics.extend(indexed.iter().map(|address| address.into_word()));

	RawLog {
		address: info.address,
		block_hash: Some(block_hash(block)),
		block_number: Some(U64::from(block)),
		transaction_hash: Some(keccak256(nonce.to_be_bytes())),
		log_index: Some(U64::ZERO),
		topics,
		data: DynSolValue::Tuple(body).abi_encode_params().into(),
	}
}

pub fn room_create_log(
	block: BlockNumber,
	room: Address,
	creator: Address,
	bet: u64,
	bet_deadline: BlockNumber,
	claim_deadline: BlockNumber,
) -> RawLog {
	log(
		block,
		"RoomCreate",
		&[room, creator],
		vec![
			uint(bet),
			uint(bet_deadline),
			uint(claim_deadline),
			DynSolValue::Address(GAME),
		],
	)
}

pub fn room_join_log(block: BlockNumber, room: Address, member: Address) -> RawLog {
	log(block, "RoomJoin", &[room, member], Vec::new())
}

pub fn winners_fetch_log(block: BlockNumber, room: Address, winners: &[Address]) -> RawLog {
	log(
		block,
		"WinnersFetch",
		&[room],
		vec![DynSolValue::Array(
			winners.iter().copied().map(DynSolValue::Address).collect(),
		)],
	)
}

pub fn claim_prize_log(block: BlockNumber, room: Address, member: Address) -> RawLog {
	log(block, "ClaimPrize", &[room, member], vec![uint(20)])
}

pub fn claim_refund_log(block: BlockNumber, room: Address, member: Address) -> RawLog {
	log(block, "ClaimRefund", &[room, member], vec![uint(10)])
}

pub fn uint(value: u64) -> DynSolValue {
	DynSolValue::Uint(Balance::from(value), 256)
}

/// Values of `rooms(address)` in declaration order.
pub fn room_record_values(
	bet_deadline: BlockNumber,
	claim_deadline: BlockNumber,
	bet: u64,
	balance: u64,
) -> Vec<DynSolValue> {
	vec![
		DynSolValue::Address(ALICE),
		DynSolValue::Uint(Balance::from(1), 8),
		uint(bet_deadline),
		uint(claim_deadline),
		uint(2),
		uint(0),
		uint(bet),
		uint(0),
		uint(balance),
		DynSolValue::Address(GAME),
	]
}

pub fn room_record_output(
	bet_deadline: BlockNumber,
	claim_deadline: BlockNumber,
	bet: u64,
	balance: u64,
) -> Vec<u8> {
	DynSolValue::Tuple(room_record_values(bet_deadline, claim_deadline, bet, balance))
		.abi_encode_params()
}

#[derive(Debug, Default)]
pub struct Calls {
	pub height: AtomicUsize,
	pub logs: AtomicUsize,
	pub block: AtomicUsize,
	pub transaction: AtomicUsize,
	pub receipt: AtomicUsize,
	pub read: AtomicUsize,
}
impl Calls {
	pub fn total(&self) -> usize {
		[
			&self.height,
			&self.logs,
			&self.block,
			&self.transaction,
			&self.receipt,
			&self.read,
		]
		.iter()
		.map(|count| count.load(Ordering::SeqCst))
		.sum()
	}
}

/// Serves logs from memory, answers every block, transaction and receipt of a confirmed log.
#[derive(Debug, Default)]
pub struct MockChain {
	pub height: Mutex<BlockNumber>,
	pub logs: Mutex<Vec<RawLog>>,
	pub record: Mutex<Option<Vec<DynSolValue>>>,
	pub receipts: Mutex<HashMap<Hash, ReceiptRecord>>,
	pub fail_logs: AtomicBool,
	/// Selectors of the events whose log queries fail.
	pub fail_events: Mutex<HashSet<Hash>>,
	pub fail_receipts: AtomicBool,
	pub calls: Calls,
}
impl MockChain {
	pub fn new(height: BlockNumber) -> Arc<Self> {
		let chain = Self::default();

		*chain.height.lock().unwrap() = height;

		Arc::new(chain)
	}

	pub fn set_height(&self, height: BlockNumber) {
		*self.height.lock().unwrap() = height;
	}

	pub fn push(&self, log: RawLog) {
		self.logs.lock().unwrap().push(log);
	}

	pub fn set_record(&self, values: Vec<DynSolValue>) {
		*self.record.lock().unwrap() = Some(values);
	}

	pub fn fail_event(&self, event_name: &str, fail: bool) {
		let selector = betting_room().event(event_name).unwrap().selector();
		let mut fail_events = self.fail_events.lock().unwrap();

		if fail {
			fail_events.insert(selector);
		} else {
			fail_events.remove(&selector);
		}
	}

	pub fn calls(&self) -> usize {
		self.calls.total()
	}

	fn find(&self, hash: Hash) -> Option<RawLog> {
		self.logs
			.lock()
			.unwrap()
			.iter()
			.find(|log| log.transaction_hash == Some(hash))
			.cloned()
	}

	fn not_found(kind: &'static str, hash: Hash) -> crate::error::Error {
		FetchError::NotFound {
			kind,
			hash: hash.to_string(),
		}
		.into()
	}
}
#[async_trait]
impl LogSource for MockChain {
	async fn current_height(&self, _: CachePolicy) -> RoomwatcherResult<BlockNumber> {
		self.calls.height.fetch_add(1, Ordering::SeqCst);

		Ok(*self.height.lock().unwrap())
	}

	async fn logs(&self, query: &LogQuery) -> RoomwatcherResult<Vec<RawLog>> {
		self.calls.logs.fetch_add(1, Ordering::SeqCst);

		let selector = query.topics.first().copied().flatten();
		let failing = selector.map_or(false, |selector| {
			self.fail_events.lock().unwrap().contains(&selector)
		});

		if failing || self.fail_logs.load(Ordering::SeqCst) {
			return Err(FetchError::Rpc {
				code: -32005,
				message: "query timeout exceeded".into(),
			}
			.into());
		}

		Ok(self
			.logs
			.lock()
			.unwrap()
			.iter()
			.filter(|log| query.matches(log))
			.cloned()
			.collect())
	}

	async fn block_by_hash(&self, hash: Hash) -> RoomwatcherResult<BlockRecord> {
		self.calls.block.fetch_add(1, Ordering::SeqCst);

		let number = self
			.logs
			.lock()
			.unwrap()
			.iter()
			.find(|log| log.block_hash == Some(hash))
			.and_then(|log| log.block_number)
			.ok_or_else(|| Self::not_found("block", hash))?;

		Ok(BlockRecord {
			hash,
			number,
			parent_hash: block_hash(number.to::<u64>().saturating_sub(1)),
			timestamp: number * U64::from(12),
		})
	}

	async fn transaction_by_hash(&self, hash: Hash) -> RoomwatcherResult<TransactionRecord> {
		self.calls.transaction.fetch_add(1, Ordering::SeqCst);

		let log = self
			.find(hash)
			.ok_or_else(|| Self::not_found("transaction", hash))?;

		Ok(TransactionRecord {
			hash,
			from: ALICE,
			to: Some(log.address),
			value: Balance::ZERO,
			input: Bytes::new(),
			block_hash: log.block_hash,
			block_number: log.block_number,
		})
	}

	async fn transaction_receipt(&self, hash: Hash) -> RoomwatcherResult<ReceiptRecord> {
		self.calls.receipt.fetch_add(1, Ordering::SeqCst);

		if self.fail_receipts.load(Ordering::SeqCst) {
			return Err(Self::not_found("receipt", hash));
		}
		if let Some(receipt) = self.receipts.lock().unwrap().get(&hash) {
			return Ok(receipt.clone());
		}

		let log = self
			.find(hash)
			.ok_or_else(|| Self::not_found("receipt", hash))?;

		Ok(ReceiptRecord {
			transaction_hash: hash,
			block_hash: log.block_hash.unwrap_or_default(),
			block_number: log.block_number.unwrap_or_default(),
			status: Some(U64::from(1)),
			gas_used: U64::from(21_000),
			logs: vec![log],
		})
	}
}
#[async_trait]
impl ContractReader for MockChain {
	async fn call(
		&self,
		contract: &ContractInfo,
		function_name: &str,
		_: &[DynSolValue],
	) -> RoomwatcherResult<Vec<DynSolValue>> {
		self.calls.read.fetch_add(1, Ordering::SeqCst);
		contract.function(function_name)?;

		self.record.lock().unwrap().clone().ok_or_else(|| {
			FetchError::Rpc {
				code: 3,
				message: "execution reverted".into(),
			}
			.into()
		})
	}
}
