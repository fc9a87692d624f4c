//! Room lists of one user, and the bookkeeping around creating a room.

// --- crates.io ---
use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
// --- roomwatcher ---
use crate::{
	directory::ContractInfo,
	error::{Error, FetchError, RoomwatcherResult},
	event::RawEvent,
	history::{EventHistoryState, Subscription},
	r#type::*,
	source::ReceiptRecord,
};

pub const ROOM_CREATE: &str = "RoomCreate";
pub const CREATE_ROOM: &str = "createRoom";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomSummary {
	pub room: Address,
	pub creator: Address,
	pub bet: Balance,
	pub bet_deadline_block: BlockNumber,
	pub claim_deadline_block: BlockNumber,
	pub game_address: Address,
}
impl RoomSummary {
	pub fn from_event(event: &RawEvent) -> Option<Self> {
		let args = event.args();

		Some(Self {
			room: args.address("roomHash")?,
			creator: args.address("creator")?,
			bet: args.uint("betValue")?,
			bet_deadline_block: args.block_number("betDeadline")?,
			claim_deadline_block: args.block_number("resultDeadline")?,
			game_address: args.address("resultContractAddress")?,
		})
	}
}

pub fn created_by(contract_name: impl Into<String>, creator: Address) -> Subscription {
	Subscription::new(contract_name, ROOM_CREATE)
		.filter("creator", DynSolValue::Address(creator))
		.require("creator")
}

pub fn joined_by(contract_name: impl Into<String>, member: Address) -> Subscription {
	Subscription::new(contract_name, crate::room::ROOM_JOIN)
		.filter("member", DynSolValue::Address(member))
		.require("member")
}

pub fn created_rooms(history: &EventHistoryState) -> Vec<RoomSummary> {
	history
		.events()
		.iter()
		.filter_map(|event| {
			let summary = RoomSummary::from_event(event);

			if summary.is_none() {
				tracing::warn!("Skipping malformed `{}` event {:?}", ROOM_CREATE, event.log.transaction_hash);
			}

			summary
		})
		.collect()
}

pub fn joined_rooms(history: &EventHistoryState) -> Vec<Address> {
	let mut rooms = Vec::new();

	for room in history
		.events()
		.iter()
		.filter_map(|event| event.args().address("roomHash"))
	{
		if !rooms.contains(&room) {
			rooms.push(room);
		}
	}

	rooms
}

/// The id of a room created by the transaction of `receipt`.
///
/// The first log of a creation is `RoomCreate`, its first indexed topic holds the room id in the lower 20
/// bytes.
pub fn room_id_from_receipt(receipt: &ReceiptRecord) -> RoomwatcherResult<Address> {
	if !receipt.succeeded() {
		return Err(Error::InvalidReceipt(format!(
			"transaction `{}` reverted",
			receipt.transaction_hash
		)));
	}

	receipt
		.logs
		.first()
		.and_then(|log| log.topics.get(1))
		.map(|topic| Address::from_word(*topic))
		.ok_or_else(|| {
			Error::InvalidReceipt(format!(
				"transaction `{}` carries no room id",
				receipt.transaction_hash
			))
		})
}

/// A `createRoom` call before it is submitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreateRoom {
	pub bet: Balance,
	pub bet_deadline_block: BlockNumber,
	pub claim_deadline_block: BlockNumber,
	pub game_address: Option<Address>,
}
impl CreateRoom {
	pub fn validate(&self) -> RoomwatcherResult<()> {
		match self.game_address {
			Some(game_address) if !game_address.is_zero() => (),
			_ => return Err(Error::InvalidRoom("game address is required".into())),
		}

		if self.bet_deadline_block == 0 {
			return Err(Error::InvalidRoom("bet deadline is required".into()));
		}
		if self.claim_deadline_block == 0 {
			return Err(Error::InvalidRoom("claim prize deadline is required".into()));
		}
		if self.bet.is_zero() {
			return Err(Error::InvalidRoom("bet amount is required".into()));
		}

		Ok(())
	}

	/// Calldata of the validated call.
	pub fn calldata(&self, contract: &ContractInfo) -> RoomwatcherResult<Bytes> {
		self.validate()?;

		let function = contract.function(CREATE_ROOM)?;
		let args = [
			DynSolValue::Uint(self.bet, 256),
			DynSolValue::Uint(Balance::from(self.bet_deadline_block), 256),
			DynSolValue::Uint(Balance::from(self.claim_deadline_block), 256),
			DynSolValue::Address(self.game_address.unwrap_or_default()),
		];

		Ok(function
			.abi_encode_input(&args)
			.map_err(FetchError::from)?
			.into())
	}
}
