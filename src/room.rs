//! One betting room folded out of its event histories and its on-chain record.

// --- std ---
use std::sync::Arc;
// --- crates.io ---
use alloy_dyn_abi::DynSolValue;
use async_std::sync::{Mutex, RwLock};
// --- roomwatcher ---
use crate::{
	config::SyncConfig,
	directory::ContractDirectory,
	error::{Error, RoomwatcherResult},
	history::{
		EventHistoryState, EventHistorySynchronizer, RefreshMode, Subscription,
	},
	node::ContractReader,
	r#type::*,
	source::{CachePolicy, LogSource},
};

pub const ROOM_JOIN: &str = "RoomJoin";
pub const WINNERS_FETCH: &str = "WinnersFetch";
pub const CLAIM_PRIZE: &str = "ClaimPrize";
pub const CLAIM_REFUND: &str = "ClaimRefund";
pub const ROOMS: &str = "rooms";

/// The remote collaborators a watcher reads from.
#[derive(Clone)]
pub struct Chain {
	pub source: Arc<dyn LogSource>,
	pub reader: Arc<dyn ContractReader>,
	pub directory: Arc<dyn ContractDirectory>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomRecord {
	pub bet: Balance,
	pub balance: Balance,
	pub bet_deadline_block: BlockNumber,
	pub claim_deadline_block: BlockNumber,
	pub game_address: Address,
}
impl RoomRecord {
	/// Read the record out of the `rooms(address)` return values.
	pub fn from_values(values: &[DynSolValue]) -> RoomwatcherResult<Self> {
		Ok(Self {
			bet: uint_at(values, 6)?,
			balance: uint_at(values, 8)?,
			bet_deadline_block: block_at(values, 2)?,
			claim_deadline_block: block_at(values, 3)?,
			game_address: values
				.get(9)
				.and_then(DynSolValue::as_address)
				.ok_or_else(|| unexpected_return(9, "address"))?,
		})
	}
}

fn unexpected_return(index: usize, expected: &str) -> Error {
	Error::UnexpectedReturn {
		function_name: ROOMS.into(),
		index,
		expected: expected.into(),
	}
}

fn uint_at(values: &[DynSolValue], index: usize) -> RoomwatcherResult<Balance> {
	values
		.get(index)
		.and_then(DynSolValue::as_uint)
		.map(|(value, _)| value)
		.ok_or_else(|| unexpected_return(index, "uint"))
}

fn block_at(values: &[DynSolValue], index: usize) -> RoomwatcherResult<BlockNumber> {
	uint_at(values, index)?
		.try_into()
		.map_err(|_| unexpected_return(index, "block number"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomPhase {
	Open,
	BettingClosed,
	WinnersPending,
	WinnersResolved,
	PrizeClaimable,
	PrizeClaimed,
	PrizeExpired,
	RefundClaimable,
	RefundClaimed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoomActions {
	pub can_join: bool,
	pub can_fetch_winners: bool,
	pub can_claim_prize: bool,
	pub can_claim_refund: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomView {
	/// `None` until the record read succeeds.
	pub room: Option<RoomRecord>,
	pub members: Vec<Address>,
	pub winners: Vec<Address>,
	pub prize_claimed: bool,
	pub refund_claimed: bool,
	pub prize_claimed_by_current_user: bool,
	pub current_height: Option<BlockNumber>,
	pub bet_deadline_reached: bool,
	pub claim_deadline_reached: bool,
	pub phase: Option<RoomPhase>,
	pub actions: RoomActions,
	pub is_loading: bool,
	pub error: Option<String>,
}
impl RoomView {
	pub fn is_member(&self, user: Option<Address>) -> bool {
		user.map_or(false, |user| self.members.contains(&user))
	}

	pub fn is_winner(&self, user: Option<Address>) -> bool {
		user.map_or(false, |user| self.winners.contains(&user))
	}
}

#[derive(Clone, Copy, Debug)]
pub struct RoomInputs<'a> {
	pub joins: &'a EventHistoryState,
	pub winners: &'a EventHistoryState,
	pub prizes: &'a EventHistoryState,
	pub refunds: &'a EventHistoryState,
	pub record: Option<&'a RoomRecord>,
	pub record_error: Option<&'a str>,
	pub height: Option<BlockNumber>,
	pub user: Option<Address>,
}
impl<'a> RoomInputs<'a> {
	fn histories(&self) -> [&'a EventHistoryState; 4] {
		[self.joins, self.winners, self.prizes, self.refunds]
	}
}

/// Fold every input into a fresh view.
///
/// `previous` is the view of the same room and user from the last reduction, claims and the observed
/// height only ever latch forward from it.
pub fn reduce(inputs: &RoomInputs, previous: Option<&RoomView>) -> RoomView {
	let mut members = Vec::new();

	for member in inputs
		.joins
		.events()
		.iter()
		.filter_map(|event| event.args().address("member"))
	{
		if !members.contains(&member) {
			members.push(member);
		}
	}

	let claimed_by_user = |history: &EventHistoryState| match inputs.user {
		Some(user) => history
			.events()
			.iter()
			.any(|event| event.args().address("member") == Some(user)),
		None => false,
	};
	let prize_claimed =
		previous.map_or(false, |view| view.prize_claimed) || claimed_by_user(inputs.prizes);
	let refund_claimed =
		previous.map_or(false, |view| view.refund_claimed) || claimed_by_user(inputs.refunds);
	let current_height = match (previous.and_then(|view| view.current_height), inputs.height) {
		(Some(previous), Some(height)) => Some(previous.max(height)),
		(previous, height) => height.or(previous),
	};
	let room = inputs.record.copied();
	let mut view = RoomView {
		room,
		members,
		winners: winners(inputs.winners),
		prize_claimed,
		refund_claimed,
		prize_claimed_by_current_user: prize_claimed || refund_claimed,
		current_height,
		// a refetch in flight still has data to show
		is_loading: inputs
			.histories()
			.iter()
			.any(|history| history.events.is_none() && history.error.is_none())
			|| (room.is_none() && inputs.record_error.is_none()),
		error: inputs
			.histories()
			.iter()
			.find_map(|history| history.error.clone())
			.or_else(|| inputs.record_error.map(Into::into)),
		..Default::default()
	};

	if let (Some(room), Some(height)) = (room, current_height) {
		view.bet_deadline_reached = height > room.bet_deadline_block;
		view.claim_deadline_reached = height > room.claim_deadline_block;
		view.actions = actions(&view, &room, inputs);
		view.phase = Some(phase(&view, &room, inputs));
	}

	view
}

fn winners(history: &EventHistoryState) -> Vec<Address> {
	match history.events() {
		[event] => event.args().addresses("winners").unwrap_or_default(),
		[] => Vec::new(),
		events => {
			tracing::warn!(
				"`{}` winners declarations seen, leaving winners unresolved",
				events.len()
			);

			Vec::new()
		}
	}
}

fn actions(view: &RoomView, room: &RoomRecord, inputs: &RoomInputs) -> RoomActions {
	let is_member = view.is_member(inputs.user);
	let is_winner = view.is_winner(inputs.user);
	let winners_loaded = inputs.winners.events.is_some();

	RoomActions {
		can_join: inputs.user.is_some() && !is_member && !view.bet_deadline_reached,
		can_fetch_winners: view.bet_deadline_reached
			&& winners_loaded
			&& view.winners.is_empty()
			&& !view.claim_deadline_reached,
		can_claim_prize: is_winner && !view.claim_deadline_reached && !view.prize_claimed,
		can_claim_refund: view.claim_deadline_reached
			&& room.balance > Balance::ZERO
			&& !view.prize_claimed_by_current_user
			&& is_member,
	}
}

fn phase(view: &RoomView, room: &RoomRecord, inputs: &RoomInputs) -> RoomPhase {
	let is_member = view.is_member(inputs.user);
	let is_winner = view.is_winner(inputs.user);

	if !view.bet_deadline_reached {
		return RoomPhase::Open;
	}
	if view.prize_claimed {
		return RoomPhase::PrizeClaimed;
	}
	if view.refund_claimed {
		return RoomPhase::RefundClaimed;
	}
	if view.claim_deadline_reached && room.balance > Balance::ZERO && is_member {
		return RoomPhase::RefundClaimable;
	}
	if !view.winners.is_empty() {
		return match (is_winner, view.claim_deadline_reached) {
			(true, false) => RoomPhase::PrizeClaimable,
			(true, true) => RoomPhase::PrizeExpired,
			(false, _) => RoomPhase::WinnersResolved,
		};
	}
	if inputs.winners.events.is_none() {
		return RoomPhase::BettingClosed;
	}
	if view.claim_deadline_reached {
		RoomPhase::PrizeExpired
	} else {
		RoomPhase::WinnersPending
	}
}

#[derive(Default)]
struct RecordState {
	record: Option<RoomRecord>,
	error: Option<String>,
	revision: u64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct MemoKey {
	revisions: [u64; 5],
	height: Option<BlockNumber>,
}

/// Four room-scoped histories plus the room record, reduced on demand.
pub struct RoomWatcher {
	pub room: Address,
	pub user: Option<Address>,
	pub contract_name: String,
	chain: Chain,
	joins: EventHistorySynchronizer,
	winners: EventHistorySynchronizer,
	prizes: EventHistorySynchronizer,
	refunds: EventHistorySynchronizer,
	record: RwLock<RecordState>,
	memo: Mutex<Option<(MemoKey, RoomView)>>,
}
impl RoomWatcher {
	pub async fn start(
		room: Address,
		user: Option<Address>,
		contract_name: impl Into<String>,
		config: SyncConfig,
		chain: Chain,
		watch: bool,
	) -> RoomwatcherResult<Self> {
		let contract_name = contract_name.into();
		let subscribe = |event_name| {
			let subscription = Subscription::new(contract_name.clone(), event_name)
				.filter("roomHash", DynSolValue::Address(room))
				.require("roomHash")
				.watch(watch);

			EventHistorySynchronizer::start(
				subscription,
				config,
				chain.source.clone(),
				chain.directory.clone(),
			)
		};
		let (joins, winners, prizes, refunds) = futures::try_join!(
			subscribe(ROOM_JOIN),
			subscribe(WINNERS_FETCH),
			subscribe(CLAIM_PRIZE),
			subscribe(CLAIM_REFUND)
		)?;

		tracing::info!("Watching room `{}`", room);

		let watcher = Self {
			room,
			user,
			contract_name,
			chain,
			joins,
			winners,
			prizes,
			refunds,
			record: RwLock::new(RecordState::default()),
			memo: Mutex::new(None),
		};
		let _ = watcher.refresh_record().await;

		Ok(watcher)
	}

	pub async fn refresh_record(&self) -> RoomwatcherResult<RoomRecord> {
		let result = self.read_record().await;
		let mut state = self.record.write().await;

		state.revision += 1;

		match result {
			Ok(record) => {
				state.record = Some(record);
				state.error = None;

				Ok(record)
			}
			Err(e) => {
				tracing::warn!("Reading room `{}` failed: {}", self.room, e);

				state.error = Some(e.to_string());

				Err(e)
			}
		}
	}

	async fn read_record(&self) -> RoomwatcherResult<RoomRecord> {
		let contract = self.chain.directory.resolve(&self.contract_name)?;
		let values = self
			.chain
			.reader
			.call(&contract, ROOMS, &[DynSolValue::Address(self.room)])
			.await?;

		RoomRecord::from_values(&values)
	}

	/// Append new events to every history and re-read the record.
	///
	/// Every input is refreshed even when an earlier one fails, the first failure is returned.
	pub async fn refresh(&self) -> RoomwatcherResult<()> {
		let (joins, winners, prizes, refunds) = futures::join!(
			self.joins.refresh(RefreshMode::Append),
			self.winners.refresh(RefreshMode::Append),
			self.prizes.refresh(RefreshMode::Append),
			self.refunds.refresh(RefreshMode::Append)
		);
		let record = self.refresh_record().await;

		joins?;
		winners?;
		prizes?;
		refunds?;
		record?;

		Ok(())
	}

	pub async fn view(&self) -> RoomView {
		let height = match self.chain.source.current_height(CachePolicy::Allow).await {
			Ok(height) => Some(height),
			Err(e) => {
				tracing::warn!("Reading the chain height failed: {}", e);

				None
			}
		};
		let (joins, winners, prizes, refunds) = futures::join!(
			self.joins.state(),
			self.winners.state(),
			self.prizes.state(),
			self.refunds.state()
		);
		let record = self.record.read().await;
		let key = MemoKey {
			revisions: [
				joins.revision,
				winners.revision,
				prizes.revision,
				refunds.revision,
				record.revision,
			],
			height,
		};
		let mut memo = self.memo.lock().await;

		if let Some((memo_key, view)) = memo.as_ref() {
			if *memo_key == key {
				return view.clone();
			}
		}

		let inputs = RoomInputs {
			joins: &joins,
			winners: &winners,
			prizes: &prizes,
			refunds: &refunds,
			record: record.record.as_ref(),
			record_error: record.error.as_deref(),
			height,
			user: self.user,
		};
		let view = reduce(&inputs, memo.as_ref().map(|(_, view)| view));

		*memo = Some((key, view.clone()));

		view
	}

	pub async fn stop(&self) {
		self.joins.stop().await;
		self.winners.stop().await;
		self.prizes.stop().await;
		self.refunds.stop().await;
	}

	pub fn joins(&self) -> &EventHistorySynchronizer {
		&self.joins
	}

	pub fn winners(&self) -> &EventHistorySynchronizer {
		&self.winners
	}
}
