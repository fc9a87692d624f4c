//! Incremental event history of one contract event.
//!
//! A synchronizer owns a cursor and the events observed so far. Every cycle reads the chain head, fetches
//! the logs between the cursor and the head, and commits the cursor together with the new batch, so a
//! failed cycle leaves both untouched.

// --- std ---
use std::{
	collections::BTreeSet,
	sync::Arc,
	time::Duration,
};
// --- crates.io ---
use alloy_dyn_abi::DynSolValue;
use async_std::{
	sync::{Mutex, RwLock},
	task::{self, JoinHandle},
};
// --- roomwatcher ---
use crate::{
	config::SyncConfig,
	directory::ContractDirectory,
	error::{Error, RoomwatcherResult},
	event::{self, EventLog, Filters, RawEvent},
	r#type::*,
	source::{CachePolicy, LogQuery, LogSource},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Enrich {
	pub block: bool,
	pub transaction: bool,
	pub receipt: bool,
}
impl Enrich {
	pub fn all() -> Self {
		Self {
			block: true,
			transaction: true,
			receipt: true,
		}
	}
}

#[derive(Clone, Debug)]
pub struct Subscription {
	pub contract_name: String,
	pub event_name: String,
	pub filters: Filters,
	pub required_filters: BTreeSet<String>,
	/// Overrides [`SyncConfig::from_block`].
	pub from_block: Option<BlockNumber>,
	pub enrich: Enrich,
	pub watch: bool,
	/// Overrides [`SyncConfig::poll_interval`].
	pub poll_interval: Option<Duration>,
}
impl Subscription {
	pub fn new(contract_name: impl Into<String>, event_name: impl Into<String>) -> Self {
		Self {
			contract_name: contract_name.into(),
			event_name: event_name.into(),
			filters: Filters::new(),
			required_filters: BTreeSet::new(),
			from_block: None,
			enrich: Enrich::default(),
			watch: false,
			poll_interval: None,
		}
	}

	pub fn filter(mut self, name: impl Into<String>, value: impl Into<Option<DynSolValue>>) -> Self {
		self.filters.insert(name.into(), value.into());

		self
	}

	pub fn require(mut self, name: impl Into<String>) -> Self {
		self.required_filters.insert(name.into());

		self
	}

	pub fn from_block(mut self, from_block: BlockNumber) -> Self {
		self.from_block = Some(from_block);

		self
	}

	pub fn enrich(mut self, enrich: Enrich) -> Self {
		self.enrich = enrich;

		self
	}

	pub fn watch(mut self, watch: bool) -> Self {
		self.watch = watch;

		self
	}

	pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = Some(poll_interval);

		self
	}

	pub fn missing_required_filters(&self) -> Vec<String> {
		self.required_filters
			.iter()
			.filter(|key| event::is_unset(self.filters.get(*key)))
			.cloned()
			.collect()
	}

	pub fn validate(&self) -> RoomwatcherResult<()> {
		let keys = self.missing_required_filters();

		if keys.is_empty() {
			Ok(())
		} else {
			Err(Error::MissingRequiredFilter { keys })
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
	pub next_from_block: BlockNumber,
}
impl Cursor {
	pub fn advance(self, height: BlockNumber) -> Self {
		Self {
			next_from_block: self.next_from_block.max(height.saturating_add(1)),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventHistoryState {
	/// `None` until the first successful cycle.
	pub events: Option<Vec<RawEvent>>,
	pub is_loading: bool,
	pub error: Option<String>,
	pub revision: u64,
}
impl EventHistoryState {
	pub fn events(&self) -> &[RawEvent] {
		self.events.as_deref().unwrap_or_default()
	}

	fn touch(&mut self) {
		self.revision += 1;
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
	Append,
	Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// The head has not moved past the cursor.
	Unchanged,
	Fetched { height: BlockNumber, count: usize },
}

enum Batch {
	Unchanged,
	Fetched {
		height: BlockNumber,
		events: Vec<RawEvent>,
	},
}

struct Committed {
	state: EventHistoryState,
	cursor: Cursor,
}

struct Inner {
	subscription: Subscription,
	poll_interval: Duration,
	source: Arc<dyn LogSource>,
	directory: Arc<dyn ContractDirectory>,
	fetch_lock: Mutex<()>,
	committed: RwLock<Committed>,
	poller: Mutex<Option<JoinHandle<()>>>,
}
impl Inner {
	async fn refresh(&self, mode: RefreshMode) -> RoomwatcherResult<RefreshOutcome> {
		let _fetching = self.fetch_lock.lock().await;
		let cursor = {
			let mut committed = self.committed.write().await;

			committed.state.is_loading = true;
			committed.state.touch();

			committed.cursor
		};
		let result = self.fetch(cursor).await;
		let mut committed = self.committed.write().await;

		committed.state.is_loading = false;
		committed.state.touch();

		match result {
			Ok(Batch::Unchanged) => {
				tracing::trace!(
					"`{}` has nothing new below block `{}`",
					self.subscription.event_name,
					cursor.next_from_block
				);

				committed.state.error = None;

				Ok(RefreshOutcome::Unchanged)
			}
			Ok(Batch::Fetched { height, mut events }) => {
				let count = events.len();

				tracing::debug!(
					"`{}` fetched `{}` events in `{}..={}`",
					self.subscription.event_name,
					count,
					cursor.next_from_block,
					height
				);

				committed.cursor = cursor.advance(height);
				committed.state.error = None;
				committed.state.events = Some(match (mode, committed.state.events.take()) {
					(RefreshMode::Append, Some(mut accumulated)) => {
						accumulated.append(&mut events);

						accumulated
					}
					_ => events,
				});

				Ok(RefreshOutcome::Fetched { height, count })
			}
			Err(e) => {
				tracing::warn!("`{}` refresh failed: {}", self.subscription.event_name, e);

				committed.state.error = Some(e.to_string());

				Err(e)
			}
		}
	}

	async fn fetch(&self, cursor: Cursor) -> RoomwatcherResult<Batch> {
		let subscription = &self.subscription;
		let contract = self.directory.resolve(&subscription.contract_name)?;
		let event = contract.event(&subscription.event_name)?;
		let topics = event::topics(event, &subscription.filters)?;
		let height = self.source.current_height(CachePolicy::Bypass).await?;

		if height < cursor.next_from_block {
			return Ok(Batch::Unchanged);
		}

		let logs = self
			.source
			.logs(&LogQuery {
				address: contract.address,
				topics,
				from_block: cursor.next_from_block,
				to_block: height,
			})
			.await?;
		let mut events = Vec::with_capacity(logs.len());

		for log in logs {
			events.push(self.enrich(event::decode(event, log)?).await?);
		}

		// oldest first, pending logs last
		events.sort_by_key(|event| {
			(
				event.log.block_number.unwrap_or(BlockNumber::MAX),
				event.log.log_index.unwrap_or(u64::MAX),
			)
		});

		Ok(Batch::Fetched { height, events })
	}

	async fn enrich(&self, log: EventLog) -> RoomwatcherResult<RawEvent> {
		let enrich = self.subscription.enrich;
		let mut event = RawEvent {
			log,
			block: None,
			transaction: None,
			receipt: None,
		};
		// not confirmed yet
		let block_hash = match event.log.block_hash {
			Some(block_hash) => block_hash,
			None => return Ok(event),
		};

		if enrich.block {
			event.block = Some(self.source.block_by_hash(block_hash).await?);
		}
		if let Some(transaction_hash) = event.log.transaction_hash {
			if enrich.transaction {
				event.transaction = Some(self.source.transaction_by_hash(transaction_hash).await?);
			}
			if enrich.receipt {
				event.receipt = Some(self.source.transaction_receipt(transaction_hash).await?);
			}
		}

		Ok(event)
	}
}

/// Handle of one subscription, cloning shares the same history.
#[derive(Clone)]
pub struct EventHistorySynchronizer {
	inner: Arc<Inner>,
}
impl EventHistorySynchronizer {
	/// Build a synchronizer without touching the network.
	pub fn new(
		subscription: Subscription,
		config: SyncConfig,
		source: Arc<dyn LogSource>,
		directory: Arc<dyn ContractDirectory>,
	) -> RoomwatcherResult<Self> {
		subscription.validate()?;

		let cursor = Cursor {
			next_from_block: subscription.from_block.unwrap_or(config.from_block),
		};

		Ok(Self {
			inner: Arc::new(Inner {
				poll_interval: subscription.poll_interval.unwrap_or(config.poll_interval),
				subscription,
				source,
				directory,
				fetch_lock: Mutex::new(()),
				committed: RwLock::new(Committed {
					state: EventHistoryState::default(),
					cursor,
				}),
				poller: Mutex::new(None),
			}),
		})
	}

	/// Validate, run the initial replacing fetch and arm the poller of a watched subscription.
	///
	/// Only the required filters can fail this, a failed initial fetch is reported through [`Self::state`].
	pub async fn start(
		subscription: Subscription,
		config: SyncConfig,
		source: Arc<dyn LogSource>,
		directory: Arc<dyn ContractDirectory>,
	) -> RoomwatcherResult<Self> {
		let synchronizer = Self::new(subscription, config, source, directory)?;
		let _ = synchronizer.refresh(RefreshMode::Replace).await;

		if synchronizer.inner.subscription.watch {
			*synchronizer.inner.poller.lock().await = Some(poll(&synchronizer.inner));
		}

		Ok(synchronizer)
	}

	/// One fetch cycle, queued behind any cycle already in flight.
	pub async fn refresh(&self, mode: RefreshMode) -> RoomwatcherResult<RefreshOutcome> {
		self.inner.refresh(mode).await
	}

	/// Stop polling, a cycle in flight still completes.
	pub async fn stop(&self) {
		if let Some(poller) = self.inner.poller.lock().await.take() {
			tracing::debug!("`{}` stopped watching", self.inner.subscription.event_name);

			poller.cancel().await;
		}
	}

	pub async fn is_watching(&self) -> bool {
		self.inner.poller.lock().await.is_some()
	}

	pub async fn state(&self) -> EventHistoryState {
		self.inner.committed.read().await.state.clone()
	}

	pub async fn revision(&self) -> u64 {
		self.inner.committed.read().await.state.revision
	}

	pub async fn cursor(&self) -> Cursor {
		self.inner.committed.read().await.cursor
	}

	pub fn subscription(&self) -> &Subscription {
		&self.inner.subscription
	}
}

fn poll(inner: &Arc<Inner>) -> JoinHandle<()> {
	let weak = Arc::downgrade(inner);

	task::spawn(async move {
		loop {
			let interval = match weak.upgrade() {
				Some(inner) => inner.poll_interval,
				None => break,
			};

			task::sleep(interval).await;

			let inner = match weak.upgrade() {
				Some(inner) => inner,
				None => break,
			};

			// cancelling the poller detaches this cycle instead of aborting it
			let _ = task::spawn(async move { inner.refresh(RefreshMode::Append).await }).await;
		}
	})
}
