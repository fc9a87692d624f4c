//! Decoded contract events.

// --- std ---
use std::collections::BTreeMap;
// --- crates.io ---
use alloy_dyn_abi::{DynSolValue, EventExt};
use alloy_json_abi::Event;
use alloy_primitives::keccak256;
// --- roomwatcher ---
use crate::{
	error::{Error, FetchError, RoomwatcherResult},
	r#type::*,
	source::{BlockRecord, RawLog, ReceiptRecord, TransactionRecord},
};

/// Argument filters keyed by parameter name, `None` leaves the parameter unconstrained.
pub type Filters = BTreeMap<String, Option<DynSolValue>>;

/// Decoded event arguments.
///
/// Named parameters are reachable by name, every parameter is reachable by its declared position. Both
/// views are built once at decode time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventArgs {
	by_name: BTreeMap<String, usize>,
	by_index: Vec<DynSolValue>,
}
impl EventArgs {
	pub fn from_params(params: impl IntoIterator<Item = (String, DynSolValue)>) -> Self {
		let mut args = Self::default();

		for (name, value) in params {
			if !name.is_empty() {
				args.by_name.insert(name, args.by_index.len());
			}

			args.by_index.push(value);
		}

		args
	}

	pub fn get(&self, name: &str) -> Option<&DynSolValue> {
		self.by_name.get(name).and_then(|&i| self.by_index.get(i))
	}

	pub fn at(&self, index: usize) -> Option<&DynSolValue> {
		self.by_index.get(index)
	}

	pub fn len(&self) -> usize {
		self.by_index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_index.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.by_name.keys().map(String::as_str)
	}

	pub fn address(&self, name: &str) -> Option<Address> {
		self.get(name).and_then(DynSolValue::as_address)
	}

	pub fn addresses(&self, name: &str) -> Option<Vec<Address>> {
		self.get(name)?
			.as_array()?
			.iter()
			.map(DynSolValue::as_address)
			.collect()
	}

	pub fn uint(&self, name: &str) -> Option<Balance> {
		self.get(name)
			.and_then(DynSolValue::as_uint)
			.map(|(value, _)| value)
	}

	pub fn block_number(&self, name: &str) -> Option<BlockNumber> {
		self.uint(name).and_then(|value| value.try_into().ok())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventLog {
	pub address: Address,
	pub block_hash: Option<Hash>,
	pub block_number: Option<BlockNumber>,
	pub transaction_hash: Option<Hash>,
	pub log_index: Option<u64>,
	pub topics: Vec<Hash>,
	pub data: Bytes,
	pub args: EventArgs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawEvent {
	pub log: EventLog,
	pub block: Option<BlockRecord>,
	pub transaction: Option<TransactionRecord>,
	pub receipt: Option<ReceiptRecord>,
}
impl RawEvent {
	pub fn args(&self) -> &EventArgs {
		&self.log.args
	}
}

pub fn decode(event: &Event, log: RawLog) -> RoomwatcherResult<EventLog> {
	let decoded = event
		.decode_log_parts(log.topics.iter().copied(), &log.data)
		.map_err(FetchError::from)?;
	let mut indexed = decoded.indexed.into_iter();
	let mut body = decoded.body.into_iter();
	let mut params = Vec::with_capacity(event.inputs.len());

	for input in &event.inputs {
		let value = if input.indexed {
			indexed.next()
		} else {
			body.next()
		}
		.ok_or_else(|| {
			FetchError::UnexpectedResponse(format!(
				"log of `{}` is missing `{}`",
				event.name, input.name
			))
		})?;

		params.push((input.name.clone(), value));
	}

	Ok(EventLog {
		block_number: log.block_number(),
		log_index: log.log_index(),
		address: log.address,
		block_hash: log.block_hash,
		transaction_hash: log.transaction_hash,
		topics: log.topics,
		data: log.data,
		args: EventArgs::from_params(params),
	})
}

/// Topics of an `eth_getLogs` query selecting `event` with the given indexed argument values.
pub fn topics(event: &Event, filters: &Filters) -> RoomwatcherResult<Vec<Option<Hash>>> {
	let invalid = |parameter: &str, reason: &str| Error::InvalidFilter {
		event_name: event.name.clone(),
		parameter: parameter.into(),
		reason: reason.into(),
	};

	for (name, value) in filters {
		if value.is_none() {
			continue;
		}

		match event.inputs.iter().find(|input| &input.name == name) {
			Some(input) if input.indexed => (),
			Some(_) => return Err(invalid(name, "parameter is not indexed")),
			None => return Err(invalid(name, "no such parameter")),
		}
	}

	let mut topics = Vec::with_capacity(4);

	if !event.anonymous {
		topics.push(Some(event.selector()));
	}

	for input in event.inputs.iter().filter(|input| input.indexed) {
		let topic = match filters.get(&input.name) {
			Some(Some(value)) => {
				Some(topic_of(value).ok_or_else(|| invalid(&input.name, "value can not be a topic"))?)
			}
			_ => None,
		};

		topics.push(topic);
	}

	Ok(topics)
}

fn topic_of(value: &DynSolValue) -> Option<Hash> {
	match value {
		DynSolValue::String(s) => Some(keccak256(s.as_bytes())),
		DynSolValue::Bytes(bytes) => Some(keccak256(bytes)),
		value => value.as_word(),
	}
}

/// Whether a filter value counts as unset.
pub fn is_unset(value: Option<&Option<DynSolValue>>) -> bool {
	match value {
		None | Some(None) => true,
		Some(Some(DynSolValue::String(s))) => s.is_empty(),
		Some(Some(DynSolValue::Bytes(bytes))) => bytes.is_empty(),
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	// --- roomwatcher ---
	use super::*;
	use crate::mock::{self, ROOM, ALICE, BOB};

	#[test]
	fn args_by_name_and_position() {
		let log = mock::winners_fetch_log(40, ROOM, &[ALICE, BOB]);
		let info = mock::betting_room();
		let decoded = decode(info.event("WinnersFetch").unwrap(), log).unwrap();
		let args = &decoded.args;

		assert_eq!(args.len(), 2);
		assert_eq!(args.address("roomHash"), Some(ROOM));
		assert_eq!(args.at(0), args.get("roomHash"));
		assert_eq!(args.at(1), args.get("winners"));
		assert_eq!(args.addresses("winners"), Some(vec![ALICE, BOB]));
		assert_eq!(decoded.block_number, Some(40));
	}

	#[test]
	fn unnamed_params_only_by_position() {
		let args = EventArgs::from_params(vec![
			("member".to_owned(), DynSolValue::Address(ALICE)),
			(String::new(), DynSolValue::Bool(true)),
		]);

		assert_eq!(args.names().collect::<Vec<_>>(), vec!["member"]);
		assert_eq!(args.at(1), Some(&DynSolValue::Bool(true)));
		assert_eq!(args.len(), 2);
	}

	#[test]
	fn topics_follow_indexed_params() {
		let info = mock::betting_room();
		let event = info.event("ClaimPrize").unwrap();
		let mut filters = Filters::new();

		filters.insert("member".into(), Some(DynSolValue::Address(BOB)));
		filters.insert("roomHash".into(), None);

		let topics = topics(event, &filters).unwrap();

		assert_eq!(topics.len(), 3);
		assert_eq!(topics[0], Some(event.selector()));
		assert_eq!(topics[1], None);
		assert_eq!(topics[2], Some(BOB.into_word()));
	}

	#[test]
	fn filters_on_body_params_are_rejected() {
		let info = mock::betting_room();
		let event = info.event("WinnersFetch").unwrap();
		let mut filters = Filters::new();

		filters.insert(
			"winners".into(),
			Some(DynSolValue::Array(vec![DynSolValue::Address(ALICE)])),
		);

		assert!(matches!(
			topics(event, &filters),
			Err(Error::InvalidFilter { parameter, .. }) if parameter == "winners"
		));
	}

	#[test]
	fn unset_filter_values() {
		let mut filters = Filters::new();

		filters.insert("a".into(), None);
		filters.insert("b".into(), Some(DynSolValue::String(String::new())));
		filters.insert("c".into(), Some(DynSolValue::Address(ALICE)));

		assert!(is_unset(filters.get("a")));
		assert!(is_unset(filters.get("b")));
		assert!(!is_unset(filters.get("c")));
		assert!(is_unset(filters.get("d")));
	}
}
