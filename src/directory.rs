// --- std ---
use std::{collections::HashMap, fs, path::Path, sync::Arc};
// --- crates.io ---
use alloy_json_abi::{Event, Function, JsonAbi};
use serde::Deserialize;
// --- roomwatcher ---
use crate::{
	error::{Error, RoomwatcherResult},
	r#type::*,
};

pub trait ContractDirectory: Send + Sync {
	fn resolve(&self, contract_name: &str) -> RoomwatcherResult<Arc<ContractInfo>>;
}

#[derive(Debug, Deserialize)]
pub struct ContractInfo {
	#[serde(skip)]
	pub name: String,
	pub address: Address,
	pub abi: JsonAbi,
}
impl ContractInfo {
	pub fn event(&self, event_name: impl Into<String>) -> RoomwatcherResult<&Event> {
		let event_name = event_name.into();

		self.abi
			.event(&event_name)
			.and_then(|overloads| overloads.first())
			.ok_or(Error::EventNotFound {
				contract_name: self.name.clone(),
				event_name,
			})
	}

	pub fn function(&self, function_name: impl Into<String>) -> RoomwatcherResult<&Function> {
		let function_name = function_name.into();

		self.abi
			.function(&function_name)
			.and_then(|overloads| overloads.first())
			.ok_or(Error::FunctionNotFound {
				contract_name: self.name.clone(),
				function_name,
			})
	}
}

/// Contracts deployed on one chain, read from a `{ chainId: { ContractName: { address, abi } } }` document.
#[derive(Debug, Default)]
pub struct DeployedContracts {
	pub chain_id: ChainId,
	pub contracts: HashMap<String, Arc<ContractInfo>>,
}
impl DeployedContracts {
	pub fn from_json(json: &str, chain_id: ChainId) -> RoomwatcherResult<Self> {
		let mut chains = serde_json::from_str::<HashMap<String, HashMap<String, ContractInfo>>>(json)
			.map_err(|e| Error::Config(format!("invalid deployments: {}", e)))?;
		let contracts = chains
			.remove(&chain_id.to_string())
			.unwrap_or_default()
			.into_iter()
			.map(|(name, mut info)| {
				info.name = name.clone();

				(name, Arc::new(info))
			})
			.collect::<HashMap<_, _>>();

		if contracts.is_empty() {
			tracing::warn!("No contracts deployed on chain `{}`", chain_id);
		}

		Ok(Self {
			chain_id,
			contracts,
		})
	}

	pub fn load(path: impl AsRef<Path>, chain_id: ChainId) -> RoomwatcherResult<Self> {
		Self::from_json(&fs::read_to_string(path)?, chain_id)
	}
}
impl ContractDirectory for DeployedContracts {
	fn resolve(&self, contract_name: &str) -> RoomwatcherResult<Arc<ContractInfo>> {
		self.contracts
			.get(contract_name)
			.cloned()
			.ok_or_else(|| Error::ContractNotFound {
				contract_name: contract_name.into(),
			})
	}
}

#[cfg(test)]
mod tests {
	// --- roomwatcher ---
	use super::*;
	use crate::mock::{self, BETTING_ROOM};

	#[test]
	fn resolve_known_contract() {
		let deployments = mock::deployments();
		let info = deployments.resolve(BETTING_ROOM).unwrap();

		assert_eq!(info.name, BETTING_ROOM);
		assert_eq!(info.address, mock::contract_address());
		assert!(info.event("RoomJoin").is_ok());
		assert!(info.function("rooms").is_ok());
	}

	#[test]
	fn unknown_names_are_reported() {
		let deployments = mock::deployments();

		assert!(matches!(
			deployments.resolve("Lottery"),
			Err(Error::ContractNotFound { contract_name }) if contract_name == "Lottery"
		));

		let info = deployments.resolve(BETTING_ROOM).unwrap();

		assert!(matches!(
			info.event("RoomLeave"),
			Err(Error::EventNotFound { event_name, .. }) if event_name == "RoomLeave"
		));
		assert!(matches!(
			info.function("leaveRoom"),
			Err(Error::FunctionNotFound { function_name, .. }) if function_name == "leaveRoom"
		));
	}

	#[test]
	fn other_chains_are_ignored() {
		let deployments = DeployedContracts::from_json(mock::DEPLOYMENTS, 1).unwrap();

		assert!(deployments.contracts.is_empty());
	}
}
