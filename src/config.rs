// --- std ---
use std::{fs, path::Path, time::Duration};
// --- crates.io ---
use serde::Deserialize;
// --- roomwatcher ---
use crate::{
	error::{Error, RoomwatcherResult},
	r#type::*,
};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	pub rpc_url: String,
	pub chain_id: ChainId,
	pub deployments: String,
	pub contract_name: String,
	pub polling_interval_ms: u64,
	pub local_chain_id: ChainId,
	pub local_polling_interval_ms: u64,
	pub from_block: BlockNumber,
	pub height_cache_ms: u64,
}
impl Config {
	pub fn from_json(json: &str) -> RoomwatcherResult<Self> {
		serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid config: {}", e)))
	}

	pub fn load(path: impl AsRef<Path>) -> RoomwatcherResult<Self> {
		let path = path.as_ref();

		tracing::debug!("Loading config from `{}`", path.display());

		Self::from_json(&fs::read_to_string(path)?)
	}

	pub fn is_local(&self) -> bool {
		self.chain_id == self.local_chain_id
	}

	/// Local networks mine on demand, so they are polled faster.
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(if self.is_local() {
			self.local_polling_interval_ms
		} else {
			self.polling_interval_ms
		})
	}

	pub fn height_cache(&self) -> Duration {
		Duration::from_millis(self.height_cache_ms)
	}

	pub fn sync_config(&self) -> SyncConfig {
		SyncConfig {
			poll_interval: self.poll_interval(),
			from_block: self.from_block,
		}
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			rpc_url: "http://127.0.0.1:8545".into(),
			chain_id: 31337,
			deployments: "res/deployments.json".into(),
			contract_name: "BettingRoom".into(),
			polling_interval_ms: 30_000,
			local_chain_id: 31337,
			local_polling_interval_ms: 4_000,
			from_block: 0,
			height_cache_ms: 4_000,
		}
	}
}

/// What every synchronizer is handed explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
	pub poll_interval: Duration,
	pub from_block: BlockNumber,
}
impl Default for SyncConfig {
	fn default() -> Self {
		Config::default().sync_config()
	}
}

#[cfg(test)]
mod tests {
	// --- roomwatcher ---
	use super::*;

	#[test]
	fn missing_fields_take_defaults() {
		let config = Config::from_json(r#"{ "chainId": 1, "rpcUrl": "wss://rpc.example.org" }"#).unwrap();

		assert_eq!(config.chain_id, 1);
		assert_eq!(config.rpc_url, "wss://rpc.example.org");
		assert_eq!(config.polling_interval_ms, 30_000);
		assert_eq!(config.contract_name, "BettingRoom");
	}

	#[test]
	fn local_chain_polls_faster() {
		let mut config = Config::default();

		assert_eq!(config.poll_interval(), Duration::from_secs(4));

		config.chain_id = 10;

		assert_eq!(config.poll_interval(), Duration::from_secs(30));
		assert_eq!(config.sync_config().poll_interval, Duration::from_secs(30));
	}

	#[test]
	fn malformed_config_is_a_config_error() {
		assert!(matches!(
			Config::from_json(r#"{ "chainId": "one" }"#),
			Err(Error::Config(_))
		));
	}
}
