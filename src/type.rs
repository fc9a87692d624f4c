pub use alloy_primitives::{Address, Bytes, B256 as Hash, U256 as Balance};

pub type BlockNumber = u64;
pub type ChainId = u64;
pub type Id = u64;
