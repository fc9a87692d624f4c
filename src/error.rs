// --- crates.io ---
use async_tungstenite::tungstenite::Error as TungsteniteError;
use thiserror::Error as ThisError;

pub type RoomwatcherResult<T> = Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
	#[error("Missing required filters: {}", keys.join(", "))]
	MissingRequiredFilter { keys: Vec<String> },
	#[error("Contract `{}` not found", contract_name)]
	ContractNotFound { contract_name: String },
	#[error("Event `{}` not found under contract `{}`", event_name, contract_name)]
	EventNotFound {
		contract_name: String,
		event_name: String,
	},
	#[error(
		"Function `{}` not found under contract `{}`",
		function_name,
		contract_name
	)]
	FunctionNotFound {
		contract_name: String,
		function_name: String,
	},
	#[error(
		"Filter on `{}` is not supported by event `{}`: {}",
		parameter,
		event_name,
		reason
	)]
	InvalidFilter {
		event_name: String,
		parameter: String,
		reason: String,
	},
	#[error(
		"Return value `{}` of `{}` expected `{}`",
		index,
		function_name,
		expected
	)]
	UnexpectedReturn {
		function_name: String,
		index: usize,
		expected: String,
	},
	#[error("Invalid receipt: {0}")]
	InvalidReceipt(String),
	#[error("Invalid room: {0}")]
	InvalidRoom(String),
	#[error("Fetch failed: {0}")]
	Fetch(#[from] FetchError),
	#[error("Config error: {0}")]
	Config(String),
	#[error("Io error: {0}")]
	Io(#[from] std::io::Error),
}
impl Error {
	/// Whether the next natural refresh may succeed where this one failed.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Fetch(_))
	}
}

#[derive(Debug, ThisError)]
pub enum FetchError {
	#[error("RPC error `{}`: {}", code, message)]
	Rpc { code: i64, message: String },
	#[error("HTTP status `{0}`")]
	HttpStatus(u16),
	#[error("{} `{}` not found", kind, hash)]
	NotFound { kind: &'static str, hash: String },
	#[error("Unexpected response: {0}")]
	UnexpectedResponse(String),
	#[error("Http error: {0}")]
	Http(#[from] isahc::Error),
	#[error("Http request error: {0}")]
	HttpRequest(#[from] isahc::http::Error),
	#[error("Io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Websocket error: {0}")]
	Websocket(#[from] WebsocketError),
	#[error("Json error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Abi error: {0}")]
	Abi(#[from] alloy_dyn_abi::Error),
}

#[derive(Debug, ThisError)]
pub enum WebsocketError {
	#[error("Connection already closed")]
	AlreadyClosed,
	#[error("Tungstenite error: {0}")]
	Tungstenite(#[from] TungsteniteError),
}

macro_rules! impl_from_fetch {
	($($source:ty),+) => {
		$(
			impl From<$source> for Error {
				fn from(e: $source) -> Self {
					Self::Fetch(e.into())
				}
			}
		)+
	};
}
impl_from_fetch!(
	isahc::Error,
	isahc::http::Error,
	WebsocketError,
	serde_json::Error,
	alloy_dyn_abi::Error
);
impl From<TungsteniteError> for Error {
	fn from(e: TungsteniteError) -> Self {
		Self::Fetch(WebsocketError::from(e).into())
	}
}
