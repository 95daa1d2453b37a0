//! Gateway-level error types shared across configuration, transport, and response decoding.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// HTTP-level failures (any status code, including an unrecovered 401) are never errors; they
/// are returned as regular responses.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) on a primary request or its retry.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than HTTP(S).
	#[error("Base URL must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Scheme that failed validation.
		scheme: String,
	},
	/// The reqwest-backed gateway needs an origin to resolve paths against.
	#[error("A base URL is required to build the default HTTP transport.")]
	MissingBaseUrl,
	/// Refresh path is blank.
	#[error("Refresh path must not be empty.")]
	EmptyRefreshPath,
	/// Broadcast channels cannot be created without capacity.
	#[error("Event capacity must be greater than zero.")]
	ZeroEventCapacity,
	/// JSON configuration document could not be parsed.
	#[error("Gateway configuration is malformed.")]
	Parse {
		/// Structured parsing failure, including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be encoded as JSON.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{path}`.")]
	Network {
		/// Normalized path of the request that failed.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error raised for `path`.
	pub fn network(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}

	/// Returns the transport's original error when it has type `E`.
	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: 'static + std::error::Error,
	{
		match self {
			Self::Network { source, .. } => source.downcast_ref::<E>(),
		}
	}
}

/// Response decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Response body is not the expected JSON document.
	#[error("Response body with status {status} is not the expected JSON document.")]
	Json {
		/// Structured parsing failure, including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
}
