// crates.io
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::DecodeError};

/// Buffered response returned by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl GatewayResponse {
	/// Assembles a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Response with `status`, no headers, and an empty body.
	pub fn with_status(status: StatusCode) -> Self {
		Self::new(status, HeaderMap::new(), Vec::new())
	}

	/// Whether the status is in the 2xx range.
	pub fn ok(&self) -> bool {
		self.status.is_success()
	}

	/// HTTP status code.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw body bytes.
	pub fn bytes(&self) -> &[u8] {
		&self.body
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the body as JSON, reporting the failing field path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			DecodeError::Json { source, status: self.status.as_u16() }.into()
		})
	}
}
