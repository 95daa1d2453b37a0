// crates.io
use http::{
	HeaderMap, HeaderValue, Method,
	header::{CONTENT_TYPE, HeaderName},
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Cookie policy applied to an outbound request, mirroring the Fetch `credentials` modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Credentials {
	/// Attach and store cookies for every request.
	#[default]
	Include,
	/// Attach and store cookies only for requests to the transport's own origin.
	SameOrigin,
	/// Never attach or store cookies.
	Omit,
}

/// Caller-supplied transport options.
///
/// Unset fields fall back to the gateway defaults (`GET`, [`Credentials::Include`]) when the
/// options are merged into a [`GatewayRequest`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// HTTP method; defaults to `GET`.
	pub method: Option<Method>,
	/// Headers sent verbatim.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	/// Cookie policy; defaults to [`Credentials::Include`].
	pub credentials: Option<Credentials>,
}
impl RequestOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the HTTP method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);

		self
	}

	/// Inserts a header, replacing any previous value for `name`.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets the raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type` unless already present.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload)?);

		self.headers
			.entry(CONTENT_TYPE)
			.or_insert_with(|| HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Overrides the cookie policy.
	pub fn credentials(mut self, credentials: Credentials) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Merges the options over the gateway defaults for `path`.
	pub fn into_request(self, path: impl Into<String>) -> GatewayRequest {
		GatewayRequest {
			method: self.method.unwrap_or(Method::GET),
			path: path.into(),
			headers: self.headers,
			body: self.body,
			credentials: self.credentials.unwrap_or_default(),
		}
	}
}

/// Fully merged request handed to a [`GatewayHttpClient`](crate::http::GatewayHttpClient).
///
/// Retries resend a clone of the exact same value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayRequest {
	/// HTTP method.
	pub method: Method,
	/// Normalized request path (always starts with `/`).
	pub path: String,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional raw body.
	pub body: Option<Vec<u8>>,
	/// Cookie policy.
	pub credentials: Credentials,
}
impl GatewayRequest {
	/// Builds the credential-refresh call: `POST`, cookies included, JSON content type, no body.
	pub fn refresh(path: impl Into<String>) -> Self {
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Self {
			method: Method::POST,
			path: path.into(),
			headers,
			body: None,
			credentials: Credentials::Include,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_options_merge_to_gateway_defaults() {
		let request = RequestOptions::new().into_request("/api/test");

		assert_eq!(request.method, Method::GET);
		assert_eq!(request.path, "/api/test");
		assert_eq!(request.credentials, Credentials::Include);
		assert!(request.headers.is_empty());
		assert!(request.body.is_none());
	}

	#[test]
	fn caller_values_take_precedence() {
		let request = RequestOptions::new()
			.method(Method::PUT)
			.header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
			.json(&serde_json::json!({ "court": 3 }))
			.expect("JSON payload should encode.")
			.credentials(Credentials::Omit)
			.into_request("/api/bookings");

		assert_eq!(request.method, Method::PUT);
		assert_eq!(request.headers.get(CONTENT_TYPE), Some(&HeaderValue::from_static("text/plain")));
		assert_eq!(request.body.as_deref(), Some(br#"{"court":3}"#.as_slice()));
		assert_eq!(request.credentials, Credentials::Omit);
	}

	#[test]
	fn refresh_request_posts_json_with_credentials() {
		let request = GatewayRequest::refresh("/api/auth/refresh");

		assert_eq!(request.method, Method::POST);
		assert_eq!(
			request.headers.get(CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/json"))
		);
		assert_eq!(request.credentials, Credentials::Include);
		assert!(request.body.is_none());
	}
}
