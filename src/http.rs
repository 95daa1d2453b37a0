//! Transport primitives for gateway requests.
//!
//! The module exposes [`GatewayHttpClient`], the gateway's only dependency on an HTTP stack,
//! together with the request/response values flowing through it. Implementations receive a
//! fully merged [`GatewayRequest`] whose path is already normalized and return a buffered
//! [`GatewayResponse`]; any status code is a successful send; only network-level failures are
//! errors.

mod request;
mod response;

pub use request::*;
pub use response::*;

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::{
	cookie::{CookieStore, Jar},
	header::{COOKIE, SET_COOKIE},
};
// self
use crate::_prelude::*;

/// Boxed future returned by [`GatewayHttpClient::send`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<GatewayResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing gateway requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by gateway
/// clones across executor threads, and the futures they return must be `Send`.
pub trait GatewayHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and buffers the response.
	fn send(&self, request: GatewayRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Failures raised by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Debug, ThisError)]
pub enum ReqwestTransportError {
	/// The normalized path does not form a valid URL once joined with the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// reqwest reported a network failure.
	#[error(transparent)]
	Request(#[from] ReqwestError),
}

/// reqwest-backed transport that resolves gateway paths against a fixed origin and keeps a
/// cookie jar so credentialed requests carry the session cookies issued by the backend.
///
/// Cloning shares both the connection pool and the cookie jar.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	base_url: Url,
	cookies: Arc<Jar>,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a transport with a default reqwest client.
	pub fn new(base_url: Url) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().build()?;

		Ok(Self::with_client(client, base_url))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The gateway manages cookies itself; do not enable reqwest's own cookie store on `client`.
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url, cookies: Default::default() }
	}

	/// Origin every request path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Cookie jar shared by every credentialed request.
	pub fn cookies(&self) -> &Arc<Jar> {
		&self.cookies
	}

	/// Joins the normalized `path` onto the base URL, keeping any base path prefix.
	pub fn resolve(&self, path: &str) -> Result<Url, ReqwestTransportError> {
		let base = self.base_url.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}{path}"))
			.map_err(|source| ReqwestTransportError::InvalidPath { path: path.into(), source })
	}

	fn shares_cookies(&self, credentials: Credentials, url: &Url) -> bool {
		match credentials {
			Credentials::Include => true,
			Credentials::SameOrigin => url.origin() == self.base_url.origin(),
			Credentials::Omit => false,
		}
	}

	async fn execute(
		&self,
		request: GatewayRequest,
	) -> Result<GatewayResponse, ReqwestTransportError> {
		let url = self.resolve(&request.path)?;
		let shares_cookies = self.shares_cookies(request.credentials, &url);
		let mut builder =
			self.client.request(request.method, url.clone()).headers(request.headers);

		if let Some(cookie) = shares_cookies.then(|| self.cookies.cookies(&url)).flatten() {
			builder = builder.header(COOKIE, cookie);
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await?;
		let status = response.status();
		let headers = response.headers().to_owned();

		if shares_cookies {
			self.cookies.set_cookies(&mut headers.get_all(SET_COOKIE).iter(), &url);
		}

		let body = response.bytes().await?;

		Ok(GatewayResponse::new(status, headers, body.to_vec()))
	}
}
#[cfg(feature = "reqwest")]
impl GatewayHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestTransportError;

	fn send(&self, request: GatewayRequest) -> TransportFuture<'_, Self::TransportError> {
		Box::pin(self.execute(request))
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	fn client(base: &str) -> ReqwestHttpClient {
		let base = Url::parse(base).expect("Fixture base URL should parse.");

		ReqwestHttpClient::new(base).expect("Default reqwest client should build.")
	}

	#[test]
	fn resolve_keeps_base_path_prefix() {
		let transport = client("https://padel.example.com/backend/");

		assert_eq!(
			transport.resolve("/api/user/me").expect("Path should resolve.").as_str(),
			"https://padel.example.com/backend/api/user/me"
		);

		let transport = client("https://padel.example.com");

		assert_eq!(
			transport.resolve("/api/products?page=2").expect("Path should resolve.").as_str(),
			"https://padel.example.com/api/products?page=2"
		);
	}

	#[test]
	fn credentials_modes_gate_cookie_sharing() {
		let transport = client("https://padel.example.com");
		let same = transport.resolve("/api/test").expect("Path should resolve.");
		let other = Url::parse("https://cdn.example.com/asset").expect("URL should parse.");

		assert!(transport.shares_cookies(Credentials::Include, &other));
		assert!(transport.shares_cookies(Credentials::SameOrigin, &same));
		assert!(!transport.shares_cookies(Credentials::SameOrigin, &other));
		assert!(!transport.shares_cookies(Credentials::Omit, &same));
	}
}
