//! Authenticated request gateway for cookie-authenticated HTTP backends: transparent credential
//! refresh on `401`, single-flight refresh coordination, and per-endpoint throttling.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod session;
pub mod target;
pub mod throttle;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and a scripted transport for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{collections::VecDeque, time::Duration};
	// crates.io
	use ::http::StatusCode;
	use tokio::time::Instant;
	// self
	use crate::{
		config::GatewayConfig,
		gateway::Gateway,
		http::{GatewayHttpClient, GatewayRequest, GatewayResponse, TransportFuture},
	};

	/// Error produced for steps scripted with [`Scripted::Fail`].
	#[derive(Debug)]
	pub struct ScriptedTransportError;
	impl Display for ScriptedTransportError {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.write_str("Scripted network failure.")
		}
	}
	impl StdError for ScriptedTransportError {}

	/// One scripted transport outcome.
	#[derive(Clone, Debug)]
	pub enum Scripted {
		/// Answer with the given response.
		Respond(GatewayResponse),
		/// Fail with [`ScriptedTransportError`].
		Fail,
	}

	/// Request observed by [`ScriptedHttpClient`], stamped with the (possibly paused) Tokio clock.
	#[derive(Clone, Debug)]
	pub struct RecordedCall {
		/// Instant the transport received the request.
		pub at: Instant,
		/// Request as handed over by the gateway.
		pub request: GatewayRequest,
	}

	/// In-memory transport replaying queued outcomes per path and recording every request.
	///
	/// Paths without queued outcomes answer `200 OK` with an empty body.
	#[derive(Debug, Default)]
	pub struct ScriptedHttpClient {
		routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
		latency: Mutex<HashMap<String, Duration>>,
		calls: Mutex<Vec<RecordedCall>>,
	}
	impl ScriptedHttpClient {
		/// Queues `step` for `path`.
		pub fn push(&self, path: &str, step: Scripted) -> &Self {
			self.routes.lock().entry(path.to_owned()).or_default().push_back(step);

			self
		}

		/// Queues an empty-bodied response with `status` for `path`.
		pub fn respond(&self, path: &str, status: u16) -> &Self {
			self.respond_json(path, status, "")
		}

		/// Queues a response with `status` and `body` for `path`.
		pub fn respond_json(&self, path: &str, status: u16, body: &str) -> &Self {
			let status = StatusCode::from_u16(status).expect("Scripted status should be valid.");

			self.push(path, Scripted::Respond(GatewayResponse::new(status, Default::default(), body)))
		}

		/// Queues a transport failure for `path`.
		pub fn fail(&self, path: &str) -> &Self {
			self.push(path, Scripted::Fail)
		}

		/// Delays every request to `path` by `latency` before answering.
		pub fn delay(&self, path: &str, latency: Duration) -> &Self {
			self.latency.lock().insert(path.to_owned(), latency);

			self
		}

		/// Every recorded request, in arrival order.
		pub fn calls(&self) -> Vec<RecordedCall> {
			self.calls.lock().clone()
		}

		/// Recorded requests addressed to `path`, in arrival order.
		pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
			self.calls.lock().iter().filter(|call| call.request.path == path).cloned().collect()
		}
	}
	impl GatewayHttpClient for ScriptedHttpClient {
		type TransportError = ScriptedTransportError;

		fn send(&self, request: GatewayRequest) -> TransportFuture<'_, Self::TransportError> {
			Box::pin(async move {
				let latency = self.latency.lock().get(&request.path).copied();
				let step = self.routes.lock().get_mut(&request.path).and_then(VecDeque::pop_front);

				self.calls.lock().push(RecordedCall { at: Instant::now(), request });

				if let Some(latency) = latency {
					tokio::time::sleep(latency).await;
				}

				match step {
					Some(Scripted::Respond(response)) => Ok(response),
					Some(Scripted::Fail) => Err(ScriptedTransportError),
					None => Ok(GatewayResponse::with_status(StatusCode::OK)),
				}
			})
		}
	}

	/// Gateway over a fresh [`ScriptedHttpClient`] with default configuration.
	pub fn scripted_gateway() -> (Gateway<ScriptedHttpClient>, Arc<ScriptedHttpClient>) {
		scripted_gateway_with(GatewayConfig::default())
	}

	/// Gateway over a fresh [`ScriptedHttpClient`] with `config`.
	pub fn scripted_gateway_with(
		config: GatewayConfig,
	) -> (Gateway<ScriptedHttpClient>, Arc<ScriptedHttpClient>) {
		let transport = Arc::new(ScriptedHttpClient::default());

		(Gateway::with_http_client(config, transport.clone()), transport)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
