//! Authenticated request gateway: normalization, throttling, refresh-on-401, and retry.
//!
//! [`Gateway::dispatch`] normalizes the target path, waits for the per-path throttle, sends the
//! request with credentials included, and, when the backend answers `401`, joins the shared
//! refresh flight. A successful refresh resends the identical request exactly once; a failed
//! refresh hands the original `401` back and publishes [`AuthEvent::Logout`]. Requests to the
//! refresh endpoint itself bypass both the throttle and the refresh logic.

mod metrics;

pub use metrics::GatewayMetrics;

// crates.io
use http::StatusCode;
use tokio::sync::broadcast::Receiver;
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	error::TransportError,
	events::{AuthEvent, AuthEvents},
	http::{GatewayHttpClient, GatewayRequest, GatewayResponse, RequestOptions},
	obs::{self, GatewayOp, OpOutcome, OpSpan},
	refresh::RefreshFlight,
	target::RequestTarget,
	throttle::ThrottleRegistry,
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient};

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestHttpClient>;

#[derive(Debug)]
struct GatewayState {
	throttle: ThrottleRegistry,
	refresh: RefreshFlight,
	events: AuthEvents,
	metrics: GatewayMetrics,
}

/// Coordinates authenticated requests against a single backend.
///
/// Each gateway owns its throttle registry, refresh flight, and event bus; independent gateways
/// never observe each other. Clones share all three, so a cloned handle participates in the same
/// single-flight refresh and the same per-path spacing.
///
/// Dispatching spawns timer tasks and must therefore happen inside a Tokio runtime.
pub struct Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// HTTP transport used for every outbound request.
	pub http_client: Arc<C>,
	config: GatewayConfig,
	state: Arc<GatewayState>,
}
impl<C> Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a gateway that sends through the caller-provided transport.
	pub fn with_http_client(config: GatewayConfig, http_client: impl Into<Arc<C>>) -> Self {
		let state = GatewayState {
			throttle: ThrottleRegistry::new(config.throttle_interval()),
			refresh: RefreshFlight::new(config.refresh_cooldown()),
			events: AuthEvents::new(config.event_capacity()),
			metrics: GatewayMetrics::default(),
		};

		Self { http_client: http_client.into(), config, state: Arc::new(state) }
	}

	/// Dispatches `target` with default options (`GET`, credentials included).
	pub async fn get(&self, target: impl Into<RequestTarget>) -> Result<GatewayResponse> {
		self.dispatch(target, RequestOptions::default()).await
	}

	/// Dispatches `target` with caller-supplied options.
	///
	/// Any HTTP status is returned as a response; only transport failures of the primary request
	/// or its retry surface as [`Error::Transport`].
	pub async fn dispatch(
		&self,
		target: impl Into<RequestTarget>,
		options: RequestOptions,
	) -> Result<GatewayResponse> {
		const OP: GatewayOp = GatewayOp::Dispatch;

		let target = target.into();
		let span = OpSpan::new(OP, target.as_str());

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.state.metrics.record_dispatch();

		let result = span.instrument(self.dispatch_unrecorded(target, options)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(OP, OpOutcome::Failure),
		}

		result
	}

	/// Joins (or starts) the shared credential refresh and returns its outcome.
	///
	/// Never fails: transport errors during the refresh count as an unsuccessful refresh. The
	/// refresh runs on its own task, so dropping this future does not cancel it.
	pub async fn refresh_credentials(&self) -> bool {
		let gateway = self.clone();

		self.state.refresh.join(move || async move { gateway.send_refresh().await }).await
	}

	/// Validated configuration the gateway was built with.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Registers a listener for auth notifications such as [`AuthEvent::Logout`].
	pub fn subscribe(&self) -> Receiver<AuthEvent> {
		self.state.events.subscribe()
	}

	/// Event bus the gateway publishes to.
	pub fn events(&self) -> &AuthEvents {
		&self.state.events
	}

	/// Activity counters shared by every clone of this gateway.
	pub fn metrics(&self) -> &GatewayMetrics {
		&self.state.metrics
	}

	/// Whether a refresh outcome is currently shared between callers.
	pub fn is_refresh_installed(&self) -> bool {
		self.state.refresh.is_installed()
	}

	async fn dispatch_unrecorded(
		&self,
		target: RequestTarget,
		options: RequestOptions,
	) -> Result<GatewayResponse> {
		let refresh_endpoint = self.config.is_refresh_endpoint(target.as_str());

		if !refresh_endpoint && self.state.throttle.acquire(target.as_str()).await.is_some() {
			self.state.metrics.record_throttled();
		}

		let request = options.into_request(target.into_string());
		let response = self.send(request.clone()).await?;

		if refresh_endpoint || response.status() != StatusCode::UNAUTHORIZED {
			return Ok(response);
		}
		if !self.refresh_credentials().await {
			return Ok(response);
		}

		self.retry(request).await
	}

	async fn retry(&self, request: GatewayRequest) -> Result<GatewayResponse> {
		const OP: GatewayOp = GatewayOp::Retry;

		let span = OpSpan::new(OP, &request.path);

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.state.metrics.record_retry();

		let result = span.instrument(self.send(request)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(OP, OpOutcome::Failure),
		}

		result
	}

	async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse> {
		let path = request.path.clone();

		self.http_client
			.send(request)
			.await
			.map_err(|err| TransportError::network(path, err).into())
	}

	async fn send_refresh(&self) -> bool {
		const OP: GatewayOp = GatewayOp::Refresh;

		let path = self.config.refresh_path();
		let span = OpSpan::new(OP, path);

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.state.metrics.record_refresh_attempt();

		let refreshed = span
			.instrument(async {
				match self.http_client.send(GatewayRequest::refresh(path)).await {
					Ok(response) if response.ok() => true,
					Ok(response) => {
						obs::refresh_failed(path, &response.status());

						false
					},
					Err(err) => {
						obs::refresh_failed(path, &err);

						false
					},
				}
			})
			.await;

		if refreshed {
			obs::record_op_outcome(OP, OpOutcome::Success);
			self.state.metrics.record_refresh_success();
		} else {
			obs::record_op_outcome(OP, OpOutcome::Failure);
			self.state.metrics.record_refresh_failure();
			self.state.events.publish(AuthEvent::Logout);
		}

		refreshed
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient> {
	/// Creates a gateway backed by a fresh reqwest transport rooted at the configured base URL.
	pub fn new(config: GatewayConfig) -> Result<Self> {
		let base_url = config.base_url().cloned().ok_or(ConfigError::MissingBaseUrl)?;
		let http_client = ReqwestHttpClient::new(base_url)?;

		Ok(Self::with_http_client(config, http_client))
	}
}
impl<C> Clone for Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			config: self.config.clone(),
			state: self.state.clone(),
		}
	}
}
impl<C> Debug for Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("refresh_installed", &self.is_refresh_installed())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration;
	// crates.io
	use http::{HeaderValue, Method, header::CONTENT_TYPE};
	use tokio::{sync::broadcast::error::TryRecvError, time};
	// self
	use super::*;
	use crate::{_preludet::*, error::ConfigError, http::Credentials};

	const REFRESH: &str = "/api/auth/refresh";

	#[tokio::test(start_paused = true)]
	async fn dispatch_prepends_separator_and_includes_credentials() {
		let (gateway, transport) = scripted_gateway();
		let response = gateway.get("api/test").await.expect("Dispatch should succeed.");
		let calls = transport.calls();

		assert!(response.ok());
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].request.path, "/api/test");
		assert_eq!(calls[0].request.method, Method::GET);
		assert_eq!(calls[0].request.credentials, Credentials::Include);
		assert!(calls[0].request.headers.is_empty());
		assert!(calls[0].request.body.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn caller_options_take_precedence_over_defaults() {
		let (gateway, transport) = scripted_gateway();
		let options = RequestOptions::new()
			.method(Method::POST)
			.json(&serde_json::json!({ "test": "data" }))
			.expect("JSON body should encode.")
			.credentials(Credentials::Omit);

		gateway.dispatch("/api/test", options).await.expect("Dispatch should succeed.");

		let request = &transport.calls()[0].request;

		assert_eq!(request.path, "/api/test");
		assert_eq!(request.method, Method::POST);
		assert_eq!(
			request.headers.get(CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/json"))
		);
		assert_eq!(request.body.as_deref(), Some(br#"{"test":"data"}"#.as_slice()));
		assert_eq!(request.credentials, Credentials::Omit);
	}

	#[tokio::test(start_paused = true)]
	async fn unauthorized_then_successful_refresh_retries_once() {
		let (gateway, transport) = scripted_gateway();

		transport.respond("/api/test", 401).respond_json("/api/test", 200, r#"{"ok":true}"#);
		transport.respond(REFRESH, 200);

		let response = gateway.get("/api/test").await.expect("Dispatch should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.text(), r#"{"ok":true}"#);
		assert_eq!(transport.calls().len(), 3);
		assert_eq!(transport.calls_to("/api/test").len(), 2);

		let refresh = transport.calls_to(REFRESH);

		assert_eq!(refresh.len(), 1);
		assert_eq!(refresh[0].request.method, Method::POST);
		assert_eq!(refresh[0].request.credentials, Credentials::Include);
		assert_eq!(
			refresh[0].request.headers.get(CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/json"))
		);
		assert_eq!(gateway.metrics().dispatches(), 1);
		assert_eq!(gateway.metrics().retries(), 1);
		assert_eq!(gateway.metrics().refresh_successes(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_refresh_returns_original_response_and_publishes_logout() {
		let (gateway, transport) = scripted_gateway();
		let mut events = gateway.subscribe();

		transport.respond_json("/api/test", 401, r#"{"message":"expired"}"#);
		transport.respond(REFRESH, 401);

		let response = gateway.get("/api/test").await.expect("Dispatch should succeed.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(response.text(), r#"{"message":"expired"}"#);
		assert_eq!(transport.calls_to("/api/test").len(), 1);
		assert_eq!(transport.calls_to(REFRESH).len(), 1);
		assert_eq!(events.try_recv(), Ok(AuthEvent::Logout));
		assert_eq!(gateway.events().listener_count(), 1);
		assert_eq!(gateway.metrics().retries(), 0);
		assert_eq!(gateway.metrics().refresh_failures(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_transport_failure_is_swallowed_and_publishes_logout() {
		let (gateway, transport) = scripted_gateway();
		let mut events = gateway.subscribe();

		transport.respond("/api/test", 401).fail(REFRESH);

		let response = gateway.get("/api/test").await.expect("Refresh errors should not propagate.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(transport.calls_to("/api/test").len(), 1);
		assert_eq!(events.try_recv(), Ok(AuthEvent::Logout));
	}

	#[tokio::test(start_paused = true)]
	async fn primary_transport_failure_propagates() {
		let (gateway, transport) = scripted_gateway();

		transport.fail("/api/test");

		let err = gateway.get("/api/test").await.expect_err("Network errors should propagate.");
		let Error::Transport(transport_err) = err else {
			panic!("Network errors should map to Error::Transport.");
		};

		assert!(transport_err.downcast_ref::<ScriptedTransportError>().is_some());
		assert!(transport.calls_to(REFRESH).is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn retry_transport_failure_propagates() {
		let (gateway, transport) = scripted_gateway();

		transport.respond("/api/test", 401).fail("/api/test").respond(REFRESH, 204);

		let err = gateway.get("/api/test").await.expect_err("Retry errors should propagate.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(transport.calls_to("/api/test").len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn retry_response_is_returned_without_further_refresh() {
		let (gateway, transport) = scripted_gateway();

		transport.respond("/api/test", 401).respond("/api/test", 401).respond(REFRESH, 200);

		let response = gateway.get("/api/test").await.expect("Dispatch should succeed.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(transport.calls_to("/api/test").len(), 2);
		assert_eq!(transport.calls_to(REFRESH).len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_endpoint_is_never_refreshed_or_retried() {
		let (gateway, transport) = scripted_gateway();
		let mut events = gateway.subscribe();

		transport.respond(REFRESH, 401);

		let response = gateway.get(REFRESH).await.expect("Dispatch should succeed.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(transport.calls().len(), 1);
		assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

		transport.respond("/v2/api/auth/refresh", 401);

		gateway.get("v2/api/auth/refresh").await.expect("Dispatch should succeed.");

		assert_eq!(transport.calls().len(), 2);
		assert_eq!(gateway.metrics().refresh_attempts(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_unauthorized_requests_share_one_refresh() {
		let (gateway, transport) = scripted_gateway();

		transport.respond("/api/test1", 401).respond("/api/test2", 401);
		transport.delay(REFRESH, Duration::from_millis(100)).respond(REFRESH, 200);

		let (first, second) = tokio::join!(gateway.get("/api/test1"), gateway.get("/api/test2"));

		assert!(first.expect("First dispatch should succeed.").ok());
		assert!(second.expect("Second dispatch should succeed.").ok());
		assert_eq!(transport.calls_to(REFRESH).len(), 1);
		assert_eq!(transport.calls_to("/api/test1").len(), 2);
		assert_eq!(transport.calls_to("/api/test2").len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_callers_share_a_failed_refresh() {
		let (gateway, transport) = scripted_gateway();
		let mut events = gateway.subscribe();

		transport.respond("/api/a", 401).respond("/api/b", 401).respond("/api/c", 401);
		transport.delay(REFRESH, Duration::from_millis(100)).respond(REFRESH, 500);

		let (a, b, c) =
			tokio::join!(gateway.get("/api/a"), gateway.get("/api/b"), gateway.get("/api/c"));

		for response in [a, b, c] {
			assert_eq!(
				response.expect("Dispatch should succeed.").status(),
				StatusCode::UNAUTHORIZED
			);
		}

		assert_eq!(transport.calls_to(REFRESH).len(), 1);
		assert_eq!(transport.calls().len(), 4);
		assert_eq!(events.try_recv(), Ok(AuthEvent::Logout));
		assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
	}

	#[tokio::test(start_paused = true)]
	async fn abandoned_caller_does_not_cancel_shared_refresh() {
		let (gateway, transport) = scripted_gateway();

		transport.respond("/api/a", 401).respond("/api/b", 401);
		transport.delay(REFRESH, Duration::from_millis(100)).respond(REFRESH, 200);

		let (abandoned, kept) = tokio::join!(
			time::timeout(Duration::from_millis(50), gateway.get("/api/a")),
			gateway.get("/api/b"),
		);

		assert!(abandoned.is_err());
		assert!(kept.expect("Remaining dispatch should succeed.").ok());
		assert_eq!(transport.calls_to(REFRESH).len(), 1);
		assert_eq!(transport.calls_to("/api/b").len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_settles_after_its_only_caller_gives_up() {
		let (gateway, transport) = scripted_gateway();
		let mut events = gateway.subscribe();

		transport.respond("/api/a", 401);
		transport.delay(REFRESH, Duration::from_millis(100)).respond(REFRESH, 401);

		let abandoned = time::timeout(Duration::from_millis(50), gateway.get("/api/a")).await;

		assert!(abandoned.is_err());

		time::sleep(Duration::from_millis(100)).await;

		assert_eq!(events.try_recv(), Ok(AuthEvent::Logout));
		assert_eq!(gateway.metrics().refresh_failures(), 1);
		assert!(gateway.is_refresh_installed());

		time::sleep(Duration::from_millis(1_500)).await;

		assert!(!gateway.is_refresh_installed());
		assert_eq!(transport.calls_to(REFRESH).len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_slot_clears_after_cooldown() {
		let (gateway, transport) = scripted_gateway();

		transport.respond("/api/a", 401).respond(REFRESH, 200);
		gateway.get("/api/a").await.expect("Dispatch should succeed.");

		assert!(gateway.is_refresh_installed());

		time::sleep(Duration::from_millis(1_500)).await;

		assert!(!gateway.is_refresh_installed());

		transport.respond("/api/a", 401).respond(REFRESH, 200);
		gateway.get("/api/a").await.expect("Dispatch should succeed.");

		assert_eq!(transport.calls_to(REFRESH).len(), 2);
		assert_eq!(transport.calls_to("/api/a").len(), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn same_path_calls_are_spaced_by_the_throttle_interval() {
		let (gateway, transport) = scripted_gateway();

		gateway.get("/api/test").await.expect("First dispatch should succeed.");
		time::sleep(Duration::from_millis(250)).await;
		gateway.get("api/test").await.expect("Second dispatch should succeed.");

		let calls = transport.calls_to("/api/test");

		assert_eq!(calls.len(), 2);
		assert!(calls[1].at - calls[0].at >= Duration::from_millis(1_000));
		assert_eq!(gateway.metrics().throttled(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn distinct_paths_are_not_throttled_against_each_other() {
		let (gateway, transport) = scripted_gateway();
		let start = time::Instant::now();

		gateway.get("/api/a").await.expect("Dispatch should succeed.");
		gateway.get("/api/b").await.expect("Dispatch should succeed.");

		assert!(transport.calls().iter().all(|call| call.at == start));
		assert_eq!(gateway.metrics().throttled(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn superseded_callers_all_receive_responses() {
		let (gateway, transport) = scripted_gateway();

		gateway.get("/api/test").await.expect("Dispatch should succeed.");

		let first_at = transport.calls()[0].at;
		let (second, third) = tokio::join!(gateway.get("/api/test"), gateway.get("/api/test"));

		assert!(second.is_ok() && third.is_ok());

		let calls = transport.calls_to("/api/test");

		assert_eq!(calls.len(), 3);
		assert!(calls[1..].iter().all(|call| call.at - first_at >= Duration::from_millis(1_000)));
	}

	#[tokio::test(start_paused = true)]
	async fn independent_gateways_do_not_share_state() {
		let (first, first_transport) = scripted_gateway();
		let (second, second_transport) = scripted_gateway();

		first_transport.respond("/api/test", 401).respond(REFRESH, 200);
		second_transport.respond("/api/test", 401).respond(REFRESH, 200);

		let (a, b) = tokio::join!(first.get("/api/test"), second.get("/api/test"));

		assert!(a.is_ok() && b.is_ok());
		assert_eq!(first_transport.calls_to(REFRESH).len(), 1);
		assert_eq!(second_transport.calls_to(REFRESH).len(), 1);
		assert_eq!(second_transport.calls()[0].at, first_transport.calls()[0].at);
	}

	#[tokio::test(start_paused = true)]
	async fn custom_refresh_path_is_honored() {
		let config = GatewayConfig::builder()
			.refresh_path("api/session/renew")
			.build()
			.expect("Config should validate.");
		let (gateway, transport) = scripted_gateway_with(config);

		assert_eq!(gateway.config().refresh_path(), "/api/session/renew");

		transport.respond("/api/test", 401).respond("/api/session/renew", 200);
		gateway.get("/api/test").await.expect("Dispatch should succeed.");

		assert_eq!(transport.calls_to("/api/session/renew").len(), 1);
		assert!(transport.calls_to(REFRESH).is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn gateway_channels_follow_validated_config() {
		let err = GatewayConfig::builder()
			.event_capacity(0)
			.build()
			.expect_err("Zero event capacity should be rejected before a gateway exists.");

		assert!(matches!(err, ConfigError::ZeroEventCapacity));

		let config = GatewayConfig::builder()
			.event_capacity(1)
			.throttle_interval(Duration::from_millis(200))
			.build()
			.expect("Config should validate.");
		let (gateway, transport) = scripted_gateway_with(config);
		let mut events = gateway.subscribe();

		transport.respond("/api/a", 401).respond(REFRESH, 401);
		gateway.get("/api/a").await.expect("Dispatch should succeed.");
		gateway.get("/api/a").await.expect("Dispatch should succeed.");

		let calls = transport.calls_to("/api/a");

		assert_eq!(gateway.config().event_capacity(), 1);
		assert_eq!(events.try_recv(), Ok(AuthEvent::Logout));
		assert!(calls[1].at - calls[0].at >= Duration::from_millis(200));
		assert!(calls[1].at - calls[0].at < Duration::from_millis(1_000));
	}
}
