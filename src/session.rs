//! Identity state holder built on the gateway.
//!
//! [`AuthSession`] caches the signed-in [`UserProfile`] and listens to the gateway's
//! [`AuthEvent`] bus: whenever a credential refresh fails the cached profile is dropped, so the
//! application never keeps showing a user whose session the backend no longer honors.

mod profile;

pub use profile::*;

// std
use std::sync::Weak;
// crates.io
use http::{Method, StatusCode};
use tokio::{
	sync::broadcast::{Receiver, error::RecvError},
	task::JoinHandle,
};
// self
use crate::{
	_prelude::*,
	events::AuthEvent,
	gateway::Gateway,
	http::{GatewayHttpClient, GatewayResponse, RequestOptions},
};

type UserSlot = RwLock<Option<UserProfile>>;

const UNREACHABLE_SERVER: &str = "Unable to communicate with the server.";

/// Account endpoints used by [`AuthSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRoutes {
	/// Returns the current user's profile envelope.
	pub profile: String,
	/// Accepts [`LoginForm`] bodies.
	pub login: String,
	/// Accepts [`RegisterForm`] bodies.
	pub register: String,
	/// Ends the backend session.
	pub logout: String,
}
impl Default for SessionRoutes {
	fn default() -> Self {
		Self {
			profile: "/api/user/me".into(),
			login: "/api/auth/login".into(),
			register: "/api/auth/register".into(),
			logout: "/api/auth/logout".into(),
		}
	}
}

/// Cached identity of the signed-in user, cleared automatically on [`AuthEvent::Logout`].
///
/// Construction spawns the event listener, so it must happen inside a Tokio runtime. Dropping
/// the session stops the listener.
pub struct AuthSession<C>
where
	C: ?Sized + GatewayHttpClient,
{
	gateway: Gateway<C>,
	routes: SessionRoutes,
	user: Arc<UserSlot>,
	listener: JoinHandle<()>,
}
impl<C> AuthSession<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a session using the default account routes.
	pub fn new(gateway: Gateway<C>) -> Self {
		Self::with_routes(gateway, SessionRoutes::default())
	}

	/// Creates a session using custom account routes.
	pub fn with_routes(gateway: Gateway<C>, routes: SessionRoutes) -> Self {
		let user = Arc::new(UserSlot::default());
		let listener = tokio::spawn(clear_on_logout(gateway.subscribe(), Arc::downgrade(&user)));

		Self { gateway, routes, user, listener }
	}

	/// Gateway the session dispatches through.
	pub fn gateway(&self) -> &Gateway<C> {
		&self.gateway
	}

	/// Snapshot of the cached profile.
	pub fn user(&self) -> Option<UserProfile> {
		self.user.read().clone()
	}

	/// Whether a profile is cached.
	pub fn is_authenticated(&self) -> bool {
		self.user.read().is_some()
	}

	/// Reloads the profile; a non-2xx answer clears the cache.
	pub async fn fetch_profile(&self) -> Result<Option<UserProfile>> {
		let response = self.gateway.get(self.routes.profile.as_str()).await?;
		let profile = if response.ok() {
			response.json::<ApiEnvelope<UserProfile>>()?.data
		} else {
			None
		};

		*self.user.write() = profile.clone();

		Ok(profile)
	}

	/// Signs in and, on success, reloads the profile.
	///
	/// Rejections and unreadable replies are reported through the returned [`AuthOutcome`];
	/// only transport failures of the login call itself are errors.
	pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome> {
		let options =
			RequestOptions::new().method(Method::POST).json(&LoginForm { email, password })?;
		let response = self.gateway.dispatch(self.routes.login.as_str(), options).await?;

		self.settle(response, |status| status.is_success(), "Login successful.", "Login failed.")
			.await
	}

	/// Creates an account and, when the backend answers `201 Created`, reloads the profile.
	pub async fn register(&self, form: &RegisterForm) -> Result<AuthOutcome> {
		let options = RequestOptions::new().method(Method::POST).json(form)?;
		let response = self.gateway.dispatch(self.routes.register.as_str(), options).await?;

		self.settle(
			response,
			|status| status == StatusCode::CREATED,
			"Registration successful.",
			"Registration failed.",
		)
		.await
	}

	/// Ends the backend session and clears the cache.
	pub async fn logout(&self) -> Result<()> {
		self.gateway
			.dispatch(self.routes.logout.as_str(), RequestOptions::new().method(Method::POST))
			.await?;
		self.clear();

		Ok(())
	}

	/// Merges `update` into the cached profile; no-op when signed out.
	pub fn update_user(&self, update: ProfileUpdate) {
		if let Some(profile) = self.user.write().as_mut() {
			update.apply(profile);
		}
	}

	/// Drops the cached profile without contacting the backend.
	pub fn clear(&self) {
		*self.user.write() = None;
	}

	async fn settle(
		&self,
		response: GatewayResponse,
		accepted: impl FnOnce(StatusCode) -> bool,
		success_message: &str,
		failure_message: &str,
	) -> Result<AuthOutcome> {
		let Ok(reply) = response.json::<AuthReply>() else {
			return Ok(AuthOutcome::failed(UNREACHABLE_SERVER));
		};

		if !accepted(response.status()) {
			let mut outcome =
				AuthOutcome::failed(reply.message.unwrap_or_else(|| failure_message.into()));

			outcome.errors = reply.errors.unwrap_or_default();

			return Ok(outcome);
		}
		if self.fetch_profile().await.is_err() {
			return Ok(AuthOutcome::failed(UNREACHABLE_SERVER));
		}

		Ok(AuthOutcome::succeeded(reply.message.unwrap_or_else(|| success_message.into())))
	}
}
impl<C> Debug for AuthSession<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthSession")
			.field("routes", &self.routes)
			.field("authenticated", &self.is_authenticated())
			.finish()
	}
}
impl<C> Drop for AuthSession<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn drop(&mut self) {
		self.listener.abort();
	}
}

async fn clear_on_logout(mut events: Receiver<AuthEvent>, user: Weak<UserSlot>) {
	loop {
		match events.recv().await {
			// A lagged receiver may have missed a logout.
			Ok(AuthEvent::Logout) | Err(RecvError::Lagged(_)) => {
				let Some(user) = user.upgrade() else {
					return;
				};

				*user.write() = None;
			},
			Err(RecvError::Closed) => return,
		}
	}
}
