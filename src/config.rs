//! Gateway configuration: builder, validation, and JSON loading.

// std
use std::time::Duration;
// self
use crate::{_prelude::*, error::ConfigError, target::RequestTarget};

/// Validated gateway configuration.
///
/// Timing values are fixed for the lifetime of a gateway; individual calls cannot override them.
/// Values only come from [`Default`], [`GatewayConfigBuilder::build`], or
/// [`from_json`](Self::from_json), so every instance has passed validation:
///
/// ```compile_fail
/// use auth_gateway::config::GatewayConfig;
///
/// let config = GatewayConfig { event_capacity: 0, ..Default::default() };
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
	base_url: Option<Url>,
	refresh_path: String,
	throttle_interval: Duration,
	refresh_cooldown: Duration,
	event_capacity: usize,
}
impl GatewayConfig {
	/// Default credential-refresh path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/api/auth/refresh";
	/// Default minimum spacing between calls on the same path.
	pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(1_000);
	/// Default cooldown before a settled refresh is forgotten.
	pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_millis(1_000);
	/// Default auth event channel capacity.
	pub const DEFAULT_EVENT_CAPACITY: usize = 16;

	/// Returns a builder seeded with the defaults.
	pub fn builder() -> GatewayConfigBuilder {
		GatewayConfigBuilder::default()
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let file: ConfigFile = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;

		file.into_builder()?.build()
	}

	/// Origin the default HTTP transport resolves request paths against.
	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// Normalized credential-refresh path.
	pub fn refresh_path(&self) -> &str {
		&self.refresh_path
	}

	/// Minimum spacing between permitted calls on the same path.
	pub fn throttle_interval(&self) -> Duration {
		self.throttle_interval
	}

	/// Delay after a refresh settles before a new refresh may start.
	pub fn refresh_cooldown(&self) -> Duration {
		self.refresh_cooldown
	}

	/// Capacity of the auth event broadcast channel.
	pub fn event_capacity(&self) -> usize {
		self.event_capacity
	}

	/// Whether `path` addresses the credential-refresh endpoint.
	///
	/// Matches on containment so prefixed or query-carrying variants are recognized too.
	pub fn is_refresh_endpoint(&self, path: &str) -> bool {
		path.contains(self.refresh_path.as_str())
	}
}
impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			base_url: None,
			refresh_path: Self::DEFAULT_REFRESH_PATH.into(),
			throttle_interval: Self::DEFAULT_THROTTLE_INTERVAL,
			refresh_cooldown: Self::DEFAULT_REFRESH_COOLDOWN,
			event_capacity: Self::DEFAULT_EVENT_CAPACITY,
		}
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Optional origin for the default transport.
	pub base_url: Option<Url>,
	/// Refresh path, normalized during [`build`](Self::build).
	pub refresh_path: String,
	/// Minimum spacing between calls on the same path.
	pub throttle_interval: Duration,
	/// Cooldown before a settled refresh is forgotten.
	pub refresh_cooldown: Duration,
	/// Auth event channel capacity.
	pub event_capacity: usize,
}
impl GatewayConfigBuilder {
	/// Sets the origin used by the default transport.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Parses and sets the origin used by the default transport.
	pub fn parse_base_url(self, raw: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(self.base_url(url))
	}

	/// Overrides the credential-refresh path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the per-path throttle interval.
	pub fn throttle_interval(mut self, interval: Duration) -> Self {
		self.throttle_interval = interval;

		self
	}

	/// Overrides the refresh cooldown.
	pub fn refresh_cooldown(mut self, cooldown: Duration) -> Self {
		self.refresh_cooldown = cooldown;

		self
	}

	/// Overrides the auth event channel capacity.
	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.event_capacity = capacity;

		self
	}

	/// Validates the builder and produces a [`GatewayConfig`].
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		if let Some(scheme) = self
			.base_url
			.as_ref()
			.map(Url::scheme)
			.filter(|scheme| !matches!(*scheme, "http" | "https"))
		{
			return Err(ConfigError::UnsupportedScheme { scheme: scheme.into() });
		}

		let refresh_path = self.refresh_path.trim();

		if refresh_path.is_empty() {
			return Err(ConfigError::EmptyRefreshPath);
		}
		if self.event_capacity == 0 {
			return Err(ConfigError::ZeroEventCapacity);
		}

		Ok(GatewayConfig {
			base_url: self.base_url,
			refresh_path: RequestTarget::new(refresh_path).into_string(),
			throttle_interval: self.throttle_interval,
			refresh_cooldown: self.refresh_cooldown,
			event_capacity: self.event_capacity,
		})
	}
}
impl Default for GatewayConfigBuilder {
	fn default() -> Self {
		let defaults = GatewayConfig::default();

		Self {
			base_url: defaults.base_url,
			refresh_path: defaults.refresh_path,
			throttle_interval: defaults.throttle_interval,
			refresh_cooldown: defaults.refresh_cooldown,
			event_capacity: defaults.event_capacity,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
	base_url: Option<String>,
	refresh_path: Option<String>,
	throttle_interval_ms: Option<u64>,
	refresh_cooldown_ms: Option<u64>,
	event_capacity: Option<usize>,
}
impl ConfigFile {
	fn into_builder(self) -> Result<GatewayConfigBuilder, ConfigError> {
		let mut builder = GatewayConfig::builder();

		if let Some(raw) = self.base_url.as_deref() {
			builder = builder.parse_base_url(raw)?;
		}
		if let Some(path) = self.refresh_path {
			builder = builder.refresh_path(path);
		}
		if let Some(ms) = self.throttle_interval_ms {
			builder = builder.throttle_interval(Duration::from_millis(ms));
		}
		if let Some(ms) = self.refresh_cooldown_ms {
			builder = builder.refresh_cooldown(Duration::from_millis(ms));
		}
		if let Some(capacity) = self.event_capacity {
			builder = builder.event_capacity(capacity);
		}

		Ok(builder)
	}
}
