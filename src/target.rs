//! Request target normalization.

// self
use crate::_prelude::*;

/// Canonical request path used both as dispatch target and throttle key.
///
/// The wrapped value always starts with `/`. Inputs that already carry a leading separator are
/// kept verbatim; everything else gets exactly one separator prepended.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTarget(String);
impl RequestTarget {
	/// Normalizes `raw` into a request target.
	pub fn new(raw: impl Into<String>) -> Self {
		let raw = raw.into();

		if raw.starts_with('/') { Self(raw) } else { Self(format!("/{raw}")) }
	}

	/// Returns the normalized path.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Consumes the target, returning the normalized path.
	pub fn into_string(self) -> String {
		self.0
	}
}
impl AsRef<str> for RequestTarget {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl Display for RequestTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl From<&str> for RequestTarget {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for RequestTarget {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<&String> for RequestTarget {
	fn from(value: &String) -> Self {
		Self::new(value.as_str())
	}
}
/// URL-like inputs contribute their path and query; the origin belongs to the transport.
impl From<&Url> for RequestTarget {
	fn from(value: &Url) -> Self {
		match value.query() {
			Some(query) => Self::new(format!("{}?{query}", value.path())),
			None => Self::new(value.path()),
		}
	}
}
