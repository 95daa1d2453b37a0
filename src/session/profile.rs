//! Wire types exchanged with the account endpoints.

// self
use crate::_prelude::*;

/// Standard response envelope used by the account API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
	/// Machine-readable error, if any.
	#[serde(default)]
	pub error: Option<String>,
	/// Human-readable message, if any.
	#[serde(default)]
	pub message: Option<String>,
	/// Payload.
	pub data: Option<T>,
}

/// Timestamp as serialized by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTimestamp {
	/// Local date-time string.
	pub date: String,
	/// Backend timezone kind discriminator.
	pub timezone_type: i32,
	/// Timezone name.
	pub timezone: String,
}

/// Profile of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
	/// Login e-mail.
	pub email: String,
	/// Family name.
	pub last_name: String,
	/// Given name.
	pub first_name: String,
	/// Company, for business accounts.
	#[serde(default)]
	pub company: Option<String>,
	/// Whether the user opted into the newsletter.
	#[serde(default)]
	pub newsletter_optin: bool,
	/// Whether the e-mail address has been verified.
	#[serde(default)]
	pub is_verified: bool,
	/// Whether the account has been anonymized.
	#[serde(default)]
	pub is_anonymous: bool,
	/// Granted roles (e.g. `ROLE_ADMIN`).
	#[serde(default)]
	pub roles: Vec<String>,
	/// Account creation time.
	pub created_at: BackendTimestamp,
	/// Last update time.
	#[serde(default)]
	pub updated_at: Option<BackendTimestamp>,
}
impl UserProfile {
	/// Whether the user holds `role`.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|granted| granted == role)
	}
}

/// Partial update merged into the cached [`UserProfile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
	/// New e-mail.
	pub email: Option<String>,
	/// New family name.
	pub last_name: Option<String>,
	/// New given name.
	pub first_name: Option<String>,
	/// New company; `Some(None)` clears it.
	pub company: Option<Option<String>>,
	/// New newsletter preference.
	pub newsletter_optin: Option<bool>,
	/// New role set.
	pub roles: Option<Vec<String>>,
}
impl ProfileUpdate {
	/// Applies every set field to `profile`.
	pub fn apply(self, profile: &mut UserProfile) {
		if let Some(email) = self.email {
			profile.email = email;
		}
		if let Some(last_name) = self.last_name {
			profile.last_name = last_name;
		}
		if let Some(first_name) = self.first_name {
			profile.first_name = first_name;
		}
		if let Some(company) = self.company {
			profile.company = company;
		}
		if let Some(newsletter_optin) = self.newsletter_optin {
			profile.newsletter_optin = newsletter_optin;
		}
		if let Some(roles) = self.roles {
			profile.roles = roles;
		}
	}
}

/// Credentials posted to the login endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginForm<'a> {
	/// Login e-mail.
	pub email: &'a str,
	/// Plain-text password.
	pub password: &'a str,
}

/// Account creation form posted to the register endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
	/// Company name (may be empty).
	pub company: String,
	/// Family name.
	pub last_name: String,
	/// Given name.
	pub first_name: String,
	/// Login e-mail.
	pub email: String,
	/// Password.
	pub password: String,
	/// Password confirmation.
	pub confirm_password: String,
}

/// Result of a login or registration attempt, ready to show to the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthOutcome {
	/// Whether the attempt succeeded.
	pub success: bool,
	/// Server-provided or default message.
	pub message: String,
	/// Per-field validation errors.
	pub errors: BTreeMap<String, String>,
}
impl AuthOutcome {
	pub(crate) fn succeeded(message: impl Into<String>) -> Self {
		Self { success: true, message: message.into(), errors: BTreeMap::new() }
	}

	pub(crate) fn failed(message: impl Into<String>) -> Self {
		Self { success: false, message: message.into(), errors: BTreeMap::new() }
	}
}

/// Body returned by the login and register endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthReply {
	#[serde(default)]
	pub(crate) message: Option<String>,
	#[serde(default)]
	pub(crate) errors: Option<BTreeMap<String, String>>,
}
