//! Identifiers and small enums shared by requests and results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Correlation tag attached to a capture request for one submission.
///
/// Tags are issued by a single dispatch session from a strictly increasing
/// counter and are only meaningful to the session that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(u64);

impl Tag {
	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	pub const fn value(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "tag#{}", self.0)
	}
}

/// Output target configured on the capture session.
///
/// The device only understands surfaces it was configured with; the frame
/// server treats them as opaque handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Surface {
	id: u64,
	name: String,
}

impl Surface {
	pub fn new(id: u64, name: impl Into<String>) -> Self {
		Self { id, name: name.into() }
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

/// Whether a batch replaces the repeating burst or is captured once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
	Repeating,
	NonRepeating,
}

/// Starting point for a request's parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestTemplate {
	#[default]
	Preview,
	StillCapture,
	Record,
	VideoSnapshot,
	ZeroShutterLag,
	Manual,
}

/// Why the device could not produce a result for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
	/// The device hit an error while processing the request.
	Error,
	/// The request was dropped by `abort_captures` or a repeating-burst swap.
	Flushed,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tag_orders_by_counter_value() {
		assert!(Tag::new(1) < Tag::new(2));
		assert_eq!(Tag::new(7).to_string(), "tag#7");
	}

	#[test]
	fn request_type_uses_camel_case() {
		let json = serde_json::to_string(&RequestType::NonRepeating).unwrap();
		assert_eq!(json, "\"nonRepeating\"");
	}
}
