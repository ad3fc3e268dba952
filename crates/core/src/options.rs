//! Tunables for the components built around a frame server.

use serde::{Deserialize, Serialize};

/// Consecutive `FailureReason::Error` results before the pipeline is reset.
pub const DEFAULT_REPEAT_FAILURE_THRESHOLD: u32 = 5;

/// Buffer slots a pooled capture stream can have in flight.
pub const DEFAULT_STREAM_SLOTS: usize = 3;

/// Options for the frame server's collaborators.
///
/// Every field is optional; unset fields fall back to the `DEFAULT_*`
/// constants. Lock acquisition has no timeout and is not
/// configurable here.
///
/// # Example
///
/// ```ignore
/// let options = FrameServerOptions::new()
///     .repeat_failure_threshold(10)
///     .stream_slots(2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameServerOptions {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub repeat_failure_threshold: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream_slots: Option<usize>,
}

impl FrameServerOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn repeat_failure_threshold(mut self, threshold: u32) -> Self {
		self.repeat_failure_threshold = Some(threshold);
		self
	}

	pub fn stream_slots(mut self, slots: usize) -> Self {
		self.stream_slots = Some(slots);
		self
	}

	/// Threshold to use, never less than one failure.
	pub fn effective_repeat_failure_threshold(&self) -> u32 {
		self.repeat_failure_threshold.unwrap_or(DEFAULT_REPEAT_FAILURE_THRESHOLD).max(1)
	}

	/// Slots per pooled stream, never less than one.
	pub fn effective_stream_slots(&self) -> usize {
		self.stream_slots.unwrap_or(DEFAULT_STREAM_SLOTS).max(1)
	}
}
