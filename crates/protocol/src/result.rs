//! Per-frame results and failures reported by the device.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::{self, Key};
use crate::request::lookup;
use crate::types::FailureReason;

/// Partial metadata for one frame. May arrive out of order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
	frame_number: i64,
	sequence_id: i32,
	values: BTreeMap<String, Value>,
}

impl CaptureResult {
	pub fn new(frame_number: i64, sequence_id: i32) -> Self {
		Self {
			frame_number,
			sequence_id,
			values: BTreeMap::new(),
		}
	}

	/// Builder-style insert, used by devices when assembling a result.
	pub fn with<T: Serialize>(mut self, key: Key<T>, value: T) -> Result<Self, serde_json::Error> {
		self.values.insert(key.name().to_string(), serde_json::to_value(value)?);
		Ok(self)
	}

	pub fn get<T: DeserializeOwned>(&self, key: Key<T>) -> Option<T> {
		lookup(&self.values, key)
	}

	pub fn frame_number(&self) -> i64 {
		self.frame_number
	}

	pub fn sequence_id(&self) -> i32 {
		self.sequence_id
	}

	pub fn timestamp(&self) -> Option<i64> {
		self.get(keys::SENSOR_TIMESTAMP)
	}
}

/// Final metadata for one frame, together with the partials it supersedes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCaptureResult {
	result: CaptureResult,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	partial_results: Vec<CaptureResult>,
}

impl TotalCaptureResult {
	pub fn new(result: CaptureResult) -> Self {
		Self {
			result,
			partial_results: Vec::new(),
		}
	}

	pub fn with_partials(mut self, partial_results: Vec<CaptureResult>) -> Self {
		self.partial_results = partial_results;
		self
	}

	pub fn get<T: DeserializeOwned>(&self, key: Key<T>) -> Option<T> {
		self.result.get(key)
	}

	pub fn result(&self) -> &CaptureResult {
		&self.result
	}

	pub fn partial_results(&self) -> &[CaptureResult] {
		&self.partial_results
	}

	pub fn frame_number(&self) -> i64 {
		self.result.frame_number
	}

	pub fn sequence_id(&self) -> i32 {
		self.result.sequence_id
	}

	pub fn timestamp(&self) -> Option<i64> {
		self.result.timestamp()
	}
}

/// A request the device could not turn into a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFailure {
	pub frame_number: i64,
	pub sequence_id: i32,
	pub reason: FailureReason,
	pub was_image_captured: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn total_result_reads_through_to_final_metadata() {
		let result = CaptureResult::new(12, 3)
			.with(keys::SENSOR_TIMESTAMP, 1_000)
			.unwrap()
			.with(keys::CONTROL_AF_STATE, keys::af_state::FOCUSED_LOCKED)
			.unwrap();
		let total = TotalCaptureResult::new(result);

		assert_eq!(total.frame_number(), 12);
		assert_eq!(total.sequence_id(), 3);
		assert_eq!(total.timestamp(), Some(1_000));
		assert_eq!(total.get(keys::CONTROL_AF_STATE), Some(keys::af_state::FOCUSED_LOCKED));
	}

	#[test]
	fn failure_deserializes_from_camel_case() {
		let json = r#"{"frameNumber": 4, "sequenceId": 1, "reason": "flushed", "wasImageCaptured": false}"#;
		let failure: CaptureFailure = serde_json::from_str(json).unwrap();
		assert_eq!(failure.reason, FailureReason::Flushed);
		assert_eq!(failure.frame_number, 4);
	}
}
