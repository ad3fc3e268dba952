//! Seam to the low-level capture session.
//!
//! [`CameraCaptureSession`] is the single hardware pipe the frame server
//! arbitrates. It accepts a whole batch per call together with one
//! [`CaptureCallback`] and the executor on which to deliver that callback's
//! events. Implementations live outside this crate; tests use
//! [`FakeCaptureSession`](crate::fake_device::FakeCaptureSession).

use std::sync::Arc;

use frame_server_protocol::{CaptureFailure, CaptureRequest, CaptureResult, TotalCaptureResult};
use tokio::runtime::Handle;

use crate::error::Result;

/// Events for the requests of one submitted batch.
///
/// The per-request methods return an error when the callback cannot route
/// the event; a device should treat that as a bug and report it loudly.
pub trait CaptureCallback: Send + Sync {
	fn on_capture_started(&self, request: &CaptureRequest, timestamp: i64, frame_number: i64) -> Result<()>;

	fn on_capture_progressed(&self, request: &CaptureRequest, partial_result: &CaptureResult) -> Result<()>;

	fn on_capture_completed(&self, request: &CaptureRequest, result: &TotalCaptureResult) -> Result<()>;

	fn on_capture_failed(&self, request: &CaptureRequest, failure: &CaptureFailure) -> Result<()>;

	fn on_capture_sequence_aborted(&self, _sequence_id: i32) {}

	fn on_capture_sequence_completed(&self, _sequence_id: i32, _frame_number: i64) {}
}

/// The shared hardware capture session.
///
/// Each call submits the batch atomically and returns the device's sequence
/// id for it.
pub trait CameraCaptureSession: Send + Sync {
	/// Captures every request in `requests` once.
	fn capture_burst(&self, requests: Vec<CaptureRequest>, callback: Arc<dyn CaptureCallback>, executor: Handle) -> Result<i32>;

	/// Replaces the repeating burst with `requests`.
	fn set_repeating_burst(&self, requests: Vec<CaptureRequest>, callback: Arc<dyn CaptureCallback>, executor: Handle) -> Result<i32>;

	/// Discards in-flight and pending captures, including the repeating burst.
	fn abort_captures(&self) -> Result<()>;
}
