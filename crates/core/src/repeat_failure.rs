//! Recovery from a capture pipeline stuck producing errors.

use std::sync::Arc;

use frame_server_protocol::{CaptureFailure, FailureReason, TotalCaptureResult};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::camera::CameraCaptureSession;
use crate::listener::ResponseListener;
use crate::options::FrameServerOptions;

#[derive(Debug, Default)]
struct FailureCount {
	consecutive: u32,
	reset_done: bool,
}

/// Listener that resets the device after repeated capture errors.
///
/// Attach it to the repeating request. Once `threshold` consecutive
/// failures with [`FailureReason::Error`] arrive, it aborts all captures on
/// the device and calls the restart hook, once. A completed frame clears
/// the count and re-arms the reset.
pub struct RepeatFailureDetector {
	capture_session: Arc<dyn CameraCaptureSession>,
	restart: Box<dyn Fn() + Send + Sync>,
	threshold: u32,
	count: Mutex<FailureCount>,
}

impl RepeatFailureDetector {
	pub fn new(capture_session: Arc<dyn CameraCaptureSession>, threshold: u32, restart: impl Fn() + Send + Sync + 'static) -> Self {
		Self {
			capture_session,
			restart: Box::new(restart),
			threshold: threshold.max(1),
			count: Mutex::new(FailureCount::default()),
		}
	}

	pub fn from_options(capture_session: Arc<dyn CameraCaptureSession>, options: &FrameServerOptions, restart: impl Fn() + Send + Sync + 'static) -> Self {
		Self::new(capture_session, options.effective_repeat_failure_threshold(), restart)
	}

	pub fn consecutive_failures(&self) -> u32 {
		self.count.lock().consecutive
	}

	fn rearm(&self) {
		*self.count.lock() = FailureCount::default();
	}

	fn reset(&self) {
		warn!(target: "frame_server.repeat_failure", threshold = self.threshold, "repeated capture failures; resetting");
		if let Err(err) = self.capture_session.abort_captures() {
			warn!(target: "frame_server.repeat_failure", error = %err, "abort_captures failed during reset");
		}
		(self.restart)();
		warn!(target: "frame_server.repeat_failure", "reset finished");
	}
}

impl ResponseListener for RepeatFailureDetector {
	fn on_completed(&self, _result: &TotalCaptureResult) {
		self.rearm();
	}

	fn on_failed(&self, failure: &CaptureFailure) {
		if failure.reason != FailureReason::Error {
			return;
		}
		let should_reset = {
			let mut count = self.count.lock();
			count.consecutive = count.consecutive.saturating_add(1);
			error!(target: "frame_server.repeat_failure", consecutive = count.consecutive, frame_number = failure.frame_number, "capture failed");
			let trip = count.consecutive >= self.threshold && !count.reset_done;
			if trip {
				count.reset_done = true;
			}
			trip
		};
		if should_reset {
			self.reset();
		}
	}

	fn on_sequence_aborted(&self, _sequence_id: i32) {
		self.rearm();
	}
}
