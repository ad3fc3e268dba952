//! Fake capture session for unit testing arbitration and dispatch.
//!
//! Provides an in-memory device which records every submitted batch and lets
//! the test play the hardware's role by delivering callbacks.
//!
//! # Example
//!
//! ```ignore
//! let (device, controller) = FakeCaptureSession::new();
//! let server = FrameServerImpl::new(Arc::new(TagDispatchCaptureSession::new(device, Handle::current())));
//!
//! let session = server.create_exclusive_session().await?;
//! session.submit_request(vec![builder.build()], RequestType::NonRepeating).await?;
//!
//! let tag = controller.submissions()[0].tags()[0];
//! controller.deliver_started(tag, 1_000)?;
//! ```

use std::sync::Arc;

use frame_server_protocol::{CaptureFailure, CaptureRequest, CaptureResult, FailureReason, RequestType, Tag, TotalCaptureResult};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::camera::{CameraCaptureSession, CaptureCallback};
use crate::error::{Error, Result};

/// A batch as the device received it.
#[derive(Clone)]
pub struct RecordedSubmission {
	pub request_type: RequestType,
	pub sequence_id: i32,
	pub requests: Vec<CaptureRequest>,
	pub callback: Arc<dyn CaptureCallback>,
	pub executor: Handle,
}

impl RecordedSubmission {
	pub fn tags(&self) -> Vec<Tag> {
		self.requests.iter().filter_map(CaptureRequest::tag).collect()
	}
}

impl std::fmt::Debug for RecordedSubmission {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RecordedSubmission")
			.field("request_type", &self.request_type)
			.field("sequence_id", &self.sequence_id)
			.field("tags", &self.tags())
			.finish_non_exhaustive()
	}
}

#[derive(Default)]
struct DeviceState {
	submissions: Vec<RecordedSubmission>,
	reject_next: Option<Error>,
	next_sequence_id: i32,
	next_frame_number: i64,
	abort_captures_calls: usize,
}

/// In-memory [`CameraCaptureSession`].
pub struct FakeCaptureSession {
	state: Arc<Mutex<DeviceState>>,
}

impl FakeCaptureSession {
	/// Creates the device and the controller used to drive it.
	pub fn new() -> (Arc<Self>, FakeCaptureController) {
		let state = Arc::new(Mutex::new(DeviceState::default()));
		let device = Arc::new(Self { state: Arc::clone(&state) });
		(device, FakeCaptureController { state })
	}

	fn submit(&self, request_type: RequestType, requests: Vec<CaptureRequest>, callback: Arc<dyn CaptureCallback>, executor: Handle) -> Result<i32> {
		let mut state = self.state.lock();
		if let Some(err) = state.reject_next.take() {
			return Err(err);
		}
		let sequence_id = state.next_sequence_id;
		state.next_sequence_id += 1;
		state.submissions.push(RecordedSubmission {
			request_type,
			sequence_id,
			requests,
			callback,
			executor,
		});
		Ok(sequence_id)
	}
}

impl CameraCaptureSession for FakeCaptureSession {
	fn capture_burst(&self, requests: Vec<CaptureRequest>, callback: Arc<dyn CaptureCallback>, executor: Handle) -> Result<i32> {
		self.submit(RequestType::NonRepeating, requests, callback, executor)
	}

	fn set_repeating_burst(&self, requests: Vec<CaptureRequest>, callback: Arc<dyn CaptureCallback>, executor: Handle) -> Result<i32> {
		self.submit(RequestType::Repeating, requests, callback, executor)
	}

	fn abort_captures(&self) -> Result<()> {
		self.state.lock().abort_captures_calls += 1;
		Ok(())
	}
}

/// Drives a [`FakeCaptureSession`] from a test.
///
/// `deliver_*` methods invoke the batch callback inline on the calling
/// thread and return whatever the callback returned.
#[derive(Clone)]
pub struct FakeCaptureController {
	state: Arc<Mutex<DeviceState>>,
}

impl FakeCaptureController {
	/// Makes the next `capture_burst`/`set_repeating_burst` fail with `err`.
	pub fn reject_next_submission(&self, err: Error) {
		self.state.lock().reject_next = Some(err);
	}

	pub fn submissions(&self) -> Vec<RecordedSubmission> {
		self.state.lock().submissions.clone()
	}

	/// Takes all recorded submissions, clearing the log.
	pub fn take_submissions(&self) -> Vec<RecordedSubmission> {
		std::mem::take(&mut self.state.lock().submissions)
	}

	pub fn abort_captures_calls(&self) -> usize {
		self.state.lock().abort_captures_calls
	}

	/// Finds the most recent submission carrying `tag`.
	fn find(&self, tag: Tag) -> Result<(Arc<dyn CaptureCallback>, CaptureRequest)> {
		let state = self.state.lock();
		state
			.submissions
			.iter()
			.rev()
			.find_map(|submission| {
				submission
					.requests
					.iter()
					.find(|request| request.tag() == Some(tag))
					.map(|request| (Arc::clone(&submission.callback), request.clone()))
			})
			.ok_or(Error::UnknownTag(tag))
	}

	fn next_frame_number(&self) -> i64 {
		let mut state = self.state.lock();
		let frame_number = state.next_frame_number;
		state.next_frame_number += 1;
		frame_number
	}

	pub fn deliver_started(&self, tag: Tag, timestamp: i64) -> Result<()> {
		let (callback, request) = self.find(tag)?;
		let frame_number = self.next_frame_number();
		callback.on_capture_started(&request, timestamp, frame_number)
	}

	pub fn deliver_progressed(&self, tag: Tag, partial_result: &CaptureResult) -> Result<()> {
		let (callback, request) = self.find(tag)?;
		callback.on_capture_progressed(&request, partial_result)
	}

	pub fn deliver_completed(&self, tag: Tag, result: &TotalCaptureResult) -> Result<()> {
		let (callback, request) = self.find(tag)?;
		callback.on_capture_completed(&request, result)
	}

	pub fn deliver_failed(&self, tag: Tag, reason: FailureReason) -> Result<()> {
		let (callback, request) = self.find(tag)?;
		let frame_number = self.next_frame_number();
		callback.on_capture_failed(
			&request,
			&CaptureFailure {
				frame_number,
				sequence_id: 0,
				reason,
				was_image_captured: false,
			},
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct NoopCallback;

	impl CaptureCallback for NoopCallback {
		fn on_capture_started(&self, _: &CaptureRequest, _: i64, _: i64) -> Result<()> {
			Ok(())
		}
		fn on_capture_progressed(&self, _: &CaptureRequest, _: &CaptureResult) -> Result<()> {
			Ok(())
		}
		fn on_capture_completed(&self, _: &CaptureRequest, _: &TotalCaptureResult) -> Result<()> {
			Ok(())
		}
		fn on_capture_failed(&self, _: &CaptureRequest, _: &CaptureFailure) -> Result<()> {
			Ok(())
		}
	}

	fn tagged(tag: u64) -> CaptureRequest {
		let mut builder = frame_server_protocol::CaptureRequestBuilder::default();
		builder.set_tag(Tag::new(tag));
		builder.build()
	}

	#[tokio::test]
	async fn records_batches_with_sequence_ids() {
		let (device, controller) = FakeCaptureSession::new();
		let callback: Arc<dyn CaptureCallback> = Arc::new(NoopCallback);

		let first = device.capture_burst(vec![tagged(0), tagged(1)], Arc::clone(&callback), Handle::current()).unwrap();
		let second = device.set_repeating_burst(vec![tagged(2)], callback, Handle::current()).unwrap();

		let submissions = controller.take_submissions();
		assert_eq!((first, second), (0, 1));
		assert_eq!(submissions[0].tags(), vec![Tag::new(0), Tag::new(1)]);
		assert_eq!(submissions[1].request_type, RequestType::Repeating);
		assert!(controller.submissions().is_empty());
	}

	#[tokio::test]
	async fn rejection_applies_once() {
		let (device, controller) = FakeCaptureSession::new();
		let callback: Arc<dyn CaptureCallback> = Arc::new(NoopCallback);
		controller.reject_next_submission(Error::CameraAccess("disconnected".into()));

		assert!(device.capture_burst(vec![tagged(0)], Arc::clone(&callback), Handle::current()).is_err());
		assert!(device.capture_burst(vec![tagged(1)], callback, Handle::current()).is_ok());
		assert_eq!(controller.submissions().len(), 1);
	}

	#[test]
	fn delivering_to_an_unknown_tag_fails() {
		let (_device, controller) = FakeCaptureSession::new();
		assert!(matches!(controller.deliver_started(Tag::new(9), 0), Err(Error::UnknownTag(_))));
	}
}
