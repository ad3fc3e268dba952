//! Tag-based dispatch of capture callbacks to per-request listeners.
//!
//! The device reports every event of a batch through one shared
//! [`CaptureCallback`]. [`TagDispatchCaptureSession`] makes that callback
//! per-request:
//!
//! 1. Each request gets the next tag from a strictly increasing counter
//! 2. The tag is written into the request's descriptor after allocation
//! 3. The whole batch goes to the device in one call with one callback
//!    holding the batch's `tag -> listener` map
//! 4. Each event is routed by reading the tag back off the request
//!
//! If anything fails before the device accepts the batch, every request in
//! the batch is aborted and the error is returned.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use frame_server_protocol::{CaptureFailure, CaptureRequest, CaptureResult, RequestType, Tag, TotalCaptureResult};
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::camera::{CameraCaptureSession, CaptureCallback};
use crate::error::{Error, Result};
use crate::listener::ResponseListener;
use crate::request::{AbortOnDrop, Request};

/// Routes one batch's device events to its requests' listeners.
struct TagDispatchCallback {
	listeners: HashMap<Tag, Arc<dyn ResponseListener>>,
}

impl TagDispatchCallback {
	fn listener_for(&self, request: &CaptureRequest) -> Result<&Arc<dyn ResponseListener>> {
		let Some(tag) = request.tag() else {
			error!(target: "frame_server.dispatch", "callback for untagged request");
			return Err(Error::UntaggedRequest);
		};
		self.listeners.get(&tag).ok_or_else(|| {
			error!(target: "frame_server.dispatch", %tag, "callback for unregistered tag");
			Error::UnknownTag(tag)
		})
	}
}

impl CaptureCallback for TagDispatchCallback {
	fn on_capture_started(&self, request: &CaptureRequest, timestamp: i64, frame_number: i64) -> Result<()> {
		trace!(target: "frame_server.dispatch", tag = ?request.tag(), timestamp, frame_number, "capture started");
		self.listener_for(request)?.on_started(timestamp);
		Ok(())
	}

	fn on_capture_progressed(&self, request: &CaptureRequest, partial_result: &CaptureResult) -> Result<()> {
		self.listener_for(request)?.on_progressed(partial_result);
		Ok(())
	}

	fn on_capture_completed(&self, request: &CaptureRequest, result: &TotalCaptureResult) -> Result<()> {
		self.listener_for(request)?.on_completed(result);
		Ok(())
	}

	fn on_capture_failed(&self, request: &CaptureRequest, failure: &CaptureFailure) -> Result<()> {
		self.listener_for(request)?.on_failed(failure);
		Ok(())
	}

	// Sequence events belong to the batch, not to any one request.
	fn on_capture_sequence_aborted(&self, sequence_id: i32) {
		debug!(target: "frame_server.dispatch", sequence_id, batch_len = self.listeners.len(), "capture sequence aborted");
	}

	fn on_capture_sequence_completed(&self, sequence_id: i32, frame_number: i64) {
		debug!(target: "frame_server.dispatch", sequence_id, frame_number, batch_len = self.listeners.len(), "capture sequence completed");
	}
}

/// Wraps the device session and submits [`Request`] batches to it.
///
/// Safe to share between sessions: the tag counter is atomic and every
/// submission builds its own listener map.
pub struct TagDispatchCaptureSession {
	capture_session: Arc<dyn CameraCaptureSession>,
	executor: Handle,
	last_tag: AtomicU64,
}

impl TagDispatchCaptureSession {
	/// Creates a dispatcher whose callbacks are delivered on `executor`.
	pub fn new(capture_session: Arc<dyn CameraCaptureSession>, executor: Handle) -> Self {
		Self {
			capture_session,
			executor,
			last_tag: AtomicU64::new(0),
		}
	}

	fn next_tag(&self) -> Tag {
		Tag::new(self.last_tag.fetch_add(1, Ordering::SeqCst))
	}

	/// Allocates, tags and submits `requests` as one device call.
	///
	/// Tags already set on the descriptors are overwritten. On error, or if
	/// the returned future is dropped before completion, every request in
	/// the batch is aborted.
	pub async fn submit_request(&self, requests: &[Box<dyn Request>], request_type: RequestType) -> Result<()> {
		let guard = AbortOnDrop::new(requests);

		let mut listeners = HashMap::with_capacity(requests.len());
		let mut capture_requests = Vec::with_capacity(requests.len());
		for request in requests {
			let tag = self.next_tag();
			listeners.insert(tag, request.response_listener());

			let mut descriptor = request.allocate_capture_request().await.inspect_err(|err| {
				warn!(target: "frame_server.dispatch", %tag, error = %err, "request allocation failed");
			})?;
			descriptor.set_tag(tag);
			capture_requests.push(descriptor.build());
		}

		let callback: Arc<dyn CaptureCallback> = Arc::new(TagDispatchCallback { listeners });
		let executor = self.executor.clone();
		let sequence_id = match request_type {
			RequestType::Repeating => self.capture_session.set_repeating_burst(capture_requests, callback, executor),
			RequestType::NonRepeating => self.capture_session.capture_burst(capture_requests, callback, executor),
		}
		.inspect_err(|err| {
			warn!(target: "frame_server.dispatch", kind = ?request_type, error = %err, "device rejected batch");
		})?;

		guard.disarm();
		debug!(target: "frame_server.dispatch", kind = ?request_type, batch_len = requests.len(), sequence_id, "batch submitted");
		Ok(())
	}

	/// Discards in-flight captures on the device.
	pub fn abort_captures(&self) -> Result<()> {
		self.capture_session.abort_captures()
	}
}
