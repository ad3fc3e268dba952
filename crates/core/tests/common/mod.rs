// Shared fixtures for frame-server integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use frame_server::fake_device::{FakeCaptureController, FakeCaptureSession};
use frame_server::protocol::{CaptureFailure, CaptureRequestBuilder, CaptureResult, RequestTemplate, TotalCaptureResult, keys};
use frame_server::{Error, FrameServerImpl, Request, ResponseListener, Result, TagDispatchCaptureSession};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("frame_server=trace").try_init();
}

/// A frame server over a fresh fake device.
pub fn server() -> (Arc<FrameServerImpl>, FakeCaptureController) {
	init_tracing();
	let (device, controller) = FakeCaptureSession::new();
	let dispatch = Arc::new(TagDispatchCaptureSession::new(device, Handle::current()));
	(Arc::new(FrameServerImpl::new(dispatch)), controller)
}

/// Listener recording every event it receives as a string.
#[derive(Default)]
pub struct RecordingListener {
	pub events: Mutex<Vec<String>>,
}

impl RecordingListener {
	pub fn events(&self) -> Vec<String> {
		self.events.lock().clone()
	}
}

impl ResponseListener for RecordingListener {
	fn on_started(&self, timestamp: i64) {
		self.events.lock().push(format!("started:{timestamp}"));
	}

	fn on_progressed(&self, partial_result: &CaptureResult) {
		self.events.lock().push(format!("progressed:{}", partial_result.frame_number()));
	}

	fn on_completed(&self, result: &TotalCaptureResult) {
		self.events.lock().push(format!("completed:{}", result.frame_number()));
	}

	fn on_failed(&self, failure: &CaptureFailure) {
		self.events.lock().push(format!("failed:{}", failure.frame_number));
	}

	fn on_sequence_completed(&self, sequence_id: i32, _frame_number: i64) {
		self.events.lock().push(format!("sequence_completed:{sequence_id}"));
	}
}

#[derive(Clone, Debug)]
pub enum Allocation {
	Ready,
	Fail,
	/// Never completes; the submission can only end by cancellation.
	Pending,
	/// Completes once the gate is notified.
	Gated(Arc<Notify>),
}

/// Observation side of a [`TrackerRequest`].
#[derive(Clone, Default)]
pub struct Tracker {
	pub listener: Arc<RecordingListener>,
	aborts: Arc<AtomicUsize>,
	allocations: Arc<AtomicUsize>,
}

impl Tracker {
	pub fn aborts(&self) -> usize {
		self.aborts.load(Ordering::SeqCst)
	}

	pub fn allocations(&self) -> usize {
		self.allocations.load(Ordering::SeqCst)
	}
}

/// Request whose allocation outcome is scripted and whose aborts are counted.
pub struct TrackerRequest {
	owner: u8,
	allocation: Allocation,
	tracker: Tracker,
}

#[async_trait]
impl Request for TrackerRequest {
	async fn allocate_capture_request(&self) -> Result<CaptureRequestBuilder> {
		self.tracker.allocations.fetch_add(1, Ordering::SeqCst);
		match &self.allocation {
			Allocation::Ready => {}
			Allocation::Fail => return Err(Error::ResourceAcquisitionFailed("no free buffer".into())),
			Allocation::Pending => std::future::pending::<()>().await,
			Allocation::Gated(gate) => gate.notified().await,
		}
		let mut builder = CaptureRequestBuilder::new(RequestTemplate::Preview);
		builder.set(keys::JPEG_QUALITY, self.owner)?;
		Ok(builder)
	}

	fn response_listener(&self) -> Arc<dyn ResponseListener> {
		self.tracker.listener.clone()
	}

	fn abort(&self) {
		self.tracker.aborts.fetch_add(1, Ordering::SeqCst);
	}
}

/// Builds a request tagged with `owner` in its `JPEG_QUALITY` parameter.
pub fn tracker(owner: u8, allocation: Allocation) -> (Box<dyn Request>, Tracker) {
	let tracker = Tracker::default();
	let request = TrackerRequest {
		owner,
		allocation,
		tracker: tracker.clone(),
	};
	(Box::new(request), tracker)
}

/// A batch of `len` ready requests from `owner`.
pub fn batch(owner: u8, len: usize) -> (Vec<Box<dyn Request>>, Vec<Tracker>) {
	(0..len).map(|_| tracker(owner, Allocation::Ready)).unzip()
}
