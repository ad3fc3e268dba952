//! Advisory availability of the exclusive lock.
//!
//! [`ObservableFrameServer`] decorates another [`FrameServer`] with an
//! "exclusive session likely available" flag. The flag is informational:
//! it lags the real lock, may coalesce quick flips, and never gates access.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use frame_server_protocol::RequestType;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::Result;
use crate::frame_server::{FrameServer, Session};
use crate::request::Request;

/// [`FrameServer`] decorator publishing whether an exclusive session is open.
pub struct ObservableFrameServer {
	inner: Arc<dyn FrameServer>,
	available: Arc<watch::Sender<bool>>,
}

impl ObservableFrameServer {
	pub fn new(inner: Arc<dyn FrameServer>) -> Self {
		let (available, _) = watch::channel(true);
		Self {
			inner,
			available: Arc::new(available),
		}
	}

	/// `true` when no exclusive session created through this server is open.
	pub fn is_available(&self) -> bool {
		*self.available.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<bool> {
		self.available.subscribe()
	}

	/// Runs `callback` on `executor` with each new availability value.
	///
	/// The callback stops when the returned subscription is dropped.
	pub fn add_callback<F>(&self, callback: F, executor: &Handle) -> AvailabilitySubscription
	where
		F: Fn(bool) + Send + Sync + 'static,
	{
		let mut receiver = self.available.subscribe();
		let task = executor.spawn(async move {
			while receiver.changed().await.is_ok() {
				let available = *receiver.borrow_and_update();
				callback(available);
			}
		});
		AvailabilitySubscription { task }
	}

	fn observe(&self, session: Box<dyn Session>) -> Box<dyn Session> {
		self.available.send_replace(false);
		trace!(target: "frame_server.session", "exclusive session unavailable");
		Box::new(ObservableSession {
			inner: session,
			available: Arc::clone(&self.available),
			closed: AtomicBool::new(false),
		})
	}
}

#[async_trait]
impl FrameServer for ObservableFrameServer {
	fn create_session(&self) -> Box<dyn Session> {
		self.inner.create_session()
	}

	async fn create_exclusive_session(&self) -> Result<Box<dyn Session>> {
		let session = self.inner.create_exclusive_session().await?;
		Ok(self.observe(session))
	}

	fn try_create_exclusive_session(&self) -> Option<Box<dyn Session>> {
		self.inner.try_create_exclusive_session().map(|session| self.observe(session))
	}
}

/// Handle to a callback registered with [`ObservableFrameServer::add_callback`].
#[must_use = "the callback is removed when the subscription is dropped"]
pub struct AvailabilitySubscription {
	task: JoinHandle<()>,
}

impl Drop for AvailabilitySubscription {
	fn drop(&mut self) {
		self.task.abort();
	}
}

struct ObservableSession {
	inner: Box<dyn Session>,
	available: Arc<watch::Sender<bool>>,
	closed: AtomicBool,
}

#[async_trait]
impl Session for ObservableSession {
	async fn submit_request(&self, requests: Vec<Box<dyn Request>>, request_type: RequestType) -> Result<()> {
		self.inner.submit_request(requests, request_type).await
	}

	fn close(&self) {
		if !self.closed.swap(true, Ordering::AcqRel) {
			// Published before the lock is released so the next holder's
			// `false` is never overwritten.
			self.available.send_replace(true);
			trace!(target: "frame_server.session", "exclusive session available");
		}
		self.inner.close();
	}
}

impl Drop for ObservableSession {
	fn drop(&mut self) {
		self.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dispatch::TagDispatchCaptureSession;
	use crate::fake_device::FakeCaptureSession;
	use crate::frame_server::FrameServerImpl;

	fn observable() -> ObservableFrameServer {
		let (device, _controller) = FakeCaptureSession::new();
		let dispatch = Arc::new(TagDispatchCaptureSession::new(device, Handle::current()));
		ObservableFrameServer::new(Arc::new(FrameServerImpl::new(dispatch)))
	}

	#[tokio::test]
	async fn shared_sessions_do_not_change_availability() {
		let server = observable();
		let session = server.create_session();
		assert!(server.is_available());
		session.close();
		assert!(server.is_available());
	}

	#[tokio::test]
	async fn close_twice_publishes_once() {
		let server = observable();
		let mut receiver = server.subscribe();
		let session = server.try_create_exclusive_session().unwrap();
		assert!(receiver.has_changed().unwrap());
		let _ = receiver.borrow_and_update();

		session.close();
		assert!(receiver.has_changed().unwrap());
		let _ = receiver.borrow_and_update();

		session.close();
		drop(session);
		assert!(!receiver.has_changed().unwrap());
		assert!(server.is_available());
	}
}
