//! Arbitration of the shared capture session.
//!
//! Many independent clients (preview, bursts, metering probes) share one
//! hardware pipe. A [`FrameServer`] hands out [`Session`]s of two kinds:
//!
//! - **Exclusive** sessions hold the arbitration lock for their whole
//!   lifetime, so no other session's batches interleave with theirs.
//! - **Shared** sessions take the lock for the duration of each
//!   `submit_request` call only.
//!
//! The lock is a FIFO-fair `tokio::sync::Mutex`, so a stream of shared
//! submissions cannot starve a waiting exclusive acquisition. Waiting for
//! the lock is cancelled by dropping the future; the lock is then untouched.
//!
//! Every batch handed to a session is either accepted by the device or has
//! [`Request::abort`] called once on each of its requests, including when
//! the session is already closed or the wait for the lock is cancelled.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use async_trait::async_trait;
use frame_server_protocol::RequestType;
use parking_lot::Mutex;
use tokio::sync::{Mutex as FairLock, OwnedMutexGuard};
use tokio::task;
use tracing::{debug, error, trace};

use crate::dispatch::TagDispatchCaptureSession;
use crate::error::{Error, Result};
use crate::request::{AbortOnDrop, Request};

/// A claim on the shared capture session.
#[async_trait]
pub trait Session: Send + Sync {
	/// Submits `requests` as one batch.
	///
	/// Fails with [`Error::SessionClosed`] after [`close`](Self::close). On
	/// any failure, and on cancellation, every request is aborted.
	async fn submit_request(&self, requests: Vec<Box<dyn Request>>, request_type: RequestType) -> Result<()>;

	/// Closes the session. Idempotent; an exclusive session releases its
	/// lock on the first call, once submissions already in flight have
	/// finished. Dropping a session closes it.
	fn close(&self);
}

/// Hands out sessions on one shared capture session.
#[async_trait]
pub trait FrameServer: Send + Sync {
	/// A session which serializes each submission without holding the lock
	/// between calls.
	fn create_session(&self) -> Box<dyn Session>;

	/// Waits until the lock is granted and returns a session holding it.
	///
	/// Fails with [`Error::ReentrantExclusiveSession`] if the calling
	/// context already holds the lock.
	async fn create_exclusive_session(&self) -> Result<Box<dyn Session>>;

	/// Like [`create_exclusive_session`](Self::create_exclusive_session), but
	/// returns `None` instead of waiting when the lock is held.
	fn try_create_exclusive_session(&self) -> Option<Box<dyn Session>>;
}

/// Identity of the execution context holding the exclusive lock.
///
/// Inside a spawned tokio task this is the task id, which stays fixed
/// across await points; elsewhere it is the OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextId {
	Task(task::Id),
	Thread(ThreadId),
}

impl ContextId {
	pub fn current() -> Self {
		match task::try_id() {
			Some(id) => Self::Task(id),
			None => Self::Thread(std::thread::current().id()),
		}
	}
}

struct Holder {
	context: ContextId,
	lease: Weak<ExclusiveLease>,
}

struct Arbiter {
	lock: Arc<FairLock<()>>,
	holder: Mutex<Option<Holder>>,
}

impl Arbiter {
	fn owner(&self) -> Option<ContextId> {
		self.holder.lock().as_ref().map(|holder| holder.context)
	}

	fn held_by(&self, context: ContextId) -> bool {
		self.owner() == Some(context)
	}

	/// The live lease, if `context` holds the lock.
	fn lease_held_by(&self, context: ContextId) -> Option<Arc<ExclusiveLease>> {
		self.holder.lock().as_ref().filter(|holder| holder.context == context).and_then(|holder| holder.lease.upgrade())
	}
}

/// The exclusive hold on the lock. Releases it when the last clone drops.
///
/// The session keeps one clone; each in-flight submission made under the
/// lock keeps another, so closing the session never releases the lock
/// under a batch that is still on its way to the device.
struct ExclusiveLease {
	arbiter: Arc<Arbiter>,
	guard: Option<OwnedMutexGuard<()>>,
}

impl ExclusiveLease {
	fn acquire(arbiter: Arc<Arbiter>, guard: OwnedMutexGuard<()>, context: ContextId) -> Arc<Self> {
		let lease = Arc::new(Self {
			arbiter: Arc::clone(&arbiter),
			guard: Some(guard),
		});
		*arbiter.holder.lock() = Some(Holder {
			context,
			lease: Arc::downgrade(&lease),
		});
		debug!(target: "frame_server.session", ?context, "exclusive lock acquired");
		lease
	}
}

impl Drop for ExclusiveLease {
	fn drop(&mut self) {
		// Clear ownership before the next waiter can be granted the lock.
		*self.arbiter.holder.lock() = None;
		self.guard.take();
		debug!(target: "frame_server.session", "exclusive lock released");
	}
}

struct ExclusiveSession {
	capture_session: Arc<TagDispatchCaptureSession>,
	lease: Mutex<Option<Arc<ExclusiveLease>>>,
}

#[async_trait]
impl Session for ExclusiveSession {
	async fn submit_request(&self, requests: Vec<Box<dyn Request>>, request_type: RequestType) -> Result<()> {
		let guard = AbortOnDrop::new(&requests);
		let lease = self.lease.lock().clone();
		let Some(_lease) = lease else {
			return Err(Error::SessionClosed);
		};
		// From here the dispatcher aborts the batch on failure.
		guard.disarm();
		self.capture_session.submit_request(&requests, request_type).await
	}

	fn close(&self) {
		let lease = self.lease.lock().take();
		if let Some(lease) = lease {
			trace!(target: "frame_server.session", in_flight = Arc::strong_count(&lease) - 1, "closing exclusive session");
		}
	}
}

impl Drop for ExclusiveSession {
	fn drop(&mut self) {
		self.close();
	}
}

struct SharedSession {
	capture_session: Arc<TagDispatchCaptureSession>,
	arbiter: Arc<Arbiter>,
	closed: AtomicBool,
}

#[async_trait]
impl Session for SharedSession {
	async fn submit_request(&self, requests: Vec<Box<dyn Request>>, request_type: RequestType) -> Result<()> {
		let guard = AbortOnDrop::new(&requests);
		if self.closed.load(Ordering::Acquire) {
			return Err(Error::SessionClosed);
		}

		// The context holding the exclusive lock submits under its lease;
		// taking the lock again would deadlock it.
		let lease = self.arbiter.lease_held_by(ContextId::current());
		let _held = if lease.is_some() {
			None
		} else {
			trace!(target: "frame_server.session", "waiting for lock for shared submission");
			Some(self.arbiter.lock.lock().await)
		};

		guard.disarm();
		self.capture_session.submit_request(&requests, request_type).await
	}

	fn close(&self) {
		self.closed.store(true, Ordering::Release);
	}
}

/// [`FrameServer`] over one [`TagDispatchCaptureSession`].
pub struct FrameServerImpl {
	capture_session: Arc<TagDispatchCaptureSession>,
	arbiter: Arc<Arbiter>,
}

impl FrameServerImpl {
	pub fn new(capture_session: Arc<TagDispatchCaptureSession>) -> Self {
		Self {
			capture_session,
			arbiter: Arc::new(Arbiter {
				lock: Arc::new(FairLock::new(())),
				holder: Mutex::new(None),
			}),
		}
	}

	/// Context currently holding an exclusive session, if any.
	pub fn exclusive_owner(&self) -> Option<ContextId> {
		self.arbiter.owner()
	}

	fn exclusive(&self, guard: OwnedMutexGuard<()>, context: ContextId) -> Box<dyn Session> {
		Box::new(ExclusiveSession {
			capture_session: Arc::clone(&self.capture_session),
			lease: Mutex::new(Some(ExclusiveLease::acquire(Arc::clone(&self.arbiter), guard, context))),
		})
	}
}

#[async_trait]
impl FrameServer for FrameServerImpl {
	fn create_session(&self) -> Box<dyn Session> {
		Box::new(SharedSession {
			capture_session: Arc::clone(&self.capture_session),
			arbiter: Arc::clone(&self.arbiter),
			closed: AtomicBool::new(false),
		})
	}

	async fn create_exclusive_session(&self) -> Result<Box<dyn Session>> {
		let context = ContextId::current();
		if self.arbiter.held_by(context) {
			error!(target: "frame_server.session", ?context, "exclusive session requested while already held by this context");
			return Err(Error::ReentrantExclusiveSession);
		}

		trace!(target: "frame_server.session", ?context, "waiting for exclusive lock");
		let guard = Arc::clone(&self.arbiter.lock).lock_owned().await;
		Ok(self.exclusive(guard, context))
	}

	fn try_create_exclusive_session(&self) -> Option<Box<dyn Session>> {
		let guard = Arc::clone(&self.arbiter.lock).try_lock_owned().ok()?;
		Some(self.exclusive(guard, ContextId::current()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fake_device::FakeCaptureSession;
	use tokio::runtime::Handle;

	fn server() -> FrameServerImpl {
		let (device, _controller) = FakeCaptureSession::new();
		FrameServerImpl::new(Arc::new(TagDispatchCaptureSession::new(device, Handle::current())))
	}

	#[tokio::test]
	async fn owner_is_recorded_and_cleared() {
		let server = server();
		assert_eq!(server.exclusive_owner(), None);

		let session = server.create_exclusive_session().await.unwrap();
		assert_eq!(server.exclusive_owner(), Some(ContextId::current()));

		session.close();
		assert_eq!(server.exclusive_owner(), None);
	}

	#[tokio::test]
	async fn dropping_an_exclusive_session_releases_the_lock() {
		let server = server();
		let session = server.try_create_exclusive_session().unwrap();
		assert!(server.try_create_exclusive_session().is_none());

		drop(session);
		assert!(server.try_create_exclusive_session().is_some());
	}

	#[tokio::test]
	async fn spawned_tasks_are_distinct_contexts() {
		let here = ContextId::current();
		let there = tokio::spawn(async { ContextId::current() }).await.unwrap();
		assert_ne!(here, there);
		assert!(matches!(there, ContextId::Task(_)));
	}
}
