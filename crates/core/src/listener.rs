//! Per-request response listeners.
//!
//! A [`ResponseListener`] observes the outcome of one request. Every method
//! has a no-op default, so implementations override only the events they
//! care about. Listener methods run on the device's callback executor and
//! must return quickly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use frame_server_protocol::{CaptureFailure, CaptureResult, TotalCaptureResult};

/// Callback surface for the events of a single request.
pub trait ResponseListener: Send + Sync {
	/// The sensor started exposing the frame at `timestamp` (nanoseconds).
	fn on_started(&self, _timestamp: i64) {}

	/// Some of the frame's metadata is available.
	fn on_progressed(&self, _partial_result: &CaptureResult) {}

	/// All of the frame's metadata is available.
	fn on_completed(&self, _result: &TotalCaptureResult) {}

	/// The device could not produce a result for the request.
	fn on_failed(&self, _failure: &CaptureFailure) {}

	fn on_sequence_aborted(&self, _sequence_id: i32) {}

	fn on_sequence_completed(&self, _sequence_id: i32, _frame_number: i64) {}
}

/// Identity used to de-duplicate listeners registered on one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(u64);

impl ListenerKey {
	/// Returns a key no other call in this process has returned.
	pub fn unique() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// A listener together with its identity.
///
/// Clones share the key, so registering the same handle twice on a
/// `RequestBuilder` keeps a single registration.
#[derive(Clone)]
pub struct ListenerHandle {
	key: ListenerKey,
	listener: Arc<dyn ResponseListener>,
}

impl ListenerHandle {
	pub fn new(listener: impl ResponseListener + 'static) -> Self {
		Self::with_key(ListenerKey::unique(), Arc::new(listener))
	}

	pub fn with_key(key: ListenerKey, listener: Arc<dyn ResponseListener>) -> Self {
		Self { key, listener }
	}

	pub fn key(&self) -> ListenerKey {
		self.key
	}

	pub fn listener(&self) -> &Arc<dyn ResponseListener> {
		&self.listener
	}
}

impl std::fmt::Debug for ListenerHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListenerHandle").field("key", &self.key).finish_non_exhaustive()
	}
}

/// Push-side sink for values produced by listeners.
pub trait Updatable<T>: Send + Sync {
	fn update(&self, value: T);

	/// Identity of the sink; listeners wrapping the same sink share it.
	fn key(&self) -> ListenerKey;
}

/// [`Updatable`] backed by a closure.
pub struct UpdatableFn<F> {
	key: ListenerKey,
	f: Arc<F>,
}

impl<F> UpdatableFn<F> {
	pub fn new(f: F) -> Self {
		Self {
			key: ListenerKey::unique(),
			f: Arc::new(f),
		}
	}
}

impl<F> Clone for UpdatableFn<F> {
	fn clone(&self) -> Self {
		Self {
			key: self.key,
			f: Arc::clone(&self.f),
		}
	}
}

impl<T, F> Updatable<T> for UpdatableFn<F>
where
	F: Fn(T) + Send + Sync,
{
	fn update(&self, value: T) {
		(self.f)(value)
	}

	fn key(&self) -> ListenerKey {
		self.key
	}
}

/// Forwards every event to each listener in order.
///
/// A panic in one listener is not contained here; it propagates to whoever
/// delivered the event.
pub struct ResponseListenerBroadcaster {
	listeners: Vec<Arc<dyn ResponseListener>>,
}

impl ResponseListenerBroadcaster {
	pub fn new(listeners: impl IntoIterator<Item = Arc<dyn ResponseListener>>) -> Self {
		Self {
			listeners: listeners.into_iter().collect(),
		}
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}

impl ResponseListener for ResponseListenerBroadcaster {
	fn on_started(&self, timestamp: i64) {
		for listener in &self.listeners {
			listener.on_started(timestamp);
		}
	}

	fn on_progressed(&self, partial_result: &CaptureResult) {
		for listener in &self.listeners {
			listener.on_progressed(partial_result);
		}
	}

	fn on_completed(&self, result: &TotalCaptureResult) {
		for listener in &self.listeners {
			listener.on_completed(result);
		}
	}

	fn on_failed(&self, failure: &CaptureFailure) {
		for listener in &self.listeners {
			listener.on_failed(failure);
		}
	}

	fn on_sequence_aborted(&self, sequence_id: i32) {
		for listener in &self.listeners {
			listener.on_sequence_aborted(sequence_id);
		}
	}

	fn on_sequence_completed(&self, sequence_id: i32, frame_number: i64) {
		for listener in &self.listeners {
			listener.on_sequence_completed(sequence_id, frame_number);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use frame_server_protocol::FailureReason;
	use parking_lot::Mutex;

	struct Recorder {
		name: &'static str,
		log: Arc<Mutex<Vec<String>>>,
	}

	impl ResponseListener for Recorder {
		fn on_started(&self, timestamp: i64) {
			self.log.lock().push(format!("{}:started:{timestamp}", self.name));
		}

		fn on_failed(&self, failure: &CaptureFailure) {
			self.log.lock().push(format!("{}:failed:{}", self.name, failure.frame_number));
		}
	}

	#[test]
	fn broadcaster_preserves_registration_order() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let broadcaster = ResponseListenerBroadcaster::new([
			Arc::new(Recorder { name: "a", log: Arc::clone(&log) }) as Arc<dyn ResponseListener>,
			Arc::new(Recorder { name: "b", log: Arc::clone(&log) }),
		]);

		broadcaster.on_started(10);
		broadcaster.on_failed(&CaptureFailure {
			frame_number: 2,
			sequence_id: 0,
			reason: FailureReason::Error,
			was_image_captured: false,
		});
		// Not overridden by Recorder; must be a silent no-op.
		broadcaster.on_sequence_completed(0, 2);

		assert_eq!(*log.lock(), vec!["a:started:10", "b:started:10", "a:failed:2", "b:failed:2"]);
	}

	#[test]
	fn handle_clones_share_identity() {
		let handle = ListenerHandle::new(ResponseListenerBroadcaster::new(Vec::new()));
		let other = ListenerHandle::new(ResponseListenerBroadcaster::new(Vec::new()));
		assert_eq!(handle.key(), handle.clone().key());
		assert_ne!(handle.key(), other.key());
	}

	#[test]
	fn updatable_fn_invokes_closure() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = {
			let seen = Arc::clone(&seen);
			UpdatableFn::new(move |value: i64| seen.lock().push(value))
		};
		sink.update(3);
		sink.clone().update(4);
		assert_eq!(*seen.lock(), vec![3, 4]);
	}
}
