//! Adapters from response events to [`Updatable`] sinks.
//!
//! Each adapter forwards one slice of a request's event stream (timestamps,
//! final metadata, a single metadata key) into a sink, typically a
//! [`BufferQueue`](crate::BufferQueue) read by one consumer task. Adapters
//! built by [`ResponseListeners`] take their identity from the sink, so two
//! adapters over the same queue are registered once per request.

use std::sync::Arc;

use frame_server_protocol::{CaptureResult, Key, TotalCaptureResult};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::listener::{ListenerHandle, ResponseListener, ResponseListenerBroadcaster, Updatable};

/// Forwards the start-of-exposure timestamp of every frame, in order.
pub struct TimestampResponseListener<U> {
	sink: U,
}

impl<U: Updatable<i64>> TimestampResponseListener<U> {
	pub fn new(sink: U) -> Self {
		Self { sink }
	}
}

impl<U: Updatable<i64>> ResponseListener for TimestampResponseListener<U> {
	fn on_started(&self, timestamp: i64) {
		self.sink.update(timestamp);
	}
}

/// Forwards the final metadata of every frame, in order.
pub struct TotalCaptureResultResponseListener<U> {
	sink: U,
}

impl<U: Updatable<TotalCaptureResult>> TotalCaptureResultResponseListener<U> {
	pub fn new(sink: U) -> Self {
		Self { sink }
	}
}

impl<U: Updatable<TotalCaptureResult>> ResponseListener for TotalCaptureResultResponseListener<U> {
	fn on_completed(&self, result: &TotalCaptureResult) {
		self.sink.update(result.clone());
	}
}

/// Forwards the value of one metadata key whenever it changes.
///
/// Both partial and final results are inspected. Results that do not carry
/// the key are ignored; a value equal to the last forwarded one is skipped.
pub struct MetadataChangeResponseListener<T, U> {
	key: Key<T>,
	sink: U,
	last: Mutex<Option<T>>,
}

impl<T, U> MetadataChangeResponseListener<T, U>
where
	T: DeserializeOwned + PartialEq + Clone + Send + Sync,
	U: Updatable<T>,
{
	pub fn new(key: Key<T>, sink: U) -> Self {
		Self {
			key,
			sink,
			last: Mutex::new(None),
		}
	}

	fn observe(&self, result: &CaptureResult) {
		let Some(value) = result.get(self.key) else {
			return;
		};
		{
			let mut last = self.last.lock();
			if last.as_ref() == Some(&value) {
				return;
			}
			*last = Some(value.clone());
		}
		self.sink.update(value);
	}
}

impl<T, U> ResponseListener for MetadataChangeResponseListener<T, U>
where
	T: DeserializeOwned + PartialEq + Clone + Send + Sync,
	U: Updatable<T>,
{
	fn on_progressed(&self, partial_result: &CaptureResult) {
		self.observe(partial_result);
	}

	fn on_completed(&self, result: &TotalCaptureResult) {
		self.observe(result.result());
	}
}

struct PartialMetadataListener<U> {
	sink: U,
}

impl<U: Updatable<CaptureResult>> ResponseListener for PartialMetadataListener<U> {
	fn on_progressed(&self, partial_result: &CaptureResult) {
		self.sink.update(partial_result.clone());
	}

	fn on_completed(&self, result: &TotalCaptureResult) {
		self.sink.update(result.result().clone());
	}
}

struct FrameExposureListener<U> {
	sink: U,
}

impl<U: Updatable<()>> ResponseListener for FrameExposureListener<U> {
	fn on_started(&self, _timestamp: i64) {
		self.sink.update(());
	}
}

/// Factories for common listeners.
pub struct ResponseListeners;

impl ResponseListeners {
	/// Final metadata for each frame, delivered in order.
	pub fn for_final_metadata<U: Updatable<TotalCaptureResult> + 'static>(sink: U) -> ListenerHandle {
		let key = sink.key();
		ListenerHandle::with_key(key, Arc::new(TotalCaptureResultResponseListener::new(sink)))
	}

	/// Partial and final metadata for each frame; may arrive out of order.
	pub fn for_partial_metadata<U: Updatable<CaptureResult> + 'static>(sink: U) -> ListenerHandle {
		let key = sink.key();
		ListenerHandle::with_key(key, Arc::new(PartialMetadataListener { sink }))
	}

	/// Start-of-exposure timestamp for each frame, delivered in order.
	pub fn for_timestamps<U: Updatable<i64> + 'static>(sink: U) -> ListenerHandle {
		let key = sink.key();
		ListenerHandle::with_key(key, Arc::new(TimestampResponseListener::new(sink)))
	}

	/// Signals as soon as each frame is exposed.
	pub fn for_frame_exposure<U: Updatable<()> + 'static>(sink: U) -> ListenerHandle {
		let key = sink.key();
		ListenerHandle::with_key(key, Arc::new(FrameExposureListener { sink }))
	}

	/// Changes of a single metadata key.
	pub fn for_metadata_changes<T, U>(key: Key<T>, sink: U) -> ListenerHandle
	where
		T: DeserializeOwned + PartialEq + Clone + Send + Sync + 'static,
		U: Updatable<T> + 'static,
	{
		let listener_key = sink.key();
		ListenerHandle::with_key(listener_key, Arc::new(MetadataChangeResponseListener::new(key, sink)))
	}

	/// Combines several listeners into one, preserving order.
	pub fn for_listeners(listeners: impl IntoIterator<Item = ListenerHandle>) -> ListenerHandle {
		ListenerHandle::new(ResponseListenerBroadcaster::new(listeners.into_iter().map(|handle| Arc::clone(handle.listener()))))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer_queue::BufferQueue;
	use frame_server_protocol::keys;

	fn af_state(frame: i64, state: i32) -> CaptureResult {
		CaptureResult::new(frame, 0).with(keys::CONTROL_AF_STATE, state).unwrap()
	}

	#[tokio::test]
	async fn timestamps_reach_the_queue() {
		let queue = BufferQueue::new();
		let handle = ResponseListeners::for_timestamps(queue.clone());

		handle.listener().on_started(100);
		handle.listener().on_started(200);

		assert_eq!(queue.next().await.unwrap(), 100);
		assert_eq!(queue.next().await.unwrap(), 200);
	}

	#[test]
	fn adapters_share_the_sink_identity() {
		let queue: BufferQueue<i64> = BufferQueue::new();
		let a = ResponseListeners::for_timestamps(queue.clone());
		let b = ResponseListeners::for_timestamps(queue.clone());
		assert_eq!(a.key(), b.key());
	}

	#[test]
	fn metadata_changes_skip_repeats_and_missing_keys() {
		let queue = BufferQueue::new();
		let listener = MetadataChangeResponseListener::new(keys::CONTROL_AF_STATE, queue.clone());

		listener.on_progressed(&af_state(1, keys::af_state::ACTIVE_SCAN));
		listener.on_progressed(&af_state(1, keys::af_state::ACTIVE_SCAN));
		listener.on_progressed(&CaptureResult::new(2, 0));
		listener.on_completed(&TotalCaptureResult::new(af_state(2, keys::af_state::FOCUSED_LOCKED)));

		assert_eq!(queue.try_next(), Some(keys::af_state::ACTIVE_SCAN));
		assert_eq!(queue.try_next(), Some(keys::af_state::FOCUSED_LOCKED));
		assert_eq!(queue.try_next(), None);
	}

	#[test]
	fn partial_metadata_includes_the_final_result() {
		let queue = BufferQueue::new();
		let handle = ResponseListeners::for_partial_metadata(queue.clone());

		handle.listener().on_progressed(&CaptureResult::new(1, 0));
		handle.listener().on_completed(&TotalCaptureResult::new(CaptureResult::new(1, 0)));
		handle.listener().on_started(5);

		assert_eq!(queue.len(), 2);
	}

	#[test]
	fn final_metadata_ignores_partials() {
		let queue = BufferQueue::new();
		let handle = ResponseListeners::for_final_metadata(queue.clone());

		handle.listener().on_progressed(&CaptureResult::new(1, 0));
		handle.listener().on_completed(&TotalCaptureResult::new(CaptureResult::new(1, 0)));

		assert_eq!(queue.try_next().map(|r| r.frame_number()), Some(1));
		assert!(queue.is_empty());
	}

	#[test]
	fn combined_listeners_fan_out() {
		let exposures = BufferQueue::new();
		let timestamps = BufferQueue::new();
		let combined = ResponseListeners::for_listeners([
			ResponseListeners::for_frame_exposure(exposures.clone()),
			ResponseListeners::for_timestamps(timestamps.clone()),
		]);

		combined.listener().on_started(77);

		assert_eq!(exposures.len(), 1);
		assert_eq!(timestamps.try_next(), Some(77));
	}
}
