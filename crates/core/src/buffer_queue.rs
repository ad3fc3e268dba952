//! Closeable, unbounded, multi-producer queue.
//!
//! [`BufferQueue`] turns push-style updates (listener callbacks running on
//! the device executor) into pull-style reads for a consumer task. Closing
//! the queue wakes every waiting consumer; elements that were pushed but
//! never read are handed to the queue's unused-element processor so that
//! resources they carry can be released.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::listener::{ListenerKey, Updatable};

type UnusedElementProcessor<T> = Box<dyn Fn(T) + Send + Sync>;

struct State<T> {
	elements: VecDeque<T>,
	closed: bool,
}

struct Inner<T> {
	key: ListenerKey,
	state: Mutex<State<T>>,
	notify: Notify,
	unused: Option<UnusedElementProcessor<T>>,
}

/// Cloneable handle to a shared queue; all clones see the same elements.
pub struct BufferQueue<T> {
	inner: Arc<Inner<T>>,
}

impl<T> Clone for BufferQueue<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Send + 'static> Default for BufferQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Send + 'static> BufferQueue<T> {
	pub fn new() -> Self {
		Self::build(None)
	}

	/// Creates a queue which passes discarded and never-read elements to `processor`.
	pub fn with_unused_processor(processor: impl Fn(T) + Send + Sync + 'static) -> Self {
		Self::build(Some(Box::new(processor)))
	}

	fn build(unused: Option<UnusedElementProcessor<T>>) -> Self {
		Self {
			inner: Arc::new(Inner {
				key: ListenerKey::unique(),
				state: Mutex::new(State {
					elements: VecDeque::new(),
					closed: false,
				}),
				notify: Notify::new(),
				unused,
			}),
		}
	}

	/// Appends `element`, or hands it to the unused processor if the queue is closed.
	pub fn push(&self, element: T) {
		let rejected = {
			let mut state = self.inner.state.lock();
			if state.closed {
				Some(element)
			} else {
				state.elements.push_back(element);
				None
			}
		};
		match rejected {
			Some(element) => self.process_unused(element),
			None => self.inner.notify.notify_one(),
		}
	}

	/// Waits for the next element.
	///
	/// Fails with [`Error::BufferQueueClosed`] once the queue is closed;
	/// elements still queued at close time are not returned.
	pub async fn next(&self) -> Result<T> {
		loop {
			let notified = self.inner.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			{
				let mut state = self.inner.state.lock();
				if state.closed {
					return Err(Error::BufferQueueClosed);
				}
				if let Some(element) = state.elements.pop_front() {
					return Ok(element);
				}
			}

			notified.await;
		}
	}

	pub async fn next_timeout(&self, timeout: Duration) -> Result<T> {
		tokio::time::timeout(timeout, self.next()).await.map_err(|_| Error::Timeout(timeout))?
	}

	/// Removes the next element without waiting, if there is one.
	pub fn try_next(&self) -> Option<T> {
		let mut state = self.inner.state.lock();
		if state.closed { None } else { state.elements.pop_front() }
	}

	/// Drops the next element (through the unused processor), if any.
	pub fn discard_next(&self) {
		let discarded = self.inner.state.lock().elements.pop_front();
		if let Some(element) = discarded {
			self.process_unused(element);
		}
	}

	/// Closes the queue. Idempotent.
	pub fn close(&self) {
		let remaining = {
			let mut state = self.inner.state.lock();
			if state.closed {
				return;
			}
			state.closed = true;
			std::mem::take(&mut state.elements)
		};
		self.inner.notify.notify_waiters();
		for element in remaining {
			self.process_unused(element);
		}
	}

	pub fn is_closed(&self) -> bool {
		self.inner.state.lock().closed
	}

	pub fn len(&self) -> usize {
		self.inner.state.lock().elements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn process_unused(&self, element: T) {
		if let Some(processor) = &self.inner.unused {
			processor(element);
		}
	}
}

impl<T: Clone + Send + 'static> BufferQueue<T> {
	/// Returns a copy of the next element without removing it.
	pub fn peek_next(&self) -> Option<T> {
		let state = self.inner.state.lock();
		if state.closed { None } else { state.elements.front().cloned() }
	}
}

impl<T: Send + 'static> Updatable<T> for BufferQueue<T> {
	fn update(&self, value: T) {
		self.push(value);
	}

	fn key(&self) -> ListenerKey {
		self.inner.key
	}
}

impl<T> std::fmt::Debug for BufferQueue<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("BufferQueue")
			.field("key", &self.inner.key)
			.field("len", &state.elements.len())
			.field("closed", &state.closed)
			.finish()
	}
}
