//! Requests and the builder that assembles them.
//!
//! A [`Request`] is a unit of work with a deferred allocation step. Output
//! streams are only bound when the request is submitted, so a request that
//! is built but never sent reserves nothing. Whatever allocation did happen
//! is undone by [`Request::abort`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use frame_server_protocol::{CaptureRequestBuilder, Key, RequestTemplate};
use serde::Serialize;
use tracing::{debug, trace};

use crate::buffer_queue::BufferQueue;
use crate::error::Result;
use crate::listener::{ListenerHandle, ListenerKey, ResponseListener, ResponseListenerBroadcaster};
use crate::listeners::ResponseListeners;
use crate::stream::CaptureStream;

/// A request ready to be submitted through a session.
#[async_trait]
pub trait Request: Send + Sync {
	/// Performs every deferred allocation and returns the descriptor to submit.
	///
	/// May wait for resources. Called at most once per request.
	async fn allocate_capture_request(&self) -> Result<CaptureRequestBuilder>;

	/// Listener receiving this request's events.
	fn response_listener(&self) -> Arc<dyn ResponseListener>;

	/// Undoes any allocation, complete or partial. Safe to call repeatedly.
	fn abort(&self);
}

/// Aborts every request of a batch when dropped, unless disarmed.
///
/// Covers both error returns and cancellation of the submitting future.
pub(crate) struct AbortOnDrop<'a> {
	requests: &'a [Box<dyn Request>],
	armed: bool,
}

impl<'a> AbortOnDrop<'a> {
	pub(crate) fn new(requests: &'a [Box<dyn Request>]) -> Self {
		Self { requests, armed: true }
	}

	/// Marks the batch as submitted.
	pub(crate) fn disarm(mut self) {
		self.armed = false;
	}
}

impl Drop for AbortOnDrop<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		debug!(target: "frame_server.request", batch_len = self.requests.len(), "aborting batch");
		for request in self.requests {
			request.abort();
		}
	}
}

/// One output target bound at allocation time.
struct StreamAllocation {
	stream: Arc<dyn CaptureStream>,
	timestamps: BufferQueue<i64>,
}

impl StreamAllocation {
	async fn allocate(&self, builder: &mut CaptureRequestBuilder) -> Result<()> {
		let surface = self.stream.bind(self.timestamps.clone()).await?;
		trace!(target: "frame_server.request", surface = surface.name(), "stream bound");
		builder.add_target(surface);
		Ok(())
	}

	fn abort(&self) {
		self.timestamps.close();
	}
}

struct BuiltRequest {
	template: CaptureRequestBuilder,
	allocations: Vec<StreamAllocation>,
	listener: Arc<dyn ResponseListener>,
	aborted: AtomicBool,
}

#[async_trait]
impl Request for BuiltRequest {
	async fn allocate_capture_request(&self) -> Result<CaptureRequestBuilder> {
		let mut builder = self.template.clone();
		for allocation in &self.allocations {
			allocation.allocate(&mut builder).await?;
		}
		Ok(builder)
	}

	fn response_listener(&self) -> Arc<dyn ResponseListener> {
		Arc::clone(&self.listener)
	}

	fn abort(&self) {
		if self.aborted.swap(true, Ordering::AcqRel) {
			return;
		}
		for allocation in &self.allocations {
			allocation.abort();
		}
	}
}

/// Assembles a [`Request`] from parameters, output streams and listeners.
///
/// # Example
///
/// ```ignore
/// let mut builder = RequestBuilder::new(RequestTemplate::Preview);
/// builder.set_param(keys::CONTROL_AF_TRIGGER, keys::af_trigger::START)?;
/// builder.add_stream(preview_stream);
/// builder.add_response_listener(ResponseListeners::for_final_metadata(results.clone()));
/// session.submit_request(vec![builder.build()], RequestType::NonRepeating).await?;
/// ```
pub struct RequestBuilder {
	template: CaptureRequestBuilder,
	allocations: Vec<StreamAllocation>,
	listeners: Vec<ListenerHandle>,
	listener_keys: HashSet<ListenerKey>,
}

impl RequestBuilder {
	pub fn new(template: RequestTemplate) -> Self {
		Self::from_descriptor(CaptureRequestBuilder::new(template))
	}

	/// Starts from an existing descriptor, keeping its parameters and targets.
	pub fn from_descriptor(descriptor: CaptureRequestBuilder) -> Self {
		Self {
			template: descriptor,
			allocations: Vec::new(),
			listeners: Vec::new(),
			listener_keys: HashSet::new(),
		}
	}

	/// Records a parameter; a later value for the same key replaces it.
	pub fn set_param<T: Serialize>(&mut self, key: Key<T>, value: T) -> Result<()> {
		self.template.set(key, value)?;
		Ok(())
	}

	/// Adds `stream` as an output target, bound when the request is allocated.
	///
	/// The stream receives a fresh timestamp queue which is fed the frame's
	/// start-of-exposure timestamp and closed if the request is aborted.
	pub fn add_stream(&mut self, stream: Arc<dyn CaptureStream>) {
		let timestamps = BufferQueue::new();
		self.add_response_listener(ResponseListeners::for_timestamps(timestamps.clone()));
		self.allocations.push(StreamAllocation { stream, timestamps });
	}

	/// Adds `listener` unless a listener with the same key is already registered.
	pub fn add_response_listener(&mut self, listener: ListenerHandle) {
		if self.listener_keys.insert(listener.key()) {
			self.listeners.push(listener);
		}
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.len()
	}

	pub fn build(self) -> Box<dyn Request> {
		let listener = ResponseListenerBroadcaster::new(self.listeners.iter().map(|handle| Arc::clone(handle.listener())));
		Box::new(BuiltRequest {
			template: self.template,
			allocations: self.allocations,
			listener: Arc::new(listener),
			aborted: AtomicBool::new(false),
		})
	}
}
