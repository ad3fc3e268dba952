//! Output streams bound by requests at allocation time.

use std::sync::Arc;

use async_trait::async_trait;
use frame_server_protocol::Surface;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::buffer_queue::BufferQueue;
use crate::error::{Error, Result};
use crate::options::FrameServerOptions;

/// An output target that may need to reserve resources per request.
#[async_trait]
pub trait CaptureStream: Send + Sync {
	/// Reserves what one request needs and returns the surface to target.
	///
	/// `timestamps` receives the start-of-exposure timestamp of each frame
	/// the request produces and is closed if the request is aborted. May wait
	/// (e.g. for a free buffer slot) and may fail with
	/// [`Error::ResourceAcquisitionFailed`].
	async fn bind(&self, timestamps: BufferQueue<i64>) -> Result<Surface>;
}

/// A stream backed by a fixed pool of buffer slots.
///
/// Each bind waits for a free slot. The slot stays reserved until the
/// request's first frame starts, at which point its timestamp is forwarded
/// to [`frames`](Self::frames), or until the request is aborted.
pub struct PooledCaptureStream {
	surface: Surface,
	slots: Arc<Semaphore>,
	capacity: usize,
	frames: BufferQueue<i64>,
}

impl PooledCaptureStream {
	/// A pool of `capacity` slots, never fewer than one.
	pub fn new(surface: Surface, capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			surface,
			slots: Arc::new(Semaphore::new(capacity)),
			capacity,
			frames: BufferQueue::new(),
		}
	}

	pub fn from_options(surface: Surface, options: &FrameServerOptions) -> Self {
		Self::new(surface, options.effective_stream_slots())
	}

	/// Start-of-exposure timestamps of frames captured into this stream.
	pub fn frames(&self) -> &BufferQueue<i64> {
		&self.frames
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn available_slots(&self) -> usize {
		self.slots.available_permits()
	}

	/// Fails pending and future binds and closes the frame queue.
	pub fn close(&self) {
		self.slots.close();
		self.frames.close();
	}
}

#[async_trait]
impl CaptureStream for PooledCaptureStream {
	async fn bind(&self, timestamps: BufferQueue<i64>) -> Result<Surface> {
		let permit = Arc::clone(&self.slots)
			.acquire_owned()
			.await
			.map_err(|_| Error::ResourceAcquisitionFailed(format!("stream {} is closed", self.surface.name())))?;
		trace!(target: "frame_server.stream", surface = self.surface.name(), available = self.slots.available_permits(), "slot reserved");

		let frames = self.frames.clone();
		let surface = self.surface.name().to_string();
		tokio::spawn(async move {
			match timestamps.next().await {
				Ok(timestamp) => frames.push(timestamp),
				Err(_) => debug!(target: "frame_server.stream", %surface, "request aborted; releasing slot"),
			}
			drop(permit);
		});

		Ok(self.surface.clone())
	}
}
