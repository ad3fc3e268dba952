//! Error types for the frame server.

use std::time::Duration;

use frame_server_protocol::Tag;
use thiserror::Error;

/// Result type alias for frame-server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by sessions, dispatch and request allocation.
#[derive(Debug, Error)]
pub enum Error {
	/// The session handle was closed; acquire a new session.
	#[error("Session is closed")]
	SessionClosed,

	/// A stream could not reserve what a request needs (e.g. a buffer slot).
	#[error("Resource acquisition failed: {0}")]
	ResourceAcquisitionFailed(String),

	/// The device rejected the submission.
	#[error("Camera access error: {0}")]
	CameraAccess(String),

	/// The underlying capture session is gone.
	#[error("Capture session is closed")]
	CaptureSessionClosed,

	/// `create_exclusive_session` was called from the context already holding the lock.
	#[error("Exclusive session requested by the context that already holds it")]
	ReentrantExclusiveSession,

	/// A device callback carried a tag that no submission registered.
	#[error("No listener registered for {0}")]
	UnknownTag(Tag),

	/// A device callback carried a request without a tag.
	#[error("Callback for a request with no tag")]
	UntaggedRequest,

	#[error("Buffer queue is closed")]
	BufferQueueClosed,

	#[error("Timed out after {0:?}")]
	Timeout(Duration),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl Error {
	/// Errors a caller can handle by retrying with a new session or request.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Error::SessionClosed | Error::ResourceAcquisitionFailed(_) | Error::BufferQueueClosed | Error::Timeout(_))
	}

	pub fn is_session_closed(&self) -> bool {
		matches!(self, Error::SessionClosed)
	}

	/// Invariant violations that indicate a bug in the caller or the device.
	pub fn is_programmer_error(&self) -> bool {
		matches!(self, Error::ReentrantExclusiveSession | Error::UnknownTag(_) | Error::UntaggedRequest)
	}
}
