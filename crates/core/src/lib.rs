// frame-server: Arbitration of one shared camera capture session
//
// Clients acquire exclusive or shared sessions from a `FrameServer`, build
// requests with `RequestBuilder` and receive per-request callbacks through
// `ResponseListener`s.

pub mod buffer_queue;
pub mod camera;
pub mod dispatch;
pub mod error;
pub mod fake_device;
pub mod frame_server;
pub mod listener;
pub mod listeners;
pub mod observable;
pub mod options;
pub mod repeat_failure;
pub mod request;
pub mod stream;

pub use buffer_queue::BufferQueue;
pub use camera::{CameraCaptureSession, CaptureCallback};
pub use dispatch::TagDispatchCaptureSession;
pub use error::{Error, Result};
pub use frame_server::{ContextId, FrameServer, FrameServerImpl, Session};
pub use listener::{ListenerHandle, ListenerKey, ResponseListener, ResponseListenerBroadcaster, Updatable, UpdatableFn};
pub use listeners::{MetadataChangeResponseListener, ResponseListeners, TimestampResponseListener, TotalCaptureResultResponseListener};
pub use observable::{AvailabilitySubscription, ObservableFrameServer};
pub use options::{DEFAULT_REPEAT_FAILURE_THRESHOLD, DEFAULT_STREAM_SLOTS, FrameServerOptions};
pub use repeat_failure::RepeatFailureDetector;
pub use request::{Request, RequestBuilder};
pub use stream::{CaptureStream, PooledCaptureStream};

pub use frame_server_protocol as protocol;
