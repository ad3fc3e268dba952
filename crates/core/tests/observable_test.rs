// Integration tests for the availability observable
//
// Tests cover:
// - Round trip through exclusive acquisition and close
// - Failed try-acquisition leaves availability unchanged
// - Callbacks delivered on the supplied executor

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{batch, server};
use frame_server::protocol::RequestType;
use frame_server::{FrameServer, ObservableFrameServer, Session};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

fn observable() -> (ObservableFrameServer, frame_server::fake_device::FakeCaptureController) {
	let (server, controller) = server();
	(ObservableFrameServer::new(server), controller)
}

#[tokio::test]
async fn availability_round_trip() -> anyhow::Result<()> {
	let (server, _controller) = observable();
	assert!(server.is_available());

	let session = server.create_exclusive_session().await?;
	assert!(!server.is_available());

	session.close();
	assert!(server.is_available());
	Ok(())
}

#[tokio::test]
async fn failed_try_acquisition_leaves_availability_unchanged() -> anyhow::Result<()> {
	let (server, _controller) = observable();
	let holder = server.try_create_exclusive_session().expect("lock is free");
	let mut receiver = server.subscribe();
	let _ = receiver.borrow_and_update();

	assert!(server.try_create_exclusive_session().is_none());
	assert!(!server.is_available());
	assert!(!receiver.has_changed()?);

	drop(holder);
	assert!(server.is_available());
	Ok(())
}

#[tokio::test]
async fn failed_blocking_acquisition_leaves_availability_unchanged() -> anyhow::Result<()> {
	let (server, _controller) = observable();
	let holder = server.create_exclusive_session().await?;
	assert!(server.create_exclusive_session().await.is_err());
	assert!(!server.is_available());
	holder.close();
	assert!(server.is_available());
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn callbacks_run_on_the_supplied_executor() -> anyhow::Result<()> {
	let (server, _controller) = observable();
	let (tx, mut rx) = mpsc::unbounded_channel();
	let _subscription = server.add_callback(
		move |available| {
			let _ = tx.send(available);
		},
		&Handle::current(),
	);

	let session = server.create_exclusive_session().await?;
	assert_eq!(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await?, Some(false));

	session.close();
	assert_eq!(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await?, Some(true));
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_subscription_stops_callbacks() -> anyhow::Result<()> {
	let (server, _controller) = observable();
	let (tx, mut rx) = mpsc::unbounded_channel();
	let subscription = server.add_callback(
		move |available| {
			let _ = tx.send(available);
		},
		&Handle::current(),
	);
	drop(subscription);

	let session = server.create_exclusive_session().await?;
	session.close();

	// The sender lives inside the aborted task, so the channel closes.
	assert_eq!(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await?, None);
	Ok(())
}

#[tokio::test]
async fn observed_sessions_forward_submissions() -> anyhow::Result<()> {
	let (server, controller) = observable();
	let server: Arc<dyn FrameServer> = Arc::new(server);
	let session = server.create_exclusive_session().await?;

	let (requests, trackers) = batch(4, 2);
	session.submit_request(requests, RequestType::Repeating).await?;
	assert_eq!(controller.submissions().len(), 1);
	assert!(trackers.iter().all(|tracker| tracker.aborts() == 0));

	session.close();
	let (requests, trackers) = batch(4, 1);
	assert!(session.submit_request(requests, RequestType::Repeating).await.is_err());
	assert_eq!(trackers[0].aborts(), 1);
	Ok(())
}
