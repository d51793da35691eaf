//! Ingestion Hook
//!
//! Records one request log event per dispatched request without holding up
//! the response. Events go through a bounded queue to a detached task that
//! appends them to the event log. Failures never reach the request caller:
//! they are logged, counted and published on a failure channel for operators.
//! The failure channel exists from the first [`RequestLogger::failures`] call
//! on; earlier failures are only logged and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flume::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use banhammer_types::{event_log_adapter::EventLogAdapter, types::RequestEvent};

use crate::prelude::*;

pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
const FAILURE_CAPACITY: usize = 256;

/// What the serving process knows about a finished request
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestInfo<'a> {
	pub ip: Option<&'a str>,
	pub key: Option<&'a str>,
	pub method: Option<&'a str>,
	/// Request path, with or without the `/api/` prefix
	pub route: Option<&'a str>,
	pub status_code: u16,
}

impl RequestInfo<'_> {
	pub fn into_event(self, timestamp: Timestamp) -> RequestEvent {
		RequestEvent::new(
			self.ip,
			self.key,
			self.method,
			self.route.map(normalize_route),
			self.status_code,
			timestamp,
		)
	}
}

/// Strips the leading `/api/` prefix from a request path
pub fn normalize_route(route: &str) -> &str {
	route.strip_prefix("/api/").unwrap_or(route)
}

/// An event that could not be recorded
#[derive(Debug)]
pub enum IngestFailure {
	/// The queue was full, the event was dropped
	QueueFull(RequestEvent),
	/// The logger was shut down
	Closed(RequestEvent),
	/// The event log rejected the append
	AppendFailed { event: RequestEvent, error: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
	pub queued: u64,
	pub appended: u64,
	pub dropped: u64,
	pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
	queued: AtomicU64,
	appended: AtomicU64,
	dropped: AtomicU64,
	failed: AtomicU64,
}

impl Counters {
	fn snapshot(&self) -> IngestStats {
		IngestStats {
			queued: self.queued.load(Ordering::Relaxed),
			appended: self.appended.load(Ordering::Relaxed),
			dropped: self.dropped.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
		}
	}
}

#[derive(Debug, Default)]
struct FailureSink {
	counters: Counters,
	channel: RwLock<Option<(Sender<IngestFailure>, Receiver<IngestFailure>)>>,
}

impl FailureSink {
	fn report(&self, failure: IngestFailure) {
		match &failure {
			IngestFailure::QueueFull(event) => {
				self.counters.dropped.fetch_add(1, Ordering::Relaxed);
				warn!("request log queue full, dropping event for ip={:?}", event.ip);
			}
			IngestFailure::Closed(event) => {
				self.counters.dropped.fetch_add(1, Ordering::Relaxed);
				warn!("request log closed, dropping event for ip={:?}", event.ip);
			}
			IngestFailure::AppendFailed { event, error } => {
				self.counters.failed.fetch_add(1, Ordering::Relaxed);
				error!(error = %error, ip = ?event.ip, route = ?event.route, "failed to append request log event");
			}
		}
		if let Some((tx, _)) = self.channel.read().as_ref() {
			// dropped when the subscribers do not keep up
			let _ = tx.try_send(failure);
		}
	}

	fn subscribe(&self) -> Receiver<IngestFailure> {
		let mut channel = self.channel.write();
		let (_, rx) = channel.get_or_insert_with(|| flume::bounded(FAILURE_CAPACITY));
		rx.clone()
	}
}

#[derive(Debug)]
pub struct RequestLogger {
	tx: Sender<RequestEvent>,
	sink: Arc<FailureSink>,
	task: JoinHandle<()>,
}

impl RequestLogger {
	/// Starts the background append task. Must be called within a tokio runtime.
	pub fn spawn(adapter: Arc<dyn EventLogAdapter>) -> Self {
		Self::with_capacity(adapter, DEFAULT_QUEUE_CAPACITY)
	}

	pub fn with_capacity(adapter: Arc<dyn EventLogAdapter>, capacity: usize) -> Self {
		let (tx, rx) = flume::bounded::<RequestEvent>(capacity.max(1));
		let sink = Arc::new(FailureSink::default());

		let task_sink = sink.clone();
		let task = tokio::spawn(async move {
			while let Ok(event) = rx.recv_async().await {
				match adapter.append_event(&event).await {
					Ok(()) => {
						task_sink.counters.appended.fetch_add(1, Ordering::Relaxed);
					}
					Err(err) => {
						task_sink.report(IngestFailure::AppendFailed { event, error: err.to_string() });
					}
				}
			}
			debug!("request log drain task finished");
		});

		Self { tx, sink, task }
	}

	/// Records a finished request. Never blocks and never fails the caller.
	pub fn log_request(&self, info: RequestInfo<'_>) {
		self.log_event(info.into_event(Timestamp::now()));
	}

	pub fn log_event(&self, event: RequestEvent) {
		match self.tx.try_send(event) {
			Ok(()) => {
				self.sink.counters.queued.fetch_add(1, Ordering::Relaxed);
			}
			Err(TrySendError::Full(event)) => self.sink.report(IngestFailure::QueueFull(event)),
			Err(TrySendError::Disconnected(event)) => self.sink.report(IngestFailure::Closed(event)),
		}
	}

	/// Channel receiving every event that fails or is dropped from now on.
	///
	/// All subscribers share one bounded channel: each failure goes to one of
	/// them, and failures beyond its capacity are discarded while nobody drains.
	pub fn failures(&self) -> Receiver<IngestFailure> {
		self.sink.subscribe()
	}

	pub fn stats(&self) -> IngestStats {
		self.sink.counters.snapshot()
	}

	/// Stops accepting events and waits until the queued ones are written
	pub async fn shutdown(self) -> IngestStats {
		let Self { tx, sink, task } = self;
		drop(tx);
		if let Err(err) = task.await {
			error!("request log drain task failed: {}", err);
		}
		sink.counters.snapshot()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory_adapter::MemoryAdapter;

	fn info(ip: &str) -> RequestInfo<'_> {
		RequestInfo {
			ip: Some(ip),
			key: None,
			method: Some("GET"),
			route: Some("/api/v1/dummy"),
			status_code: 200,
		}
	}

	#[test]
	fn test_into_event_normalizes_fields() {
		let event = RequestInfo { key: Some(""), ..info("1.2.3.4") }.into_event(Timestamp(42));
		assert_eq!(event.route.as_deref(), Some("v1/dummy"));
		assert_eq!(event.key, None);
		assert_eq!(event.timestamp, Timestamp(42));
		assert_eq!(normalize_route("/other"), "/other");
	}

	#[tokio::test]
	async fn test_events_are_appended_in_background() {
		let adapter = Arc::new(MemoryAdapter::new());
		let logger = RequestLogger::spawn(adapter.clone());
		for _ in 0..10 {
			logger.log_request(info("1.2.3.4"));
		}

		let stats = logger.shutdown().await;
		assert_eq!(stats, IngestStats { queued: 10, appended: 10, dropped: 0, failed: 0 });
		assert!(matches!(adapter.count_events().await, Ok(10)));
	}

	#[tokio::test]
	async fn test_append_failures_are_reported_not_raised() {
		let adapter = Arc::new(MemoryAdapter::new());
		adapter.set_unavailable(true);
		let logger = RequestLogger::spawn(adapter.clone());
		let failures = logger.failures();

		logger.log_request(info("1.2.3.4"));
		let failure = failures.recv_async().await;
		assert!(matches!(failure, Ok(IngestFailure::AppendFailed { .. })));

		let stats = logger.shutdown().await;
		assert_eq!(stats.failed, 1);
		assert_eq!(stats.appended, 0);
	}

	#[tokio::test]
	async fn test_late_subscriber_sees_only_new_failures() {
		let adapter = Arc::new(MemoryAdapter::new());
		adapter.set_unavailable(true);
		let logger = RequestLogger::spawn(adapter.clone());

		logger.log_request(info("1.2.3.4"));
		while logger.stats().failed < 1 {
			tokio::task::yield_now().await;
		}

		let failures = logger.failures();
		logger.log_request(info("5.6.7.8"));
		let failure = failures.recv_async().await;
		assert!(matches!(
			failure,
			Ok(IngestFailure::AppendFailed { ref event, .. }) if event.ip.as_deref() == Some("5.6.7.8")
		));
		assert!(failures.try_recv().is_err());

		let stats = logger.shutdown().await;
		assert_eq!(stats.failed, 2);
	}

	#[tokio::test]
	async fn test_full_queue_drops_instead_of_blocking() {
		let adapter = Arc::new(MemoryAdapter::new());
		let logger = RequestLogger::with_capacity(adapter, 1);
		let failures = logger.failures();
		// current-thread runtime: the drain task cannot run until we yield
		logger.log_request(info("1.2.3.4"));
		logger.log_request(info("1.2.3.4"));
		logger.log_request(info("1.2.3.4"));

		assert!(matches!(failures.try_recv(), Ok(IngestFailure::QueueFull(_))));
		let stats = logger.shutdown().await;
		assert_eq!(stats.queued, 1);
		assert_eq!(stats.dropped, 2);
		assert_eq!(stats.appended, 1);
	}
}

// vim: ts=4
