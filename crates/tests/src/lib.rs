//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 限速不变量（任意 interval 窗口内投递数 ≤ N）
//! - 队列背压、FIFO、失败隔离
//! - 关闭策略与共享实例
//! - 配置 → 分发器 → HTTP 端到端

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use contracts::{Payload, Transport, TransportError, TransportResponse};
    use tokio::sync::mpsc;
    use tokio::time::{Duration, Instant};

    pub type FailWhen = Arc<dyn Fn(&str, usize) -> bool + Send + Sync>;

    /// One recorded `send` call
    #[derive(Debug, Clone)]
    pub struct Call {
        pub at: Instant,
        pub body: String,
    }

    /// Test double recording payloads, start times and concurrency
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        calls: Arc<Mutex<Vec<Call>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        delay: Duration,
        fail_when: Option<FailWhen>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every send takes `delay`
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Fail when `f(body, times this body was seen before)` is true
        pub fn failing_when(mut self, f: impl Fn(&str, usize) -> bool + Send + Sync + 'static) -> Self {
            self.fail_when = Some(Arc::new(f));
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn bodies(&self) -> Vec<String> {
            self.calls().into_iter().map(|c| c.body).collect()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, payload: &Payload) -> Result<TransportResponse, TransportError> {
            let body = String::from_utf8_lossy(payload.body()).into_owned();
            let seen = {
                let mut calls = self.calls.lock().unwrap();
                let seen = calls.iter().filter(|c| c.body == body).count();
                calls.push(Call {
                    at: Instant::now(),
                    body: body.clone(),
                });
                seen
            };

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(fail) = &self.fail_when {
                if fail(&body, seen) {
                    return Err(TransportError::Rejected {
                        status: 500,
                        body: "injected failure".into(),
                    });
                }
            }
            Ok(TransportResponse::new(200, "ok"))
        }
    }

    /// Everything currently buffered in a report channel
    pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use contracts::DispatchConfig;
    use dispatcher::Dispatcher;
    use tokio::time::Duration;

    use crate::support::RecordingTransport;

    /// N = 60 per 60s, 1000 documents queued at t = 0
    #[tokio::test(start_paused = true)]
    async fn test_sixty_per_minute_burst() {
        let mut config = DispatchConfig::new(60, Duration::from_secs(60));
        config.queue.capacity = Some(1000);
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();

        for n in 0..1000u32 {
            dispatcher.submit(n).await.unwrap();
        }
        let report = dispatcher.shutdown().await;
        assert_eq!(report.delivered, 1000);

        let times: Vec<_> = transport.calls().iter().map(|c| c.at).collect();
        assert_eq!(times.len(), 1000);
        let start = times[0];

        // 61st delivery is at least one spacing (in fact a whole interval) later
        assert!(times[60] - start >= Duration::from_secs(1));
        assert!(times[60] - start >= Duration::from_secs(60));

        // Any 61 consecutive starts span at least one interval
        for pair in times.windows(61) {
            assert!(pair[60] - pair[0] >= Duration::from_secs(60));
        }

        // Fixed windows measured from the first delivery
        let mut per_window = std::collections::BTreeMap::new();
        for t in &times {
            *per_window.entry((*t - start).as_secs() / 60).or_insert(0u32) += 1;
        }
        assert!(per_window.values().all(|&n| n <= 60), "{per_window:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_never_exceeds_quota() {
        let mut config = DispatchConfig::new(7, Duration::from_millis(1_000));
        config.queue.capacity = Some(50);
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();

        for n in 0..50u32 {
            dispatcher.submit(n).await.unwrap();
        }
        dispatcher.shutdown().await;

        let times: Vec<_> = transport.calls().iter().map(|c| c.at).collect();
        for (i, t) in times.iter().enumerate() {
            let in_window = times[i..]
                .iter()
                .take_while(|u| **u - *t < Duration::from_millis(1_000))
                .count();
            assert!(in_window <= 7, "{in_window} starts within one interval");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_capacity_is_not_banked() {
        let mut config = DispatchConfig::new(2, Duration::from_secs(2));
        config.queue.capacity = Some(10);
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();

        dispatcher.submit(0u32).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        // After a long idle period a burst is still paced at one per second
        for n in 1..5u32 {
            dispatcher.submit(n).await.unwrap();
        }
        dispatcher.shutdown().await;

        let times: Vec<_> = transport.calls().iter().map(|c| c.at).collect();
        for pair in times[1..].windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_bounded_by_worker_count() {
        let mut config = DispatchConfig::new(3, Duration::from_secs(3));
        config.queue.capacity = Some(20);
        let transport = RecordingTransport::new().with_delay(Duration::from_secs(5));
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();

        for n in 0..12u32 {
            dispatcher.submit(n).await.unwrap();
        }
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 12);
        assert_eq!(transport.max_in_flight(), 3);
    }
}

#[cfg(test)]
mod queue_tests {
    use contracts::DispatchConfig;
    use dispatcher::Dispatcher;
    use tokio::time::Duration;

    use crate::support::RecordingTransport;

    #[tokio::test(start_paused = true)]
    async fn test_fifo_dequeue_order() {
        let mut config = DispatchConfig::new(3, Duration::from_millis(300));
        config.queue.capacity = Some(20);
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();

        for n in 0..20u32 {
            dispatcher.submit(n).await.unwrap();
        }
        dispatcher.shutdown().await;

        let expected: Vec<String> = (0..20).map(|n| n.to_string()).collect();
        assert_eq!(transport.bodies(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_submit_waits_for_dequeue() {
        let mut config = DispatchConfig::new(1, Duration::from_secs(10));
        config.queue.capacity = Some(5);
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();
        let handle = dispatcher.handle();

        // Uses the first slot; the next release is 10s away
        handle.submit(0u32).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.calls().len(), 1);

        for n in 1..=5u32 {
            handle.submit(n).await.unwrap();
        }
        assert_eq!(handle.queue_len(), 5);

        let sixth = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(6u32).await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!sixth.is_finished(), "sixth submit returned while the queue was full");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(sixth.is_finished());
        sixth.await.unwrap().unwrap();

        let report = dispatcher.shutdown().await;
        assert_eq!(report.delivered, 7);
        assert_eq!(report.discarded, 0);
        assert_eq!(transport.bodies(), ["0", "1", "2", "3", "4", "5", "6"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_producers_lose_nothing() {
        let mut config = DispatchConfig::new(10, Duration::from_millis(100));
        config.queue.capacity = Some(4);
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config, transport.clone()).unwrap();

        let producers: Vec<_> = (0..8u32)
            .map(|p| {
                let handle = dispatcher.handle();
                tokio::spawn(async move {
                    for n in 0..25u32 {
                        handle.submit(p * 100 + n).await.unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 200);
        let mut bodies: Vec<u32> = transport
            .bodies()
            .iter()
            .map(|b| b.parse().unwrap())
            .collect();
        bodies.sort_unstable();
        bodies.dedup();
        assert_eq!(bodies.len(), 200);
    }
}

#[cfg(test)]
mod failure_tests {
    use contracts::{DeliveryError, DispatchConfig, FailurePolicy, TransportError};
    use dispatcher::DispatcherBuilder;
    use serde::ser::Error as _;
    use serde::{Serialize, Serializer};
    use tokio::sync::mpsc;
    use tokio::time::Duration;

    use crate::support::{drain, RecordingTransport};

    /// Document that refuses to serialize when `poisoned`
    struct Doc {
        id: u32,
        poisoned: bool,
    }

    impl Serialize for Doc {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.poisoned {
                return Err(S::Error::custom("poisoned document"));
            }
            serializer.serialize_u32(self.id)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_isolated() {
        let mut config = DispatchConfig::new(2, Duration::from_millis(200));
        config.queue.capacity = Some(10);
        let transport = RecordingTransport::new().failing_when(|body, _| body == "2");
        let (tx, mut rx) = mpsc::channel(64);
        let dispatcher = DispatcherBuilder::new(config)
            .with_reports(tx)
            .start(transport.clone())
            .unwrap();

        for n in 0..6u32 {
            dispatcher.submit(n).await.unwrap();
        }
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 5);
        assert_eq!(report.failed, 1);
        let reports = drain(&mut rx);
        assert_eq!(reports.len(), 6);

        let failed: Vec<_> = reports.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].seq, 2);
        assert!(matches!(
            failed[0].outcome,
            Err(DeliveryError::Transport(TransportError::Rejected { status: 500, .. }))
        ));
        // Documents after the failure still went out
        assert!(transport.bodies().contains(&"5".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_serialization_failure_is_reported() {
        let mut config = DispatchConfig::new(1, Duration::from_millis(100));
        config.queue.capacity = Some(10);
        let transport = RecordingTransport::new();
        let (tx, mut rx) = mpsc::channel(64);
        let dispatcher = DispatcherBuilder::new(config)
            .with_reports(tx)
            .start(transport.clone())
            .unwrap();

        for id in 0..4u32 {
            dispatcher
                .submit(Doc {
                    id,
                    poisoned: id == 1,
                })
                .await
                .unwrap();
        }
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 3);
        assert_eq!(transport.bodies(), ["0", "2", "3"]);
        let reports = drain(&mut rx);
        let failed: Vec<_> = reports.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert!(matches!(failed[0].outcome, Err(DeliveryError::Serialization(_))));
        assert_eq!(failed[0].latency, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_delivers_on_second_attempt() {
        let mut config = DispatchConfig::new(1, Duration::from_secs(1));
        config.queue.capacity = Some(10);
        config.failure_policy = FailurePolicy::Requeue { max_attempts: 2 };
        let transport = RecordingTransport::new().failing_when(|_, seen| seen == 0);
        let (tx, mut rx) = mpsc::channel(64);
        let dispatcher = DispatcherBuilder::new(config)
            .with_reports(tx)
            .start(transport.clone())
            .unwrap();

        for n in 0..3u32 {
            dispatcher.submit(n).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(dispatcher.metrics().requeued, 3);
        // A retry takes the next slot, ahead of later documents
        assert_eq!(transport.bodies(), ["0", "0", "1", "1", "2", "2"]);

        let reports = drain(&mut rx);
        assert!(reports
            .iter()
            .filter(|r| r.attempt == 2)
            .all(|r| r.is_success()));
        assert!(reports
            .iter()
            .filter(|r| r.attempt == 1)
            .all(|r| !r.is_success()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_gives_up_after_max_attempts() {
        let mut config = DispatchConfig::new(1, Duration::from_secs(1));
        config.queue.capacity = Some(10);
        config.failure_policy = FailurePolicy::Requeue { max_attempts: 3 };
        let transport = RecordingTransport::new().failing_when(|_, _| true);
        let dispatcher = DispatcherBuilder::new(config).start(transport.clone()).unwrap();

        dispatcher.submit(9u32).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 3);
        assert_eq!(transport.bodies().len(), 3);
    }

    /// Queue at its default capacity, several producers, every first attempt fails
    #[tokio::test(start_paused = true)]
    async fn test_requeue_under_backpressure_with_concurrent_producers() {
        let mut config = DispatchConfig::new(2, Duration::from_secs(2));
        config.failure_policy = FailurePolicy::Requeue { max_attempts: 2 };
        assert_eq!(config.queue_capacity(), 2);
        let transport = RecordingTransport::new().failing_when(|_, seen| seen == 0);
        let (tx, mut rx) = mpsc::channel(256);
        let dispatcher = DispatcherBuilder::new(config)
            .with_reports(tx)
            .start(transport.clone())
            .unwrap();

        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let handle = dispatcher.handle();
                tokio::spawn(async move {
                    let mut submitted = 0;
                    for i in 0..10 {
                        handle.submit(p * 100 + i).await.unwrap();
                        submitted += 1;
                    }
                    submitted
                })
            })
            .collect();

        let submitted = tokio::time::timeout(Duration::from_secs(3_600), async {
            let mut total = 0;
            for producer in producers {
                total += producer.await.unwrap();
            }
            total
        })
        .await
        .expect("every producer finishes");
        assert_eq!(submitted, 40);

        let report = tokio::time::timeout(Duration::from_secs(3_600), dispatcher.shutdown())
            .await
            .expect("drain completes");
        assert_eq!(report.delivered, 40);
        assert_eq!(report.failed, 40);
        assert_eq!(report.discarded, 0);
        assert_eq!(dispatcher.metrics().requeued, 40);

        let bodies = transport.bodies();
        assert_eq!(bodies.len(), 80);
        for p in 0..4u32 {
            for i in 0..10 {
                let body = (p * 100 + i).to_string();
                assert_eq!(bodies.iter().filter(|b| **b == body).count(), 2);
            }
        }

        let reports = drain(&mut rx);
        assert_eq!(reports.len(), 80);
        assert!(reports.iter().all(|r| r.is_success() == (r.attempt == 2)));
        assert!(transport.max_in_flight() <= 2);
    }
}

#[cfg(test)]
mod shutdown_tests {
    use contracts::{DispatchConfig, ShutdownPolicy};
    use dispatcher::{DispatchError, Dispatcher};
    use tokio::time::Duration;

    use crate::support::RecordingTransport;

    fn config(policy: ShutdownPolicy) -> DispatchConfig {
        let mut config = DispatchConfig::new(2, Duration::from_secs(2));
        config.queue.capacity = Some(10);
        config.shutdown_policy = policy;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_delivers_everything_queued() {
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config(ShutdownPolicy::Drain), transport.clone()).unwrap();

        for n in 0..10u32 {
            dispatcher.submit(n).await.unwrap();
        }
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 10);
        assert_eq!(report.discarded, 0);
        assert!(!report.drain_timed_out);
        assert_eq!(transport.calls().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_queued_documents() {
        let transport = RecordingTransport::new();
        let dispatcher =
            Dispatcher::start(config(ShutdownPolicy::Discard), transport.clone()).unwrap();

        for n in 0..10u32 {
            dispatcher.submit(n).await.unwrap();
        }
        // First release happens, the second is one second away
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.discarded, 9);
        assert_eq!(dispatcher.metrics().discarded, 9);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_delivery_completes_on_discard() {
        let transport = RecordingTransport::new().with_delay(Duration::from_secs(3));
        let dispatcher =
            Dispatcher::start(config(ShutdownPolicy::Discard), transport.clone()).unwrap();

        for n in 0..4u32 {
            dispatcher.submit(n).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.discarded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_producer_sees_closed() {
        let mut cfg = config(ShutdownPolicy::Discard);
        cfg.queue.capacity = Some(1);
        let dispatcher = Dispatcher::start(cfg, RecordingTransport::new()).unwrap();
        let handle = dispatcher.handle();

        handle.submit(0u32).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.submit(1).await.unwrap();

        let blocked = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit(2).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!blocked.is_finished());

        dispatcher.shutdown().await;
        let result = blocked.await.unwrap();
        assert!(matches!(result, Err(DispatchError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_dispatcher_stops_releasing() {
        let transport = RecordingTransport::new();
        let dispatcher = Dispatcher::start(config(ShutdownPolicy::Drain), transport.clone()).unwrap();
        let handle = dispatcher.handle();

        for n in 0..5u32 {
            handle.submit(n).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(dispatcher);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.calls().len(), 1);
        assert!(handle.is_closed());
    }
}

#[cfg(test)]
mod shared_access_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use contracts::DispatchConfig;
    use dispatcher::{DispatchError, Dispatcher, DispatcherCell};
    use tokio::time::Duration;

    use crate::support::RecordingTransport;

    fn config() -> DispatchConfig {
        let mut config = DispatchConfig::new(16, Duration::from_millis(160));
        config.queue.capacity = Some(64);
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_dispatcher() {
        let cell = Arc::new(DispatcherCell::<u32>::new());
        let constructed = Arc::new(AtomicUsize::new(0));
        let transport = RecordingTransport::new();

        let callers: Vec<_> = (0..16u32)
            .map(|n| {
                let cell = Arc::clone(&cell);
                let constructed = Arc::clone(&constructed);
                let transport = transport.clone();
                tokio::spawn(async move {
                    let dispatcher = cell
                        .get_or_start(config(), move || {
                            constructed.fetch_add(1, Ordering::SeqCst);
                            Ok(transport)
                        })
                        .await
                        .unwrap();
                    dispatcher.submit(n).await.unwrap();
                    dispatcher
                })
            })
            .collect();

        let mut instances = Vec::new();
        for caller in callers {
            instances.push(caller.await.unwrap());
        }

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|d| Arc::ptr_eq(d, &instances[0])));
        // All callers fed the same queue
        assert_eq!(instances[0].metrics().submitted, 16);

        let report = instances[0].shutdown().await;
        assert_eq!(report.delivered, 16);
        assert_eq!(transport.calls().len(), 16);
    }

    #[tokio::test]
    async fn test_configuration_is_immutable_once_started() {
        let cell = DispatcherCell::<u32>::new();
        let first = cell
            .get_or_start(config(), || Ok(RecordingTransport::new()))
            .await
            .unwrap();

        let mut other = config();
        other.rate_limit.count = 32;
        let err = cell
            .get_or_start(other, || Ok(RecordingTransport::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ConfigConflict { .. }));
        assert_eq!(first.config().rate_limit.count, 16);
        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_positive_configuration_rejected() {
        let zero_count = DispatchConfig::new(0, Duration::from_secs(1));
        assert!(matches!(
            Dispatcher::<u32>::start(zero_count.clone(), RecordingTransport::new()),
            Err(DispatchError::Config(_))
        ));

        let zero_interval = DispatchConfig::new(5, Duration::ZERO);
        assert!(matches!(
            Dispatcher::<u32>::start(zero_interval, RecordingTransport::new()),
            Err(DispatchError::Config(_))
        ));

        let cell = DispatcherCell::<u32>::new();
        let result = cell
            .get_or_start(zero_count, || Ok(RecordingTransport::new()))
            .await;
        assert!(result.is_err());
        assert!(cell.get().is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::RegistrationDocument;
    use dispatcher::{DispatcherBuilder, HttpTransport};
    use observability::DeliveryStatsAggregator;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use crate::support::drain;

    const DOCUMENT: &str = r#"{
        "description": {"participantInn": "7700000001"},
        "doc_id": "doc-1",
        "doc_status": "DRAFT",
        "doc_type": "LP_INTRODUCE_GOODS",
        "importRequest": false,
        "owner_inn": "7700000001",
        "participant_inn": "7700000001",
        "producer_inn": "7700000002",
        "production_date": "2024-03-01",
        "production_type": "OWN_PRODUCTION",
        "products": [],
        "reg_date": "2024-03-02",
        "reg_number": "0000000001"
    }"#;

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    /// Accepts three connections, answering every request with 200
    async fn accepting_server() -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/v3/lk/documents/create", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let mut requests = Vec::new();
            for _ in 0..3 {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                requests.push(request);
                stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\nConnection: close\r\n\r\n{\"value\":\"1\"}")
                    .await
                    .unwrap();
            }
            requests
        });
        (url, server)
    }

    /// Config file -> dispatcher -> HTTP endpoint
    #[tokio::test]
    async fn test_e2e_http_dispatch() {
        let (url, server) = accepting_server().await;
        let toml = format!(
            r#"
[rate_limit]
count = 2
interval_ms = 200

[queue]
capacity = 3

[endpoint]
url = "{url}"
timeout_ms = 2000
token = "test-token"
"#
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let transport = HttpTransport::new("crpt", &config.endpoint).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let dispatcher = DispatcherBuilder::new(config)
            .with_reports(tx)
            .start(transport)
            .unwrap();

        let document: RegistrationDocument = serde_json::from_str(DOCUMENT).unwrap();
        for _ in 0..3 {
            dispatcher.submit(document.clone()).await.unwrap();
        }
        let report = dispatcher.shutdown().await;
        assert_eq!(report.delivered, 3, "{report:?}");

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            let lower = request.to_ascii_lowercase();
            assert!(request.starts_with("POST /api/v3/lk/documents/create"));
            assert!(lower.contains("content-type: application/json"));
            assert!(lower.contains("authorization: bearer test-token"));
            assert!(request.contains("\"participantInn\":\"7700000001\""));
        }

        let mut stats = DeliveryStatsAggregator::new();
        for report in drain(&mut rx) {
            stats.update(&report);
        }
        let summary = stats.summary();
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(stats.status_counts.get(&200), Some(&3));
    }
}
