use std::sync::{Arc, Mutex, OnceLock};
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use recvisor::memory::InMemoryBroker;
use recvisor::{
    AckMode, Config, EndpointError, EndpointState, HostSettings, Pipe, PipeContext, PipeError,
    ReceiveContext, ReceiveEndpoint, ReceiveEndpointCompleted, ReceiveEndpointFaulted,
    ReceiveEndpointObserver, ReceiveEndpointReady, ReceiveObserver, ReceiveSettings, Settlement,
    Supervisor, filters::Handler,
};
use tokio::sync::Semaphore;
use tokio_test::assert_pending;

const QUEUE: &str = "orders";

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    fault_labels: Mutex<Vec<&'static str>>,
    completed: Mutex<Vec<ReceiveEndpointCompleted>>,
    endpoint: OnceLock<ReceiveEndpoint>,
    in_flight_at_completed: Mutex<Vec<usize>>,
}

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.log().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Lets `completed` read the endpoint's live counter.
    fn watch(&self, endpoint: &ReceiveEndpoint) {
        let _ = self.endpoint.set(endpoint.clone());
    }

    fn in_flight_at_completed(&self) -> Vec<usize> {
        self.in_flight_at_completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiveEndpointObserver for Recorder {
    async fn ready(&self, _: &ReceiveEndpointReady) {
        self.push("ready");
    }

    async fn completed(&self, event: &ReceiveEndpointCompleted) {
        self.push("completed");
        self.completed.lock().unwrap().push(event.clone());
        if let Some(endpoint) = self.endpoint.get() {
            self.in_flight_at_completed
                .lock()
                .unwrap()
                .push(endpoint.in_flight());
        }
    }

    fn name(&self) -> &str {
        "recorder"
    }

    async fn faulted(&self, _: &ReceiveEndpointFaulted) {
        self.push("faulted");
    }
}

#[async_trait]
impl ReceiveObserver for Recorder {
    async fn receive_fault(&self, ctx: &ReceiveContext, error: &PipeError) {
        self.push(format!("fault:{}", ctx.delivery().delivery_tag));
        self.fault_labels.lock().unwrap().push(error.as_label());
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

/// Holds every delivery until permits are added.
struct Gate(Arc<Semaphore>);

#[async_trait]
impl Handler<ReceiveContext> for Gate {
    async fn handle(&self, _: &mut ReceiveContext) -> Result<(), PipeError> {
        self.0
            .acquire()
            .await
            .map_err(|e| PipeError::fault("gate", e))?
            .forget();
        Ok(())
    }
}

fn host() -> HostSettings {
    HostSettings::parse("loopback://localhost/test").unwrap()
}

fn recording_pipe(recorder: &Arc<Recorder>) -> recvisor::PipeBuilder<ReceiveContext> {
    let rec = Arc::clone(recorder);
    Pipe::builder().inspect(move |ctx: &ReceiveContext| {
        rec.push(format!("pipe:{}", ctx.delivery().delivery_tag));
    })
}

fn rejecting(
    body: &'static [u8],
) -> impl Fn(&mut ReceiveContext) -> Result<(), PipeError> + Send + Sync + 'static {
    move |ctx: &mut ReceiveContext| {
        if ctx.delivery().body.as_ref() == body {
            Err(PipeError::fault("validate", "rejected payload"))
        } else {
            Ok(())
        }
    }
}

async fn start(
    supervisor: &Supervisor,
    broker: &InMemoryBroker,
    settings: ReceiveSettings,
    pipe: Pipe<ReceiveContext>,
    recorder: &Arc<Recorder>,
) -> Result<ReceiveEndpoint, EndpointError> {
    ReceiveEndpoint::builder(supervisor, Arc::new(broker.clone()), host(), settings)
        .with_pipe(pipe)
        .with_endpoint_observers(vec![recorder.clone() as Arc<dyn ReceiveEndpointObserver>])
        .with_receive_observers(vec![recorder.clone() as Arc<dyn ReceiveObserver>])
        .start()
        .await
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

#[tokio::test]
async fn test_ready_is_observed_before_any_pipe_invocation() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    // Buffered messages are pushed while subscribe is still in progress.
    broker.publish(QUEUE, "a");
    broker.publish(QUEUE, "b");

    let pipe = recording_pipe(&recorder).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();
    assert_eq!(endpoint.state(), EndpointState::Ready);

    wait_until(|| recorder.count("pipe:") == 2).await;
    let log = recorder.log();
    assert_eq!(log[0], "ready");

    endpoint.stop().await.unwrap();
}

#[tokio::test]
async fn test_filter_fault_is_contained_and_counted() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let pipe = recording_pipe(&recorder).map(rejecting(b"bad")).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    broker.publish(QUEUE, "first");
    let bad = broker.publish(QUEUE, "bad");
    broker.publish(QUEUE, "third");

    wait_until(|| endpoint.metrics().delivery_count == 3 && endpoint.in_flight() == 0).await;
    assert!(recorder.log().contains(&format!("fault:{bad}")));

    let completed = endpoint.stop().await.unwrap();
    assert_eq!(completed.input_address.as_str(), "loopback://localhost/test/orders");
    assert_eq!(completed.metrics.delivery_count, 3);
    assert_eq!(completed.metrics.concurrent_delivery_count, 0);
    assert!(!completed.is_faulted());

    assert_eq!(recorder.count("fault:"), 1);
    assert_eq!(recorder.count("completed"), 1);
    assert_eq!(*recorder.fault_labels.lock().unwrap(), ["pipe_fault"]);
    assert_eq!(endpoint.state(), EndpointState::Completed);
}

#[tokio::test]
async fn test_double_stop_emits_one_completed() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let endpoint = start(
        &supervisor,
        &broker,
        ReceiveSettings::new(QUEUE),
        Pipe::empty(),
        &recorder,
    )
    .await
    .unwrap();
    recorder.watch(&endpoint);
    broker.publish(QUEUE, "x");
    wait_until(|| endpoint.metrics().delivery_count == 1).await;

    let (a, b) = tokio::join!(endpoint.stop(), endpoint.stop());
    let c = endpoint.stop().await.unwrap();

    assert_eq!(a.unwrap(), c);
    assert_eq!(b.unwrap(), c);
    assert_eq!(recorder.count("completed"), 1);
    assert_eq!(recorder.in_flight_at_completed(), [0]);
    assert!(!broker.is_subscribed(QUEUE));
}

#[tokio::test]
async fn test_subscribe_failure_never_signals_ready_or_completed() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    broker.reject_subscriptions(QUEUE, "access refused");
    let recorder = Arc::new(Recorder::default());

    let err = start(
        &supervisor,
        &broker,
        ReceiveSettings::new(QUEUE),
        Pipe::empty(),
        &recorder,
    )
    .await
    .unwrap_err();
    assert_eq!(err.as_label(), "endpoint_bind_failed");
    assert!(err.to_string().contains("access refused"));

    wait_until(|| supervisor.active_scopes().is_empty()).await;
    assert_eq!(recorder.log(), ["faulted"]);

    supervisor.shutdown().await.unwrap();
    assert_eq!(recorder.count("ready"), 0);
    assert_eq!(recorder.count("completed"), 0);
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_deliveries() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let gate = Arc::new(Semaphore::new(0));

    let pipe = Pipe::builder().handler(Gate(Arc::clone(&gate))).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    recorder.watch(&endpoint);
    broker.publish(QUEUE, "one");
    broker.publish(QUEUE, "two");
    wait_until(|| endpoint.in_flight() == 2).await;

    let mut stop = tokio_test::task::spawn(endpoint.stop());
    assert_pending!(stop.poll());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_pending!(stop.poll());
    assert_eq!(recorder.count("completed"), 0);
    assert_eq!(endpoint.state(), EndpointState::Stopping);

    gate.add_permits(2);
    let completed = loop {
        if let Poll::Ready(result) = stop.poll() {
            break result.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert_eq!(completed.metrics.delivery_count, 2);
    assert_eq!(completed.metrics.concurrent_delivery_count, 0);
    assert_eq!(completed.metrics.max_concurrent_delivery_count, 2);
    assert_eq!(recorder.count("completed"), 1);
    assert_eq!(recorder.in_flight_at_completed(), [0]);
}

#[tokio::test]
async fn test_delivery_during_cancel_is_processed_and_counted() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new().with_cancel_latency(Duration::from_millis(100));
    let recorder = Arc::new(Recorder::default());

    let pipe = recording_pipe(&recorder).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();
    broker.publish(QUEUE, "early");
    wait_until(|| recorder.count("pipe:") == 1).await;

    let stopping = {
        let endpoint = endpoint.clone();
        tokio::spawn(async move { endpoint.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(broker.is_subscribed(QUEUE), "cancel not yet acknowledged");
    let late = broker.publish(QUEUE, "late");

    let completed = stopping.await.unwrap().unwrap();
    assert_eq!(completed.metrics.delivery_count, 2);
    assert!(recorder.log().contains(&format!("pipe:{late}")));
    assert_eq!(broker.backlog_len(QUEUE), 0);
}

#[tokio::test]
async fn test_lost_connection_completes_faulted() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let endpoint = start(
        &supervisor,
        &broker,
        ReceiveSettings::new(QUEUE),
        Pipe::empty(),
        &recorder,
    )
    .await
    .unwrap();
    broker.publish(QUEUE, "x");
    wait_until(|| endpoint.metrics().delivery_count == 1).await;

    assert!(broker.sever(QUEUE, "socket closed"));
    let completed = endpoint.completed().await;
    assert!(completed.is_faulted());
    assert!(completed.faulted.as_deref().unwrap().contains("socket closed"));
    assert_eq!(completed.metrics.delivery_count, 1);
    assert_eq!(endpoint.state(), EndpointState::Faulted);

    // Stopping an already faulted endpoint returns the same completion.
    assert_eq!(endpoint.stop().await.unwrap(), completed);
    assert_eq!(recorder.count("completed"), 1);
}

#[tokio::test]
async fn test_lost_connection_drains_in_flight_before_completing() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let gate = Arc::new(Semaphore::new(0));

    let pipe = Pipe::builder().handler(Gate(Arc::clone(&gate))).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();
    recorder.watch(&endpoint);
    broker.publish(QUEUE, "one");
    broker.publish(QUEUE, "two");
    wait_until(|| endpoint.in_flight() == 2).await;

    assert!(broker.sever(QUEUE, "socket closed"));
    let mut draining = tokio_test::task::spawn(endpoint.completed());
    assert_pending!(draining.poll());
    wait_until(|| endpoint.state() == EndpointState::Stopping).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_pending!(draining.poll());
    assert_eq!(endpoint.in_flight(), 2);
    assert_eq!(recorder.count("completed"), 0);

    gate.add_permits(2);
    let completed = loop {
        if let Poll::Ready(event) = draining.poll() {
            break event;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert!(completed.is_faulted());
    assert_eq!(completed.metrics.delivery_count, 2);
    assert_eq!(completed.metrics.concurrent_delivery_count, 0);
    assert_eq!(endpoint.state(), EndpointState::Faulted);
    assert_eq!(recorder.in_flight_at_completed(), [0]);
}

#[tokio::test]
async fn test_delivery_from_foreign_thread_is_processed() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let pipe = recording_pipe(&recorder).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    let publisher = broker.clone();
    let tag = std::thread::spawn(move || publisher.publish(QUEUE, "foreign"))
        .join()
        .unwrap();
    wait_until(|| recorder.count("pipe:") == 1).await;
    assert!(recorder.log().contains(&format!("pipe:{tag}")));
    assert_eq!(broker.backlog_len(QUEUE), 0);

    let completed = endpoint.stop().await.unwrap();
    assert_eq!(completed.metrics.delivery_count, 1);
}

#[tokio::test]
async fn test_canceled_delivery_is_requeued() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new().with_cancel_latency(Duration::from_millis(100));
    let recorder = Arc::new(Recorder::default());

    let pipe = Pipe::builder()
        .map(|ctx: &mut ReceiveContext| ctx.check_canceled())
        .build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();
    let early = broker.publish(QUEUE, "early");
    wait_until(|| broker.settlements().len() == 1).await;

    let stopping = {
        let endpoint = endpoint.clone();
        tokio::spawn(async move { endpoint.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let late = broker.publish(QUEUE, "late");

    stopping.await.unwrap().unwrap();
    let settled: Vec<(u64, Settlement)> = broker
        .settlements()
        .into_iter()
        .map(|(_, delivery_tag, settlement)| (delivery_tag, settlement))
        .collect();
    assert_eq!(
        settled,
        [
            (early, Settlement::Ack),
            (late, Settlement::Reject { requeue: true })
        ]
    );
    assert_eq!(*recorder.fault_labels.lock().unwrap(), ["pipe_canceled"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_return_counter_to_zero() {
    struct Jitter;

    #[async_trait]
    impl Handler<ReceiveContext> for Jitter {
        async fn handle(&self, ctx: &mut ReceiveContext) -> Result<(), PipeError> {
            let ms = (ctx.delivery().delivery_tag * 7) % 13;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(())
        }
    }

    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let pipe = Pipe::builder().handler(Jitter).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    recorder.watch(&endpoint);
    for i in 0..50 {
        broker.publish(QUEUE, format!("message-{i}"));
    }
    wait_until(|| endpoint.metrics().delivery_count == 50 && endpoint.in_flight() == 0).await;

    let completed = endpoint.stop().await.unwrap();
    assert_eq!(completed.metrics.delivery_count, 50);
    assert_eq!(completed.metrics.concurrent_delivery_count, 0);
    assert!(completed.metrics.max_concurrent_delivery_count >= 1);

    let events = recorder.completed.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metrics.concurrent_delivery_count, 0);
    assert_eq!(recorder.in_flight_at_completed(), [0]);
}

#[tokio::test]
async fn test_manual_ack_settles_every_delivery() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let pipe = Pipe::builder().map(rejecting(b"bad")).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();
    let ok = broker.publish(QUEUE, "good");
    let bad = broker.publish(QUEUE, "bad");

    wait_until(|| broker.settlements().len() == 2).await;
    endpoint.stop().await.unwrap();

    let mut settled: Vec<(u64, Settlement)> = broker
        .settlements()
        .into_iter()
        .map(|(tag, delivery_tag, settlement)| {
            assert_eq!(tag, endpoint.consumer_tag());
            (delivery_tag, settlement)
        })
        .collect();
    settled.sort_by_key(|(tag, _)| *tag);
    assert_eq!(
        settled,
        [(ok, Settlement::Ack), (bad, Settlement::Reject { requeue: false })]
    );
}

#[tokio::test]
async fn test_auto_ack_does_not_settle() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let settings = ReceiveSettings::new(QUEUE).with_ack_mode(AckMode::Auto);
    let endpoint = start(&supervisor, &broker, settings, Pipe::empty(), &recorder)
        .await
        .unwrap();
    broker.publish(QUEUE, "x");
    wait_until(|| endpoint.metrics().delivery_count == 1).await;

    endpoint.stop().await.unwrap();
    assert!(broker.settlements().is_empty());
}

#[tokio::test]
async fn test_stop_timeout_is_escalated() {
    let cfg = Config {
        stop_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let supervisor = Supervisor::new(cfg);
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let gate = Arc::new(Semaphore::new(0));

    let pipe = Pipe::builder().handler(Gate(Arc::clone(&gate))).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();
    broker.publish(QUEUE, "stuck");
    wait_until(|| endpoint.in_flight() == 1).await;

    let err = endpoint.stop().await.unwrap_err();
    assert!(matches!(err, EndpointError::StopTimeout { in_flight: 1, .. }));
    assert_eq!(recorder.count("completed"), 0);

    // The drain continues after the timeout.
    gate.add_permits(1);
    let completed = endpoint.completed().await;
    assert_eq!(completed.metrics.delivery_count, 1);
    assert_eq!(recorder.count("completed"), 1);
}

#[tokio::test]
async fn test_panicking_filter_is_reported_as_fault() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let pipe = recording_pipe(&recorder)
        .map(|ctx: &mut ReceiveContext| {
            if ctx.delivery().body.as_ref() == b"boom" {
                panic!("handler bug");
            }
            Ok(())
        })
        .build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    broker.publish(QUEUE, "boom");
    broker.publish(QUEUE, "fine");
    wait_until(|| endpoint.metrics().delivery_count == 2 && endpoint.in_flight() == 0).await;

    assert_eq!(*recorder.fault_labels.lock().unwrap(), ["pipe_panicked"]);
    let completed = endpoint.stop().await.unwrap();
    assert_eq!(completed.metrics.delivery_count, 2);
}

#[tokio::test]
async fn test_contexts_carry_settings_payloads() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let rec = Arc::clone(&recorder);
    let pipe = Pipe::builder()
        .inspect(move |ctx: &ReceiveContext| {
            let queue = ctx
                .payloads()
                .get::<Arc<ReceiveSettings>>()
                .map(|s| s.queue_name.clone());
            let host = ctx
                .payloads()
                .get::<Arc<HostSettings>>()
                .map(|h| h.scope().to_string());
            rec.push(format!("payloads:{queue:?}:{host:?}"));
            assert!(!ctx.cancellation().is_cancelled());
        })
        .build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    broker.publish(QUEUE, "x");
    wait_until(|| recorder.count("payloads:") == 1).await;
    assert_eq!(recorder.count(r#"payloads:Some("orders"):Some("test")"#), 1);

    endpoint.stop().await.unwrap();
}

#[tokio::test]
async fn test_supervisor_shutdown_drains_every_endpoint() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let orders = start(
        &supervisor,
        &broker,
        ReceiveSettings::new("orders"),
        Pipe::empty(),
        &recorder,
    )
    .await
    .unwrap();
    let billing = start(
        &supervisor,
        &broker,
        ReceiveSettings::new("billing"),
        Pipe::empty(),
        &recorder,
    )
    .await
    .unwrap();
    assert_eq!(supervisor.active_scopes().len(), 2);

    supervisor.shutdown().await.unwrap();

    assert_eq!(orders.state(), EndpointState::Completed);
    assert_eq!(billing.state(), EndpointState::Completed);
    assert_eq!(recorder.count("completed"), 2);
    assert!(supervisor.active_scopes().is_empty());
}

#[tokio::test]
async fn test_probe_describes_endpoint_and_pipe() {
    let supervisor = Supervisor::new(Config::default());
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());

    let pipe = recording_pipe(&recorder).when(|_: &ReceiveContext| true).build();
    let endpoint = start(&supervisor, &broker, ReceiveSettings::new(QUEUE), pipe, &recorder)
        .await
        .unwrap();

    let probe = endpoint.probe();
    assert_eq!(probe.name, "ReceiveEndpoint");
    assert_eq!(
        probe.get("inputAddress"),
        Some(&serde_json::json!("loopback://localhost/test/orders"))
    );
    let stages: Vec<&str> = probe.children[0]
        .children
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(stages, ["inspect", "where"]);

    endpoint.stop().await.unwrap();
}
