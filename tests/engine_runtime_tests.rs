use async_trait::async_trait;
use frameguard::bridge::MessageBridge;
use frameguard::config::GuardConfig;
use frameguard::connection::mock::{MockConnector, MockStateless};
use frameguard::connection::{ChannelConnector, ConnectionPhase, StatelessTransport};
use frameguard::core::{BackgroundToPage, EncodedFrame, GuardError, StreamId};
use frameguard::engine::{AlertSink, BackgroundRuntime, FrameSource, PageRuntime};
use frameguard::observability::{MetricsCollector, PageMetrics};
use frameguard::smoothing::{AlertLevel, AlertUpdate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Yields `remaining` frames, then nothing.
struct FiniteSource {
    remaining: u32,
}

#[async_trait]
impl FrameSource for FiniteSource {
    async fn capture(&mut self) -> Result<Option<EncodedFrame>, GuardError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(EncodedFrame::new(format!(
            "data:image/jpeg;base64,{}",
            self.remaining
        ))))
    }
}

type Rendered = Arc<Mutex<Vec<(Option<StreamId>, AlertUpdate)>>>;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition never became true");
}

struct System {
    bridge: MessageBridge,
    collector: MetricsCollector,
    connector: Arc<MockConnector>,
    stateless: Arc<MockStateless>,
    background: frameguard::engine::BackgroundHandle,
}

fn start_system(connector: MockConnector) -> System {
    start_system_with(connector, GuardConfig::default())
}

fn start_system_with(connector: MockConnector, config: GuardConfig) -> System {
    let (bridge, inbox) = MessageBridge::new();
    let collector = MetricsCollector::new();
    let connector = Arc::new(connector);
    let stateless = Arc::new(MockStateless::new());

    let dyn_connector: Arc<dyn ChannelConnector> = connector.clone();
    let dyn_stateless: Arc<dyn StatelessTransport> = stateless.clone();
    let background = BackgroundRuntime::new(
        &config,
        dyn_connector,
        dyn_stateless,
        bridge.clone(),
        inbox,
        collector.connection(),
    )
    .spawn();

    System {
        bridge,
        collector,
        connector,
        stateless,
        background,
    }
}

fn recording_sink() -> (Box<dyn AlertSink>, Rendered) {
    let rendered: Rendered = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&rendered);
    let sink = move |stream: Option<&StreamId>, update: &AlertUpdate| {
        sink_log.lock().unwrap().push((stream.cloned(), *update));
    };
    (Box::new(sink), rendered)
}

fn start_page(system: &System) -> (frameguard::engine::PageHandle, Rendered) {
    let port = system.bridge.open_page();
    let metrics = system.collector.register_page(port.page_id().to_string());
    let (sink, rendered) = recording_sink();
    let (_toggle, enabled) = watch::channel(true);

    let page = PageRuntime::new(port, sink, enabled, Duration::from_secs(1), metrics)
        .spawn(system.bridge.clone());
    (page, rendered)
}

#[tokio::test(start_paused = true)]
async fn test_channel_scores_escalate_to_danger() {
    let mut system = start_system(MockConnector::new());
    system
        .background
        .wait_for_phase(ConnectionPhase::Connected)
        .await
        .unwrap();

    let (page, rendered) = start_page(&system);
    let stream = page
        .start_stream(Box::new(FiniteSource { remaining: 3 }))
        .await
        .unwrap();

    let connector = Arc::clone(&system.connector);
    wait_until(|| connector.written().len() == 3).await;
    for text in system.connector.written() {
        let wire: serde_json::Value = serde_json::from_str(&text).unwrap();
        let frame_id = wire["frame_id"].as_str().unwrap();
        assert!(system
            .connector
            .push_inbound(format!(r#"{{"frame_id":"{}","score":0.9}}"#, frame_id)));
    }

    wait_until(|| rendered.lock().unwrap().len() == 3).await;
    let levels: Vec<AlertLevel> = rendered
        .lock()
        .unwrap()
        .iter()
        .map(|(rendered_stream, update)| {
            assert_eq!(rendered_stream.as_ref(), Some(&stream));
            update.level
        })
        .collect();
    assert_eq!(levels, vec![AlertLevel::Safe, AlertLevel::Safe, AlertLevel::Danger]);

    let page_id = page.page_id().to_string();
    page.close().await.unwrap();
    system.background.shutdown().await.unwrap();

    let page_metrics = system.collector.get_page_metrics(&page_id).unwrap();
    assert_eq!(page_metrics.frames_sampled(), 3);
    assert_eq!(page_metrics.scores_received(), 3);
    assert_eq!(page_metrics.danger_updates(), 1);
    assert_eq!(system.collector.connection_snapshot().routed_scores, 3);
    assert_eq!(system.stateless.requests().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_channel_falls_back_to_stateless() {
    let system = start_system(MockConnector::failing(1_000));
    system.stateless.respond_with(0.5);
    system.stateless.respond_with(0.5);

    let (page, rendered) = start_page(&system);
    page.start_stream(Box::new(FiniteSource { remaining: 2 }))
        .await
        .unwrap();

    wait_until(|| rendered.lock().unwrap().len() == 2).await;
    assert!(rendered
        .lock()
        .unwrap()
        .iter()
        .all(|(_, update)| update.level == AlertLevel::Warning));
    assert_eq!(system.stateless.requests().len(), 2);
    assert_ne!(system.background.phase(), ConnectionPhase::Connected);
    assert!(system.collector.connection_snapshot().reconnects_scheduled >= 1);

    page.close().await.unwrap();
    system.background.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stopped_stream_forgets_state() {
    let system = start_system(MockConnector::failing(1_000));
    let (page, rendered) = start_page(&system);

    let stream = page
        .start_stream(Box::new(FiniteSource { remaining: 1 }))
        .await
        .unwrap();
    wait_until(|| rendered.lock().unwrap().len() == 1).await;

    page.stop_stream(stream.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A late reply for the stopped stream and an uncorrelated score both find no listener.
    assert!(system.bridge.send_to(
        page.page_id(),
        BackgroundToPage::Score {
            stream_id: Some(stream),
            score: 0.9,
        }
    ));
    system.bridge.broadcast(BackgroundToPage::Score {
        stream_id: None,
        score: 0.9,
    });
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(rendered.lock().unwrap().len(), 1);

    page.close().await.unwrap();
    system.background.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_page_ignores_scores_for_streams_it_does_not_track() {
    let (bridge, _inbox) = MessageBridge::new();
    let port = bridge.open_page();
    let (sink, rendered) = recording_sink();
    let (_toggle, enabled) = watch::channel(true);
    let mut page = PageRuntime::new(
        port,
        sink,
        enabled,
        Duration::from_secs(1),
        Arc::new(PageMetrics::new("page-1")),
    );

    page.handle_message(BackgroundToPage::Score {
        stream_id: Some(StreamId::new("vid-other-page")),
        score: 0.9,
    });
    page.handle_message(BackgroundToPage::Score {
        stream_id: None,
        score: 0.9,
    });

    assert!(page.tracker().is_empty());
    assert!(!page.is_listening(&StreamId::new("vid-other-page")));
    assert!(rendered.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_reaches_only_the_listening_page() {
    let system = start_system(MockConnector::failing(1_000));
    let (sampling, sampling_rendered) = start_page(&system);
    let (idle, idle_rendered) = start_page(&system);

    let stream = sampling
        .start_stream(Box::new(FiniteSource { remaining: 1 }))
        .await
        .unwrap();
    wait_until(|| sampling_rendered.lock().unwrap().len() == 1).await;

    system.bridge.broadcast(BackgroundToPage::Score {
        stream_id: Some(stream.clone()),
        score: 0.2,
    });
    wait_until(|| sampling_rendered.lock().unwrap().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(sampling_rendered.lock().unwrap()[1].0, Some(stream));
    assert!(idle_rendered.lock().unwrap().is_empty());

    sampling.close().await.unwrap();
    idle.close().await.unwrap();
    system.background.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unattributed_score_renders_its_own_banner() {
    let system = start_system(MockConnector::failing(1_000));
    let (page, rendered) = start_page(&system);

    page.start_stream(Box::new(FiniteSource { remaining: 1 }))
        .await
        .unwrap();
    wait_until(|| rendered.lock().unwrap().len() == 1).await;

    for _ in 0..3 {
        system.bridge.broadcast(BackgroundToPage::Score {
            stream_id: None,
            score: 0.9,
        });
    }
    wait_until(|| rendered.lock().unwrap().len() == 4).await;

    let rendered = rendered.lock().unwrap();
    assert!(rendered[0].0.is_some());
    assert_eq!(rendered[0].1.level, AlertLevel::Safe);
    assert!(rendered[1..].iter().all(|(stream, _)| stream.is_none()));
    assert_eq!(rendered[3].1.level, AlertLevel::Danger);
    drop(rendered);

    page.close().await.unwrap();
    system.background.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_page_surface_frames_are_scored() {
    let system = start_system(MockConnector::failing(1_000));
    system.stateless.respond_with(0.2);
    let (page, rendered) = start_page(&system);

    let posted = frameguard::core::message::encode_envelope(
        &frameguard::core::PageToBackground::Frame {
            image: EncodedFrame::new("data:image/jpeg;base64,AAAA"),
            stream_id: StreamId::new("vid-injected"),
        },
    )
    .unwrap();
    page.post_from_page(posted);

    wait_until(|| rendered.lock().unwrap().len() == 1).await;
    let (stream, update) = rendered.lock().unwrap()[0].clone();
    assert_eq!(stream, Some(StreamId::new("vid-injected")));
    assert_eq!(update.level, AlertLevel::Safe);

    page.close().await.unwrap();
    system.background.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_page_reconnect_request_skips_backoff_wait() {
    let config = GuardConfig {
        backoff_floor_ms: 600_000,
        backoff_ceiling_ms: 600_000,
        ..GuardConfig::default()
    };
    let mut system = start_system_with(MockConnector::failing(1), config);
    let collector = system.collector.clone();
    wait_until(|| collector.connection_snapshot().reconnects_scheduled == 1).await;

    let (page, _rendered) = start_page(&system);
    let asked_at = Instant::now();
    assert!(page.request_reconnect());
    system
        .background
        .wait_for_phase(ConnectionPhase::Connected)
        .await
        .unwrap();

    assert!(asked_at.elapsed() < Duration::from_secs(600));
    assert_eq!(system.connector.open_attempts(), 2);

    page.close().await.unwrap();
    system.background.shutdown().await.unwrap();
}
