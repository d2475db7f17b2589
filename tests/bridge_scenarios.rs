//! End-to-end bridge scenarios.
//!
//! These tests drive a [`MediaBridge`] through in-process channels standing
//! in for the two sockets, with paused tokio time so the 500 ms turn-end
//! and 5 s abandonment thresholds run deterministically and instantly.
//! No network is involved.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use callbridge::core::bridge::{
    BridgeChannels, BridgeConfig, MediaBridge, SharedState,
};
use callbridge::core::realtime::{ClientEvent, VoiceEvent};
use callbridge::core::telephony::{OutboundFrame, TelephonyFrame, TelephonyRoute};

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    /// Feeds parsed telephony frames into the bridge
    frames: mpsc::Sender<TelephonyFrame>,
    /// Feeds parsed voice events into the bridge
    events: mpsc::Sender<VoiceEvent>,
    /// What the bridge sends toward telephony
    to_telephony: mpsc::Receiver<TelephonyRoute>,
    /// What the bridge sends toward the voice API
    to_voice: mpsc::Receiver<ClientEvent>,
    /// Shared stream state, for property assertions
    state: Arc<SharedState>,
    /// The running bridge
    bridge: JoinHandle<()>,
}

fn spawn_bridge(config: BridgeConfig) -> Harness {
    let (frame_tx, frame_rx) = mpsc::channel(64);
    let (route_tx, route_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (client_tx, client_rx) = mpsc::channel(64);

    let bridge = MediaBridge::new(config);
    let state = bridge.state();
    let handle = tokio::spawn(bridge.run(BridgeChannels {
        telephony_rx: frame_rx,
        telephony_tx: route_tx,
        voice_rx: event_rx,
        voice_tx: client_tx,
    }));

    Harness {
        frames: frame_tx,
        events: event_tx,
        to_telephony: route_rx,
        to_voice: client_rx,
        state,
        bridge: handle,
    }
}

fn start_frame(stream_sid: &str) -> TelephonyFrame {
    let json = serde_json::json!({
        "event": "start",
        "start": { "streamSid": stream_sid },
    });
    TelephonyFrame::parse(&json.to_string()).unwrap()
}

fn media_frame(timestamp: u64) -> TelephonyFrame {
    let json = serde_json::json!({
        "event": "media",
        "media": { "timestamp": timestamp, "payload": "dGVzdA==" },
    });
    TelephonyFrame::parse(&json.to_string()).unwrap()
}

fn stop_frame() -> TelephonyFrame {
    TelephonyFrame::parse(r#"{"event":"stop"}"#).unwrap()
}

fn audio_delta(item_id: &str) -> VoiceEvent {
    let json = serde_json::json!({
        "type": "response.audio.delta",
        "delta": "c3BlZWNo",
        "item_id": item_id,
    });
    VoiceEvent::parse(&json.to_string()).unwrap()
}

fn speech_started() -> VoiceEvent {
    VoiceEvent::parse(r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":10}"#)
        .unwrap()
}

fn content_part(content: &str) -> VoiceEvent {
    let json = serde_json::json!({
        "type": "response.content.part",
        "content": content,
    });
    VoiceEvent::parse(&json.to_string()).unwrap()
}

/// Collect everything the bridge sent toward the voice API. Completes once
/// the bridge has shut down and dropped its senders.
async fn drain_voice(mut rx: mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut sent = Vec::new();
    while let Some(event) = rx.recv().await {
        sent.push(event);
    }
    sent
}

/// Collect everything the bridge sent toward telephony.
async fn drain_telephony(mut rx: mpsc::Receiver<TelephonyRoute>) -> Vec<TelephonyRoute> {
    let mut sent = Vec::new();
    while let Some(route) = rx.recv().await {
        sent.push(route);
    }
    sent
}

/// Receive voice-bound events until one matches, returning it.
async fn expect_voice_event<F>(rx: &mut mpsc::Receiver<ClientEvent>, mut matches: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    loop {
        let event = rx.recv().await.expect("voice channel closed early");
        if matches(&event) {
            return event;
        }
    }
}

fn count_commits(sent: &[ClientEvent]) -> usize {
    sent.iter()
        .filter(|e| matches!(e, ClientEvent::InputAudioBufferCommit))
        .count()
}

fn count_creates(sent: &[ClientEvent]) -> usize {
    sent.iter()
        .filter(|e| matches!(e, ClientEvent::ResponseCreate))
        .count()
}

fn count_closes(routes: &[TelephonyRoute]) -> usize {
    routes
        .iter()
        .filter(|r| matches!(r, TelephonyRoute::Close))
        .count()
}

// =============================================================================
// Scenarios
// =============================================================================

/// start -> media at 0/100/200ms -> 500ms of silence must produce exactly
/// one commit followed by exactly one response request, then abandonment
/// closes the call after 5s.
#[tokio::test(start_paused = true)]
async fn silence_triggers_exactly_one_commit_and_response() {
    let h = spawn_bridge(BridgeConfig::default());

    h.frames.send(start_frame("MZ1")).await.unwrap();
    for timestamp in [0, 100, 200] {
        h.frames.send(media_frame(timestamp)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Silence from here on: the watchdog triggers one response at 500ms and
    // abandons the call at 5s, ending the bridge.
    h.bridge.await.unwrap();

    let sent = drain_voice(h.to_voice).await;
    let appends = sent
        .iter()
        .filter(|e| matches!(e, ClientEvent::InputAudioBufferAppend { .. }))
        .count();
    assert_eq!(appends, 3);
    assert_eq!(count_commits(&sent), 1);
    assert_eq!(count_creates(&sent), 1);

    // The commit precedes the response request
    let commit_at = sent
        .iter()
        .position(|e| matches!(e, ClientEvent::InputAudioBufferCommit))
        .unwrap();
    let create_at = sent
        .iter()
        .position(|e| matches!(e, ClientEvent::ResponseCreate))
        .unwrap();
    assert!(commit_at < create_at);

    let routes = drain_telephony(h.to_telephony).await;
    assert_eq!(count_closes(&routes), 1);

    assert_eq!(h.state.latest_media_timestamp(), 200);
    assert!(!h.state.has_session());
    assert!(!h.state.is_active());
}

/// An audio delta for item "abc" followed by a speech-started signal must
/// produce a truncate for "abc" at offset 0, then a clear frame, exactly
/// once, leaving no pending marks.
#[tokio::test(start_paused = true)]
async fn barge_in_truncates_and_clears_once() {
    let mut h = spawn_bridge(BridgeConfig::default());

    h.frames.send(start_frame("MZ1")).await.unwrap();
    h.frames.send(media_frame(0)).await.unwrap();
    h.events.send(audio_delta("abc")).await.unwrap();

    // Assistant audio reaches telephony, followed by a boundary marker
    let first = h.to_telephony.recv().await.unwrap();
    assert!(matches!(
        first,
        TelephonyRoute::Frame(OutboundFrame::Media { .. })
    ));
    let second = h.to_telephony.recv().await.unwrap();
    assert!(matches!(
        second,
        TelephonyRoute::Frame(OutboundFrame::Mark { .. })
    ));

    h.events.send(speech_started()).await.unwrap();

    let truncate = expect_voice_event(&mut h.to_voice, |e| {
        matches!(e, ClientEvent::ConversationItemTruncate { .. })
    })
    .await;
    match truncate {
        ClientEvent::ConversationItemTruncate {
            item_id,
            content_index,
            audio_end_ms,
        } => {
            assert_eq!(item_id, "abc");
            assert_eq!(content_index, 0);
            assert_eq!(audio_end_ms, 0);
        }
        _ => unreachable!(),
    }

    let cleared = h.to_telephony.recv().await.unwrap();
    assert!(matches!(
        cleared,
        TelephonyRoute::Frame(OutboundFrame::Clear { .. })
    ));

    assert_eq!(h.state.pending_ack_count(), 0);
    assert!(h.state.speaking_item().is_none());

    // A second speech-started with nothing playing must not clear again
    h.events.send(speech_started()).await.unwrap();
    h.frames.send(stop_frame()).await.unwrap();
    h.bridge.await.unwrap();

    let routes = drain_telephony(h.to_telephony).await;
    let clears = routes
        .iter()
        .filter(|r| matches!(r, TelephonyRoute::Frame(OutboundFrame::Clear { .. })))
        .count();
    assert_eq!(clears, 0);
    assert_eq!(count_closes(&routes), 1);
}

/// Content events whose estimated cost crosses the budget must produce
/// exactly one goodbye utterance and then close the telephony channel.
#[tokio::test(start_paused = true)]
async fn budget_exhaustion_sends_one_goodbye_then_closes() {
    let config = BridgeConfig {
        session_budget: 10.0,
        goodbye: "Time is up, thank you for calling.".to_string(),
        ..BridgeConfig::default()
    };
    let h = spawn_bridge(config);

    h.frames.send(start_frame("MZ1")).await.unwrap();
    // 5 words (6.5 estimated tokens) stays within budget; the next crosses
    h.events
        .send(content_part("one two three four five"))
        .await
        .unwrap();
    h.events
        .send(content_part("six seven eight nine ten"))
        .await
        .unwrap();
    h.events
        .send(content_part("content after the budget latched"))
        .await
        .unwrap();

    h.bridge.await.unwrap();

    let sent = drain_voice(h.to_voice).await;
    let goodbyes: Vec<_> = sent
        .iter()
        .filter_map(|e| match e {
            ClientEvent::ConversationItemAdd { item } => Some(item),
            _ => None,
        })
        .collect();
    assert_eq!(goodbyes.len(), 1);
    assert_eq!(goodbyes[0].role, "assistant");
    assert_eq!(goodbyes[0].content, "Time is up, thank you for calling.");

    let routes = drain_telephony(h.to_telephony).await;
    assert_eq!(count_closes(&routes), 1);
    assert!(!h.state.is_active());
}

/// No inbound media for 5s must deregister the session and close the
/// telephony channel exactly once.
#[tokio::test(start_paused = true)]
async fn abandonment_closes_exactly_once() {
    let h = spawn_bridge(BridgeConfig::default());

    h.frames.send(start_frame("MZ1")).await.unwrap();
    h.frames.send(media_frame(0)).await.unwrap();

    h.bridge.await.unwrap();

    let routes = drain_telephony(h.to_telephony).await;
    assert_eq!(count_closes(&routes), 1);
    assert!(!h.state.has_session());
    assert!(!h.state.is_active());
}

/// A stop frame tears the bridge down without any turn-taking activity.
#[tokio::test(start_paused = true)]
async fn stop_frame_tears_down_cleanly() {
    let h = spawn_bridge(BridgeConfig::default());

    h.frames.send(start_frame("MZ1")).await.unwrap();
    h.frames.send(media_frame(0)).await.unwrap();
    h.frames.send(stop_frame()).await.unwrap();

    h.bridge.await.unwrap();

    let sent = drain_voice(h.to_voice).await;
    assert_eq!(count_commits(&sent), 0);
    assert_eq!(count_creates(&sent), 0);

    let routes = drain_telephony(h.to_telephony).await;
    assert_eq!(count_closes(&routes), 1);
    assert!(!h.state.has_session());
    assert!(!h.state.is_active());
}

/// The stored media timestamp always tracks the most recent frame.
#[tokio::test(start_paused = true)]
async fn media_timestamps_track_the_latest_frame() {
    let mut h = spawn_bridge(BridgeConfig::default());

    h.frames.send(start_frame("MZ1")).await.unwrap();
    for timestamp in [0, 40, 160, 200] {
        h.frames.send(media_frame(timestamp)).await.unwrap();
    }

    // Wait until all four frames have been relayed before asserting
    for _ in 0..4 {
        expect_voice_event(&mut h.to_voice, |e| {
            matches!(e, ClientEvent::InputAudioBufferAppend { .. })
        })
        .await;
    }
    assert_eq!(h.state.latest_media_timestamp(), 200);

    h.frames.send(stop_frame()).await.unwrap();
    h.bridge.await.unwrap();
}

/// Media arriving before a start frame still advances the clock but is
/// never forwarded to the voice channel.
#[tokio::test(start_paused = true)]
async fn media_without_a_session_is_not_forwarded() {
    let h = spawn_bridge(BridgeConfig::default());

    h.frames.send(media_frame(50)).await.unwrap();
    h.frames.send(stop_frame()).await.unwrap();

    h.bridge.await.unwrap();

    let sent = drain_voice(h.to_voice).await;
    let appends = sent
        .iter()
        .filter(|e| matches!(e, ClientEvent::InputAudioBufferAppend { .. }))
        .count();
    assert_eq!(appends, 0);
    assert_eq!(h.state.latest_media_timestamp(), 50);
}
