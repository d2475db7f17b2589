//! Shared per-call stream state.
//!
//! One [`SharedState`] is owned by one bridge instance and shared, by
//! reference, across its three concurrent loops and nothing else. Every
//! mutable field lives in a single struct behind one mutex, and the loops
//! touch it only through the accessor operations below, so each
//! read-modify-write is serialized.
//!
//! The connection-active flag is a [`CancellationToken`]: a one-way latch
//! that also wakes loops blocked on channel reads when any of them decides
//! the call is over.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::session::Session;

/// What the silence watchdog should do after inspecting the stream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Nothing to do this tick
    Idle,
    /// Caller finished their turn; commit the buffer and request a response
    TriggerResponse,
    /// No audio for too long; treat the call as dropped
    Abandon,
}

/// Snapshot taken when a barge-in begins, after the state has been reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptSnapshot {
    /// The spoken item that was playing
    pub item_id: String,
    /// Milliseconds of the response already delivered to the caller
    pub elapsed_ms: u64,
}

/// Mutable per-call fields, all guarded together.
#[derive(Debug)]
struct StreamState {
    /// Stream identifier, set on the `start` frame
    stream_sid: Option<String>,
    /// Timestamp of the most recent inbound audio frame (telephony clock, ms)
    latest_media_timestamp: u64,
    /// Voice API item currently being spoken, if any
    last_spoken_item_id: Option<String>,
    /// `latest_media_timestamp` when the current response began playing
    response_start_timestamp: Option<u64>,
    /// Outstanding boundary markers sent to telephony
    pending_acks: VecDeque<String>,
    /// True exactly while a response is being generated/played
    response_active: bool,
    /// Wall-clock instant of the most recent inbound audio frame
    last_media_received_at: Instant,
    /// Usage budget for this call; present between `start` and teardown
    session: Option<Session>,
}

/// The bridge's shared state: stream fields plus the connection latch.
#[derive(Debug)]
pub struct SharedState {
    inner: Mutex<StreamState>,
    /// Set exactly once, by whichever loop first decides to terminate
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl SharedState {
    /// Fresh state for one bridge instance.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StreamState {
                stream_sid: None,
                latest_media_timestamp: 0,
                last_spoken_item_id: None,
                response_start_timestamp: None,
                pending_acks: VecDeque::new(),
                response_active: false,
                last_media_received_at: Instant::now(),
                session: None,
            }),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Connection latch
    // -------------------------------------------------------------------------

    /// Whether the connection is still live.
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Latch the connection closed.
    ///
    /// Returns true for the caller that performed the transition, so
    /// close-exactly-once actions (goodbye, telephony close frame) can key
    /// off it. The latch never reopens.
    pub fn deactivate(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        if first {
            self.shutdown.cancel();
        }
        first
    }

    /// Token the loops select on to observe cancellation.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // -------------------------------------------------------------------------
    // Stream lifecycle
    // -------------------------------------------------------------------------

    /// Begin a stream: store the identifier, install the session, and reset
    /// every per-response field.
    pub fn start_stream(&self, stream_sid: String, session: Session) {
        let mut st = self.inner.lock();
        st.stream_sid = Some(stream_sid);
        st.latest_media_timestamp = 0;
        st.last_spoken_item_id = None;
        st.response_start_timestamp = None;
        st.pending_acks.clear();
        st.response_active = false;
        st.last_media_received_at = Instant::now();
        st.session = Some(session);
    }

    /// Tear the session out of the state, returning it for final logging.
    pub fn end_stream(&self) -> Option<Session> {
        self.inner.lock().session.take()
    }

    /// The stream identifier, once known.
    pub fn stream_sid(&self) -> Option<String> {
        self.inner.lock().stream_sid.clone()
    }

    /// Whether a session currently exists (between `start` and teardown).
    pub fn has_session(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// Whether the session exists and is still within budget.
    pub fn session_active(&self) -> bool {
        self.inner
            .lock()
            .session
            .as_ref()
            .is_some_and(Session::is_active)
    }

    /// Record usage against the session.
    ///
    /// Returns `None` when no session exists yet, otherwise whether the
    /// conversation may continue.
    pub fn record_usage(&self, text: &str) -> Option<bool> {
        let mut st = self.inner.lock();
        st.session.as_mut().map(|s| s.record_usage(text))
    }

    // -------------------------------------------------------------------------
    // Media bookkeeping
    // -------------------------------------------------------------------------

    /// Note an inbound audio frame.
    ///
    /// The telephony clock is non-decreasing within a stream; the stored
    /// timestamp is clamped so the invariant holds even against a
    /// misbehaving peer.
    pub fn note_media(&self, timestamp: u64) {
        let mut st = self.inner.lock();
        st.latest_media_timestamp = st.latest_media_timestamp.max(timestamp);
        st.last_media_received_at = Instant::now();
    }

    /// Timestamp of the most recent inbound audio frame.
    pub fn latest_media_timestamp(&self) -> u64 {
        self.inner.lock().latest_media_timestamp
    }

    /// Note an outbound audio delta: anchor the playback-offset baseline on
    /// the first delta of a response and remember the spoken item.
    pub fn note_audio_delta(&self, item_id: Option<&str>) {
        let mut st = self.inner.lock();
        if st.response_start_timestamp.is_none() {
            st.response_start_timestamp = Some(st.latest_media_timestamp);
        }
        if let Some(id) = item_id {
            st.last_spoken_item_id = Some(id.to_string());
        }
    }

    /// Push a boundary marker that is now outstanding on the telephony side.
    pub fn push_ack(&self, label: &str) {
        self.inner.lock().pending_acks.push_back(label.to_string());
    }

    /// Pop one outstanding marker; no-op when the queue is empty.
    pub fn pop_ack(&self) {
        self.inner.lock().pending_acks.pop_front();
    }

    /// Number of outstanding boundary markers.
    pub fn pending_ack_count(&self) -> usize {
        self.inner.lock().pending_acks.len()
    }

    /// The item currently being spoken, if any.
    pub fn speaking_item(&self) -> Option<String> {
        self.inner.lock().last_spoken_item_id.clone()
    }

    // -------------------------------------------------------------------------
    // Response state
    // -------------------------------------------------------------------------

    /// A response started generating.
    pub fn begin_response(&self) {
        self.inner.lock().response_active = true;
    }

    /// The in-flight response finished (or was rejected).
    pub fn end_response(&self) {
        self.inner.lock().response_active = false;
    }

    /// Whether a response is currently in flight.
    pub fn response_active(&self) -> bool {
        self.inner.lock().response_active
    }

    /// Begin a barge-in: atomically take the spoken item, compute the
    /// playback offset, and reset every per-response field.
    ///
    /// Returns `None` when nothing is being spoken, in which case the
    /// speech-started signal needs no interruption.
    pub fn begin_interrupt(&self) -> Option<InterruptSnapshot> {
        let mut st = self.inner.lock();
        let item_id = st.last_spoken_item_id.take()?;
        let elapsed_ms = st
            .latest_media_timestamp
            .saturating_sub(st.response_start_timestamp.unwrap_or(st.latest_media_timestamp));
        st.pending_acks.clear();
        st.response_start_timestamp = None;
        st.response_active = false;
        Some(InterruptSnapshot {
            item_id,
            elapsed_ms,
        })
    }

    /// One watchdog inspection.
    ///
    /// Decides, under the lock, whether the caller's turn ended or the call
    /// was abandoned. A `TriggerResponse` verdict marks the response active
    /// in the same critical section, so a second tick in the same silence
    /// window cannot trigger again.
    pub fn watchdog_tick(
        &self,
        silence_threshold: std::time::Duration,
        disconnect_threshold: std::time::Duration,
    ) -> WatchdogVerdict {
        let mut st = self.inner.lock();
        let Some(session) = st.session.as_ref() else {
            return WatchdogVerdict::Idle;
        };
        let quiet_for = st.last_media_received_at.elapsed();
        if quiet_for >= disconnect_threshold {
            return WatchdogVerdict::Abandon;
        }
        if session.is_active() && quiet_for >= silence_threshold && !st.response_active {
            st.response_active = true;
            return WatchdogVerdict::TriggerResponse;
        }
        WatchdogVerdict::Idle
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
