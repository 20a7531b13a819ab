//! Streaming reconciliation of completion tokens into message edits.
//!
//! A [`StreamReconciler`] owns the timing policy; each turn gets its own
//! [`StreamingSession`] holding the accumulated and published text. All state
//! changes for a session happen inside one `drive` call, so ticks, token
//! arrival and edit results never race each other.

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream, StreamExt};
use log::{debug, info, warn};
use memobot_config::StreamingConfig;
use memobot_protocol::{ChatRef, CompletionEvent, MessageRef, MessagingTransport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Timing policy for a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Interval between periodic edits.
    pub tick_interval: Duration,
    /// Hard ceiling on streaming edits, measured from `open`.
    pub deadline: Duration,
    /// How long a timed out session waits for a late completion.
    pub late_completion_grace: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

impl From<&StreamingConfig> for ReconcilerConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            deadline: config.deadline(),
            late_completion_grace: config.late_completion_grace(),
        }
    }
}

/// Lifecycle of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Failed,
    TimedOut,
}

/// Reconciliation state for one in-flight response.
#[derive(Debug, Clone)]
pub struct StreamingSession {
    accumulated: String,
    published: String,
    last_attempt: Option<String>,
    target: MessageRef,
    deadline: Instant,
    state: SessionState,
}

impl StreamingSession {
    fn new(target: MessageRef, deadline: Instant) -> Self {
        Self {
            accumulated: String::new(),
            published: String::new(),
            last_attempt: None,
            target,
            deadline,
            state: SessionState::Idle,
        }
    }

    /// Every token received so far, in arrival order.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Text last acknowledged by the transport.
    pub fn published(&self) -> &str {
        &self.published
    }

    /// Message being edited.
    pub fn target(&self) -> &MessageRef {
        &self.target
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            "streaming session transition (message_id={}, from={:?}, to={:?})",
            self.target.message_id, self.state, next
        );
        self.state = next;
    }

    /// Text a tick should publish, if any.
    ///
    /// Skips when nothing changed since the last acknowledged edit or since
    /// the last attempted one.
    fn tick_text(&self) -> Option<String> {
        if self.accumulated == self.published {
            return None;
        }
        if self.last_attempt.as_deref() == Some(self.accumulated.as_str()) {
            return None;
        }
        Some(self.accumulated.clone())
    }

    fn apply_edit(&mut self, text: String, result: Result<(), TransportError>) {
        match result {
            Ok(()) => {
                debug!(
                    "published streaming edit (message_id={}, len={})",
                    self.target.message_id,
                    text.len()
                );
                self.published = text;
            }
            Err(err) => {
                warn!(
                    "streaming edit failed (message_id={}, error={})",
                    self.target.message_id, err
                );
            }
        }
    }
}

/// Terminal result of driving a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Provider finished; carries its final text.
    Completed { final_text: String },
    /// Provider failed or the event stream ended without a result.
    Failed { error: String },
    /// Deadline elapsed; `late_final` holds a completion that arrived during
    /// the grace period.
    TimedOut { late_final: Option<String> },
}

type EditFuture = BoxFuture<'static, (String, Result<(), TransportError>)>;

/// Coalesces completion events into rate-limited edits of one message.
#[derive(Clone)]
pub struct StreamReconciler {
    transport: Arc<dyn MessagingTransport>,
    config: ReconcilerConfig,
}

impl StreamReconciler {
    pub fn new(transport: Arc<dyn MessagingTransport>, config: ReconcilerConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Send the placeholder message and start a session bound to it.
    pub async fn open(
        &self,
        chat: &ChatRef,
        reply_to: Option<&str>,
        placeholder: &str,
    ) -> Result<StreamingSession, TransportError> {
        let target = self.transport.send(chat, placeholder, reply_to).await?;
        let mut session = StreamingSession::new(target, Instant::now() + self.config.deadline);
        session.transition(SessionState::Streaming);
        Ok(session)
    }

    /// Consume completion events until the session reaches a terminal state.
    ///
    /// Tick and deadline timers live only for the duration of this call.
    pub async fn drive<S>(&self, session: &mut StreamingSession, mut events: S) -> StreamOutcome
    where
        S: Stream<Item = CompletionEvent> + Unpin,
    {
        let period = self.config.tick_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = time::sleep_until(session.deadline);
        tokio::pin!(deadline);
        let mut in_flight: Option<EditFuture> = None;

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    session.transition(SessionState::TimedOut);
                    return self.finish_timed_out(session, in_flight.take(), &mut events).await;
                }
                (text, result) = settle(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    session.apply_edit(text, result);
                }
                _ = ticker.tick() => {
                    if in_flight.is_some() {
                        debug!(
                            "edit still in flight; skipping tick (message_id={})",
                            session.target.message_id
                        );
                    } else if let Some(text) = session.tick_text() {
                        session.last_attempt = Some(text.clone());
                        in_flight = Some(self.edit(session.target.clone(), text));
                    }
                }
                event = events.next() => match event {
                    Some(CompletionEvent::Started) => {
                        debug!("completion started (message_id={})", session.target.message_id);
                    }
                    Some(CompletionEvent::Token(token)) => {
                        session.accumulated.push_str(&token);
                    }
                    Some(CompletionEvent::Completed(final_text)) => {
                        if let Some(edit) = in_flight.take() {
                            let (text, result) = edit.await;
                            session.apply_edit(text, result);
                        }
                        self.final_edit(session, &final_text).await;
                        session.transition(SessionState::Completed);
                        return StreamOutcome::Completed { final_text };
                    }
                    Some(CompletionEvent::Failed(error)) => {
                        session.transition(SessionState::Failed);
                        return StreamOutcome::Failed { error };
                    }
                    None => {
                        session.transition(SessionState::Failed);
                        return StreamOutcome::Failed {
                            error: "completion stream ended without a result".to_string(),
                        };
                    }
                },
            }
        }
    }

    /// Let a pending edit finish in the background, then wait a bounded time
    /// for a late completion and publish it once.
    async fn finish_timed_out<S>(
        &self,
        session: &mut StreamingSession,
        in_flight: Option<EditFuture>,
        events: &mut S,
    ) -> StreamOutcome
    where
        S: Stream<Item = CompletionEvent> + Unpin,
    {
        info!(
            "streaming deadline reached (message_id={}, published_len={}, accumulated_len={})",
            session.target.message_id,
            session.published.len(),
            session.accumulated.len()
        );
        let pending = in_flight.map(tokio::spawn);

        let late = time::timeout(self.config.late_completion_grace, async {
            while let Some(event) = events.next().await {
                match event {
                    CompletionEvent::Started => {}
                    CompletionEvent::Token(token) => session.accumulated.push_str(&token),
                    CompletionEvent::Completed(final_text) => return Some(final_text),
                    CompletionEvent::Failed(error) => {
                        warn!(
                            "completion failed after deadline (message_id={}, error={})",
                            session.target.message_id, error
                        );
                        return None;
                    }
                }
            }
            None
        })
        .await
        .unwrap_or(None);

        let Some(final_text) = late else {
            return StreamOutcome::TimedOut { late_final: None };
        };
        if let Some(pending) = pending {
            let _ = pending.await;
        }
        self.final_edit(session, &final_text).await;
        StreamOutcome::TimedOut {
            late_final: Some(final_text),
        }
    }

    /// One authoritative edit with the provider's final text, skipped when it
    /// is already published.
    async fn final_edit(&self, session: &mut StreamingSession, final_text: &str) {
        if final_text == session.published {
            debug!(
                "final text already published (message_id={})",
                session.target.message_id
            );
            return;
        }
        let result = self.transport.edit(&session.target, final_text).await;
        session.apply_edit(final_text.to_string(), result);
    }

    fn edit(&self, target: MessageRef, text: String) -> EditFuture {
        let transport = self.transport.clone();
        async move {
            let result = transport.edit(&target, &text).await;
            (text, result)
        }
        .boxed()
    }
}

async fn settle(edit: &mut Option<EditFuture>) -> (String, Result<(), TransportError>) {
    match edit.as_mut() {
        Some(edit) => edit.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::{ReconcilerConfig, SessionState, StreamOutcome, StreamReconciler};
    use memobot_protocol::{ChatRef, CompletionEvent};
    use memobot_test_utils::RecordingTransport;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::{self, Instant};
    use tokio_stream::wrappers::ReceiverStream;

    enum Step {
        At(u64, CompletionEvent),
        CloseAt(u64),
    }

    fn token(text: &str) -> CompletionEvent {
        CompletionEvent::Token(text.to_string())
    }

    fn completed(text: &str) -> CompletionEvent {
        CompletionEvent::Completed(text.to_string())
    }

    /// Feed events at fixed millisecond offsets from now.
    fn script(steps: Vec<Step>) -> ReceiverStream<CompletionEvent> {
        let (tx, rx) = mpsc::channel(256);
        let start = Instant::now();
        tokio::spawn(async move {
            for step in steps {
                match step {
                    Step::At(ms, event) => {
                        time::sleep_until(start + Duration::from_millis(ms)).await;
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Step::CloseAt(ms) => {
                        time::sleep_until(start + Duration::from_millis(ms)).await;
                        return;
                    }
                }
            }
            // Keep the stream open until the reconciler stops listening.
            tx.closed().await;
        });
        ReceiverStream::new(rx)
    }

    fn config(deadline_ms: u64, grace_ms: u64) -> ReconcilerConfig {
        ReconcilerConfig {
            tick_interval: Duration::from_secs(1),
            deadline: Duration::from_millis(deadline_ms),
            late_completion_grace: Duration::from_millis(grace_ms),
        }
    }

    fn reconciler(
        transport: &Arc<RecordingTransport>,
        config: ReconcilerConfig,
    ) -> StreamReconciler {
        StreamReconciler::new(transport.clone(), config)
    }

    fn assert_no_identical_back_to_back(edits: &[String]) {
        for pair in edits.windows(2) {
            assert!(pair[0] != pair[1], "identical consecutive edits: {pair:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn open_sends_placeholder_and_starts_streaming() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, ReconcilerConfig::default());
        let before = Instant::now();

        let session = reconciler
            .open(&ChatRef::new("100"), Some("7"), "...")
            .await
            .expect("open");

        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.published(), "");
        assert_eq!(session.accumulated(), "");
        assert_eq!(session.deadline(), before + Duration::from_secs(30));
        let sends = transport.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].text, "...");
        assert_eq!(sends[0].reply_to.as_deref(), Some("7"));
        assert_eq!(session.target().message_id, sends[0].message_id);
    }

    #[tokio::test(start_paused = true)]
    async fn open_propagates_send_failure() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_sends(true);
        let reconciler = reconciler(&transport, ReconcilerConfig::default());

        let result = reconciler.open(&ChatRef::new("100"), None, "...").await;
        assert_eq!(result.is_err(), true);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_performs_single_final_edit_with_final_text() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![
            Step::At(0, CompletionEvent::Started),
            Step::At(0, token("Hello")),
            Step::At(0, token(" world")),
            Step::At(0, completed("Hello world!")),
        ]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(
            outcome,
            StreamOutcome::Completed {
                final_text: "Hello world!".to_string()
            }
        );
        assert_eq!(session.accumulated(), "Hello world");
        assert_eq!(session.published(), "Hello world!");
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(transport.edits(), vec!["Hello world!".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_skips_final_edit_when_already_published() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![
            Step::At(0, token("A")),
            Step::At(100, token("B")),
            Step::At(1_500, completed("AB")),
        ]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(
            outcome,
            StreamOutcome::Completed {
                final_text: "AB".to_string()
            }
        );
        assert_eq!(transport.edits(), vec!["AB".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_timeline_and_deadline() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let start = Instant::now();
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let mut steps = vec![
            Step::At(0, CompletionEvent::Started),
            Step::At(0, token("Hi")),
            Step::At(2_500, token(" there")),
        ];
        let mut expected = "Hi there".to_string();
        for second in 5..40u64 {
            steps.push(Step::At(second * 1_000 + 500, token(".")));
            expected.push('.');
        }
        steps.push(Step::CloseAt(45_000));
        let outcome = reconciler.drive(&mut session, script(steps)).await;

        assert_eq!(outcome, StreamOutcome::TimedOut { late_final: None });
        assert_eq!(session.state(), SessionState::TimedOut);
        assert_eq!(session.accumulated(), expected);

        let calls = transport.edit_calls();
        assert_eq!(calls[0].text, "Hi");
        assert_eq!(calls[0].at - start, Duration::from_secs(1));
        assert_eq!(calls[1].text, "Hi there");
        assert_eq!(calls[1].at - start, Duration::from_secs(3));
        for call in &calls {
            assert!(call.at - start < Duration::from_secs(30));
            assert_eq!(session.accumulated().starts_with(&call.text), true);
        }
        let last = calls.last().expect("edits");
        assert_eq!(last.at - start, Duration::from_secs(29));
        assert_eq!(session.published(), last.text);
        assert_no_identical_back_to_back(&transport.edits());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_edit_is_retried_only_with_new_text() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_next_edits(1);
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![
            Step::At(0, token("a")),
            Step::At(2_500, token("b")),
            Step::At(3_500, completed("ab")),
        ]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(
            outcome,
            StreamOutcome::Completed {
                final_text: "ab".to_string()
            }
        );
        assert_eq!(transport.edits(), vec!["a".to_string(), "ab".to_string()]);
        assert_eq!(session.published(), "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_coalesced() {
        let transport =
            Arc::new(RecordingTransport::new().with_edit_delay(Duration::from_millis(2_500)));
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let start = Instant::now();
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![
            Step::At(0, token("a")),
            Step::At(1_500, token("b")),
            Step::At(5_000, completed("ab")),
        ]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(
            outcome,
            StreamOutcome::Completed {
                final_text: "ab".to_string()
            }
        );
        let calls = transport.edit_calls();
        let timeline: Vec<(String, Duration)> = calls
            .iter()
            .map(|call| (call.text.clone(), call.at - start))
            .collect();
        assert_eq!(
            timeline,
            vec![
                ("a".to_string(), Duration::from_secs(1)),
                ("ab".to_string(), Duration::from_secs(4)),
            ]
        );
        assert_eq!(session.published(), "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_editing() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![
            Step::At(0, token("x")),
            Step::At(1_500, CompletionEvent::Failed("boom".to_string())),
            Step::At(2_500, token("y")),
        ]);
        let outcome = reconciler.drive(&mut session, events).await;
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(
            outcome,
            StreamOutcome::Failed {
                error: "boom".to_string()
            }
        );
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.edits(), vec!["x".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ending_without_result_is_a_failure() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, config(30_000, 30_000));
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![Step::At(0, token("x")), Step::CloseAt(200)]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(matches!(outcome, StreamOutcome::Failed { .. }), true);
        assert_eq!(transport.edits(), Vec::<String>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn late_completion_gets_one_best_effort_edit() {
        let transport = Arc::new(RecordingTransport::new());
        let reconciler = reconciler(&transport, config(3_000, 10_000));
        let start = Instant::now();
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![
            Step::At(0, token("a")),
            Step::At(4_000, token("zzz")),
            Step::At(5_000, completed("final answer")),
        ]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(
            outcome,
            StreamOutcome::TimedOut {
                late_final: Some("final answer".to_string())
            }
        );
        let timeline: Vec<(String, Duration)> = transport
            .edit_calls()
            .iter()
            .map(|call| (call.text.clone(), call.at - start))
            .collect();
        assert_eq!(
            timeline,
            vec![
                ("a".to_string(), Duration::from_secs(1)),
                ("final answer".to_string(), Duration::from_secs(5)),
            ]
        );
        assert_eq!(session.state(), SessionState::TimedOut);
        assert_eq!(session.accumulated(), "azzz");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_discards_in_flight_edit_result() {
        let transport =
            Arc::new(RecordingTransport::new().with_edit_delay(Duration::from_secs(5)));
        let reconciler = reconciler(&transport, config(3_000, 10_000));
        let mut session = reconciler
            .open(&ChatRef::new("1"), None, "...")
            .await
            .expect("open");

        let events = script(vec![Step::At(0, token("a")), Step::CloseAt(4_000)]);
        let outcome = reconciler.drive(&mut session, events).await;

        assert_eq!(outcome, StreamOutcome::TimedOut { late_final: None });
        assert_eq!(session.published(), "");
        assert_eq!(transport.edits(), vec!["a".to_string()]);
    }
}
