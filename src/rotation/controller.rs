//! The rotation state machine that keeps a fresh QR token on screen.
//!
//! `Idle -> Fetching -> Active -> (Error | Stopped)`. One controller drives at
//! most one generation loop; starting again first tears the previous loop down.
//! The session secret lives inside the loop task and is wiped when the task ends,
//! whether it stopped, failed or was aborted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::client::api::SessionKeyApi;
use crate::crypto::secret::SessionSecret;
use crate::error::{ErrorKind, Operation, ProtocolError};
use crate::protocol::generator;

/// Lifecycle of a rotation session as seen by the presentation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Fetching,
    Active,
    Error(ErrorKind),
    Stopped,
}

/// What the presentation surface is told, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationEvent {
    /// A session key is being fetched; show a loading indicator.
    Loading,
    /// The QR string to display until the next one arrives.
    Token(String),
    /// Rotation stopped on an error; stop showing any code.
    Failed(ProtocolError),
    Stopped,
}

/// Rotation cadence and collaborator deadlines.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Time between tokens. The validator's freshness window must exceed it.
    pub tick_interval: Duration,
    /// Deadline for each issuance or liveness call.
    pub request_timeout: Duration,
    /// Re-check the secret with the server every N ticks. 0 disables it.
    pub liveness_every: u32,
    /// Consecutive in-session checks that may fail to complete before rotation
    /// stops. An explicit rejection always stops it.
    pub check_tolerance: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            liveness_every: 1,
            check_tolerance: 2,
        }
    }
}

#[derive(Clone)]
struct Surface {
    state: Arc<watch::Sender<RotationState>>,
    events: mpsc::UnboundedSender<RotationEvent>,
}

impl Surface {
    fn set_state(&self, state: RotationState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: RotationEvent) {
        // A closed receiver means the surface is gone; nothing left to tell.
        let _ = self.events.send(event);
    }

    fn fail(&self, error: ProtocolError) {
        tracing::warn!("❌ Rotation stopped: {}", error);
        self.set_state(RotationState::Error(error.kind()));
        self.emit(RotationEvent::Failed(error));
    }
}

struct RunningSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the regeneration loop for one presentation surface.
pub struct RotationController {
    api: Arc<dyn SessionKeyApi>,
    config: RotationConfig,
    surface: Surface,
    session: Option<RunningSession>,
}

impl RotationController {
    /// Creates an idle controller and the event stream for its presentation surface.
    pub fn new(
        api: Arc<dyn SessionKeyApi>,
        config: RotationConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RotationEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(RotationState::Idle);

        let controller = Self {
            api,
            config,
            surface: Surface {
                state: Arc::new(state),
                events,
            },
            session: None,
        };

        (controller, receiver)
    }

    pub fn state(&self) -> RotationState {
        self.surface.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationState> {
        self.surface.state.subscribe()
    }

    /// Starts a rotation session for `lesson_id`.
    ///
    /// Any running session is fully stopped first, so at most one loop exists.
    pub async fn start(&mut self, teacher_credential: impl Into<String>, lesson_id: i64) {
        self.shutdown().await;

        tracing::info!("🔄 Starting rotation for lesson {}", lesson_id);
        self.surface.set_state(RotationState::Fetching);
        self.surface.emit(RotationEvent::Loading);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_session(
            self.api.clone(),
            self.config.clone(),
            Zeroizing::new(teacher_credential.into()),
            lesson_id,
            cancel.clone(),
            self.surface.clone(),
        ));

        self.session = Some(RunningSession { cancel, handle });
    }

    /// Stops rotating. No token is emitted once this returns.
    pub async fn stop(&mut self) {
        self.shutdown().await;
        self.surface.set_state(RotationState::Stopped);
        self.surface.emit(RotationEvent::Stopped);
        tracing::info!("⏹️  Rotation stopped");
    }

    /// Clears an `Error` or `Stopped` session back to `Idle`.
    pub async fn reset(&mut self) {
        self.shutdown().await;
        self.surface.set_state(RotationState::Idle);
    }

    /// Cancels the running loop and waits for it to finish.
    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                if e.is_panic() {
                    tracing::error!("❌ Rotation task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for RotationController {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            session.handle.abort();
        }
    }
}

async fn run_session(
    api: Arc<dyn SessionKeyApi>,
    config: RotationConfig,
    credential: Zeroizing<String>,
    lesson_id: i64,
    cancel: CancellationToken,
    surface: Surface,
) {
    let issued = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = timeout(config.request_timeout, api.issue(&credential)) => result,
    };
    drop(credential);

    let secret = match issued {
        Ok(Ok(secret)) => secret,
        Ok(Err(e)) => return surface.fail(e),
        Err(_) => {
            return surface.fail(ProtocolError::Timeout {
                operation: Operation::Issue,
                after: config.request_timeout,
            });
        }
    };

    // Fail fast on a misissued or already-expired secret.
    let teacher_id = match check_live(api.as_ref(), &secret, &config, &cancel).await {
        Some(Ok(teacher_id)) => teacher_id,
        Some(Err(e)) => return surface.fail(e),
        None => return,
    };

    if cancel.is_cancelled() {
        return;
    }
    surface.set_state(RotationState::Active);
    tracing::info!("✅ Rotation active: teacher={} lesson={}", teacher_id, lesson_id);

    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;
    let mut failed_checks: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if secret.is_expired() {
            return surface.fail(ProtocolError::SecretRejected(
                "session key expired".to_string(),
            ));
        }

        if tick > 0 && config.liveness_every > 0 && tick % u64::from(config.liveness_every) == 0 {
            match check_live(api.as_ref(), &secret, &config, &cancel).await {
                Some(Ok(checked)) if checked == teacher_id => failed_checks = 0,
                Some(Ok(other)) => {
                    return surface.fail(ProtocolError::SecretRejected(format!(
                        "session key now belongs to teacher {}",
                        other
                    )));
                }
                Some(Err(e)) if is_transient(&e) && failed_checks < config.check_tolerance => {
                    failed_checks += 1;
                    tracing::warn!(
                        "⚠️  Session key check incomplete ({}/{}): {}",
                        failed_checks,
                        config.check_tolerance,
                        e
                    );
                }
                Some(Err(e)) => return surface.fail(e),
                None => return,
            }
        }

        let qr = match generator::generate(&secret, teacher_id, lesson_id) {
            Ok(token) => match token.qr_string() {
                Ok(qr) => qr,
                Err(e) => return surface.fail(ProtocolError::EncryptionFailed(e.to_string())),
            },
            Err(e) => return surface.fail(e.into()),
        };

        if cancel.is_cancelled() {
            return;
        }
        surface.emit(RotationEvent::Token(qr));
        tracing::trace!("🔁 Tick {} emitted for lesson {}", tick, lesson_id);
        tick += 1;
    }
}

/// A check that could not be completed, as opposed to one that rejected the secret.
fn is_transient(error: &ProtocolError) -> bool {
    matches!(
        error,
        ProtocolError::CheckUnavailable(_)
            | ProtocolError::Timeout {
                operation: Operation::Check,
                ..
            }
    )
}

/// Runs a liveness check bounded by the request timeout.
///
/// Returns `None` when the session was cancelled while waiting.
async fn check_live(
    api: &dyn SessionKeyApi,
    secret: &SessionSecret,
    config: &RotationConfig,
    cancel: &CancellationToken,
) -> Option<Result<i64, ProtocolError>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = timeout(config.request_timeout, api.check(secret)) => {
            Some(result.unwrap_or_else(|_| {
                Err(ProtocolError::Timeout {
                    operation: Operation::Check,
                    after: config.request_timeout,
                })
            }))
        }
    }
}
