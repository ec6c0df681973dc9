//! The session gate.
//!
//! Collapses concurrent unauthenticated failures into a single interactive
//! re-authentication episode. Failing calls are suspended in a FIFO queue
//! instead of being rejected; the first failure opens the episode and
//! triggers the re-auth prompt exactly once, later failures join the queue
//! silently. When the episode resolves, the queue is either replayed with
//! the fresh credential (success) or rejected wholesale (cancellation).
//!
//! No timeout is imposed on suspended calls: a caller waits for as long as
//! the episode stays open. A caller that stops waiting simply drops its
//! future; the gate notices the closed channel at resolution time and
//! moves on.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};

use crate::error::ApiError;
use crate::request::{ApiResponse, RequestDescriptor};

/// Collaborator shown when an episode opens.
///
/// Invoked at most once per episode, so an implementation never has to
/// de-duplicate prompts itself. It still must not self-trigger a second
/// surface while one is already visible.
pub trait ReauthPrompt: Send + Sync {
    fn authentication_required(&self);
}

/// Prompt adapter for event-loop hosts: each episode pushes one unit onto
/// the channel, the UI task pops it and shows the login surface.
pub struct ChannelPrompt {
    tx: mpsc::UnboundedSender<()>,
}

impl ChannelPrompt {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReauthPrompt for ChannelPrompt {
    fn authentication_required(&self) {
        // The UI side going away just means nobody shows a dialog.
        let _ = self.tx.send(());
    }
}

pub(crate) type Completion = oneshot::Sender<Result<ApiResponse, ApiError>>;

/// One suspended call: enough to re-issue it, the channel its caller is
/// awaiting, and its enqueue position.
pub(crate) struct PendingRequest {
    pub descriptor: RequestDescriptor,
    pub completion: Completion,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Open,
}

struct GateState {
    phase: Phase,
    queue: VecDeque<PendingRequest>,
    next_seq: u64,
    episode: u64,
}

pub(crate) struct SessionGate {
    state: Mutex<GateState>,
    prompt: Arc<dyn ReauthPrompt>,
}

impl SessionGate {
    pub(crate) fn new(prompt: Arc<dyn ReauthPrompt>) -> Self {
        Self {
            state: Mutex::new(GateState {
                phase: Phase::Idle,
                queue: VecDeque::new(),
                next_seq: 0,
                episode: 0,
            }),
            prompt,
        }
    }

    // The gate itself cannot fail; a poisoned lock is recovered because
    // every critical section leaves the state consistent.
    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Suspend a failed call until the current episode resolves. Opens a
    /// new episode (and triggers the prompt, once) if none is active. The
    /// caller awaits the returned channel; it settles only when the
    /// episode resolves one way or the other.
    ///
    /// The check-and-transition below is atomic: two concurrent `admit`s
    /// can never both observe `Idle`.
    pub(crate) fn admit(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> oneshot::Receiver<Result<ApiResponse, ApiError>> {
        let (tx, rx) = oneshot::channel();
        descriptor.retried = true;

        let opened;
        let episode;
        {
            let mut state = self.state();
            opened = state.phase == Phase::Idle;
            if opened {
                state.phase = Phase::Open;
                state.episode += 1;
            }
            episode = state.episode;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.queue.push_back(PendingRequest {
                descriptor,
                completion: tx,
                seq,
            });
            tracing::debug!(
                episode,
                seq,
                depth = state.queue.len(),
                "request suspended by session gate"
            );
        }

        // Outside the lock: the prompt may call back into the client.
        if opened {
            tracing::info!(episode, "session expired, requesting re-authentication");
            self.prompt.authentication_required();
        }

        rx
    }

    /// Close the episode after a fresh credential was stored. Returns the
    /// suspended requests in enqueue order for replay; the gate is `Idle`
    /// again from this instant, so a failure during replay starts a new
    /// episode rather than re-entering this one.
    pub(crate) fn resolve_success(&self) -> Vec<PendingRequest> {
        let mut state = self.state();
        state.phase = Phase::Idle;
        let drained: Vec<PendingRequest> = state.queue.drain(..).collect();
        if !drained.is_empty() {
            tracing::info!(
                episode = state.episode,
                replaying = drained.len(),
                "re-authentication succeeded, replaying suspended requests"
            );
        }
        drained
    }

    /// Close the episode after the user abandoned re-authentication: every
    /// suspended caller rejects with `ApiError::AuthRequired` and nothing
    /// is replayed.
    pub(crate) fn resolve_cancelled(&self) {
        let drained: Vec<PendingRequest> = {
            let mut state = self.state();
            state.phase = Phase::Idle;
            let drained = state.queue.drain(..).collect::<Vec<_>>();
            if !drained.is_empty() {
                tracing::info!(
                    episode = state.episode,
                    rejecting = drained.len(),
                    "re-authentication abandoned, rejecting suspended requests"
                );
            }
            drained
        };

        for pending in drained {
            if pending.completion.send(Err(ApiError::AuthRequired)).is_err() {
                tracing::debug!(seq = pending.seq, "suspended caller went away before rejection");
            }
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state().phase == Phase::Open
    }

    pub(crate) fn pending_requests(&self) -> usize {
        self.state().queue.len()
    }
}
