//! Action scheduler driving the managed program
//!
//! Turns the runtime's state-change counter and the daemon's terminate /
//! destroy triggers into a sequence of [`Action`]s, executed one at a time
//! against an [`ApplyProgram`]. Overlapping triggers coalesce; priority is
//! destroy over terminate over deploy.

use async_trait::async_trait;
use span_types::Action;
use tokio::sync::watch;
use tracing::info;

/// The program whose lifecycle the scheduler manages.
///
/// Each method receives the state produced by the previous invocation and
/// returns the next one. Errors abort the scheduler.
#[async_trait]
pub trait ApplyProgram: Send {
    type State: Send;

    /// Load or reconstruct the initial state before any action runs.
    async fn init(&mut self) -> anyhow::Result<Self::State>;

    /// Provision: converge the program onto the current inbound offers.
    async fn deploy(&mut self, state: Self::State) -> anyhow::Result<Self::State>;

    /// Tear down the program, keeping durable state.
    async fn terminate(&mut self, state: Self::State) -> anyhow::Result<Self::State>;

    /// Tear down the program and its durable state.
    async fn destroy(&mut self, state: Self::State) -> anyhow::Result<Self::State>;
}

/// Drives an [`ApplyProgram`] from the runtime's signals.
pub struct Scheduler {
    state_rx: watch::Receiver<u64>,
    terminate_rx: watch::Receiver<bool>,
    destroy_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        state_rx: watch::Receiver<u64>,
        terminate_rx: watch::Receiver<bool>,
        destroy_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state_rx,
            terminate_rx,
            destroy_rx,
        }
    }

    /// Wait for the next action.
    ///
    /// `seen` is the state counter consumed by the previous deploy; a
    /// deploy fires only when the counter has moved past it. Terminate and
    /// destroy fire as soon as their trigger is set, destroy first.
    pub async fn next_action(&mut self, seen: u64) -> Action {
        tokio::select! {
            biased;
            _ = fired(&mut self.destroy_rx) => Action::Destroy,
            _ = fired(&mut self.terminate_rx) => Action::Terminate,
            _ = state_changed(&mut self.state_rx, seen) => Action::Deploy,
        }
    }

    /// Run the managed program to completion.
    ///
    /// Performs an unconditional initial deploy (so the program converges
    /// onto whatever offers arrived before startup finished), then loops on
    /// [`Self::next_action`] until a terminal action runs. Returns the
    /// final program state.
    pub async fn run<P: ApplyProgram>(
        mut self,
        program: &mut P,
        on_initialized: impl FnOnce(),
    ) -> anyhow::Result<P::State> {
        let state = program.init().await?;
        let mut seen = *self.state_rx.borrow();

        info!(action = %Action::Deploy, "executing initial action");
        let mut state = program.deploy(state).await?;
        info!(action = %Action::Deploy, "action complete");
        on_initialized();

        loop {
            let action = self.next_action(seen).await;
            seen = *self.state_rx.borrow();

            info!(action = %action, "executing action");
            state = match action {
                Action::Deploy => program.deploy(state).await?,
                Action::Terminate => program.terminate(state).await?,
                Action::Destroy => program.destroy(state).await?,
            };
            info!(action = %action, "action complete");

            if action.is_terminal() {
                return Ok(state);
            }
        }
    }
}

/// Resolve once the boolean trigger is (or becomes) true. Pends forever if
/// the sender is gone without firing.
async fn fired(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolve once the counter differs from `seen`. Pends forever once the
/// sender is gone and the counter is stable.
async fn state_changed(rx: &mut watch::Receiver<u64>, seen: u64) {
    loop {
        if *rx.borrow() != seen {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
