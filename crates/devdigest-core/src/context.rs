//! Per-call execution context: deadline, cancellation and the run's [`Facts`].
//!
//! A context is threaded through every module invocation. Child contexts are
//! derived with [`ExecContext::child`]; a child never outlives its parent's
//! deadline and is cancelled whenever the parent is.
//!
//! The facts are held as an exclusive borrow. Modules run one after another,
//! so the borrow checker is the only synchronization the scratchpad needs.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::facts::Facts;

/// Why a bounded operation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

pub struct ExecContext<'run> {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    facts: Option<&'run mut Facts>,
    fallback: Facts,
}

impl ExecContext<'static> {
    /// Context with no deadline, a fresh token and no facts attached.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
            facts: None,
            fallback: Facts::default(),
        }
    }
}

impl<'run> ExecContext<'run> {
    /// Tightens the deadline to `deadline` if it expires earlier than the current one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(earliest(self.deadline, deadline));
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = deadline_after(timeout);
        self.with_deadline(deadline)
    }

    /// Replaces the cancellation token, e.g. with one wired to Ctrl-C.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attaches the run's scratchpad.
    pub fn with_facts<'f>(self, facts: &'f mut Facts) -> ExecContext<'f> {
        ExecContext {
            deadline: self.deadline,
            cancel: self.cancel,
            facts: Some(facts),
            fallback: Facts::default(),
        }
    }

    /// Derives a context bounded by `timeout` and by this context's own deadline,
    /// whichever expires first. The child shares this context's facts.
    pub fn child(&mut self, timeout: Duration) -> ExecContext<'_> {
        let deadline = earliest(self.deadline, deadline_after(timeout));
        ExecContext {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
            facts: Some(self.facts.as_deref_mut().unwrap_or(&mut self.fallback)),
            fallback: Facts::default(),
        }
    }

    /// The attached scratchpad, or an empty one if none was attached.
    pub fn facts(&self) -> &Facts {
        self.facts.as_deref().unwrap_or(&self.fallback)
    }

    pub fn facts_mut(&mut self) -> &mut Facts {
        match self.facts.as_deref_mut() {
            Some(facts) => facts,
            None => &mut self.fallback,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reports whether this context can no longer start work, and why.
    pub fn interrupted(&self) -> Option<Interrupted> {
        if self.cancel.is_cancelled() {
            Some(Interrupted::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Interrupted::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Runs `fut` until it completes, the deadline passes or the context is
    /// cancelled. Every blocking call a module makes should go through here.
    pub async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        race(self.deadline, &self.cancel, fut).await
    }
}

pub(crate) async fn race<F: Future>(
    deadline: Option<Instant>,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, Interrupted> {
    if cancel.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }
    match deadline {
        Some(deadline) => tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        },
        None => tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted::Cancelled),
            out = fut => Ok(out),
        },
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    // Absurdly large timeouts saturate at roughly a century.
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 3600))
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Instant {
    match current {
        Some(current) if current < candidate => current,
        _ => candidate,
    }
}
