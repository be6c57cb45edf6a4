use crate::model::CallJob;

/// Result of one orchestrator invocation. Each variant carries the record
/// as stored after the invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// This run committed `completed`.
    Completed { call: CallJob },
    /// This run committed `error`.
    Failed { call: CallJob },
    /// The job was already terminal; nothing was called or written.
    AlreadyTerminal { call: CallJob },
    /// Another run holds the claim.
    InFlight { call: CallJob },
}

impl ProcessOutcome {
    pub fn call(&self) -> &CallJob {
        match self {
            ProcessOutcome::Completed { call }
            | ProcessOutcome::Failed { call }
            | ProcessOutcome::AlreadyTerminal { call }
            | ProcessOutcome::InFlight { call } => call,
        }
    }

    pub fn into_call(self) -> CallJob {
        match self {
            ProcessOutcome::Completed { call }
            | ProcessOutcome::Failed { call }
            | ProcessOutcome::AlreadyTerminal { call }
            | ProcessOutcome::InFlight { call } => call,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, ProcessOutcome::InFlight { .. })
    }
}

/// Tally of one stalled-job sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Claimed by someone else or already terminal by the time we got to it.
    pub skipped: usize,
    /// Invocations that could not reach the store.
    pub errors: usize,
}
