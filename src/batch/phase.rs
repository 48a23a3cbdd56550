/// Lifecycle of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Resuming,
    Processing,
    Checkpointing,
    Finalizing,
    Done,
    Interrupted,
    Failed,
}

impl RunPhase {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (RunPhase::Idle, RunPhase::Resuming)
                | (RunPhase::Resuming, RunPhase::Processing)
                | (RunPhase::Resuming, RunPhase::Failed)
                | (RunPhase::Processing, RunPhase::Processing)
                | (RunPhase::Processing, RunPhase::Checkpointing)
                | (RunPhase::Processing, RunPhase::Finalizing)
                | (RunPhase::Processing, RunPhase::Interrupted)
                | (RunPhase::Checkpointing, RunPhase::Processing)
                | (RunPhase::Finalizing, RunPhase::Done)
                | (RunPhase::Finalizing, RunPhase::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Done | RunPhase::Interrupted | RunPhase::Failed
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Resuming => write!(f, "resuming"),
            RunPhase::Processing => write!(f, "processing"),
            RunPhase::Checkpointing => write!(f, "checkpointing"),
            RunPhase::Finalizing => write!(f, "finalizing"),
            RunPhase::Done => write!(f, "done"),
            RunPhase::Interrupted => write!(f, "interrupted"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}
