use std::fmt;

use crate::error::ErrorKind;

/// Stages a request moves through. Transitions only go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Collecting,
    Evaluating,
    RiskChecking,
    Aggregated,
    Emitted,
    Errored(ErrorKind),
}

impl RequestStage {
    fn rank(&self) -> u8 {
        match self {
            RequestStage::Collecting => 0,
            RequestStage::Evaluating => 1,
            RequestStage::RiskChecking => 2,
            RequestStage::Aggregated => 3,
            RequestStage::Emitted => 4,
            RequestStage::Errored(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStage::Emitted | RequestStage::Errored(_))
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStage::Collecting => f.write_str("collecting"),
            RequestStage::Evaluating => f.write_str("evaluating"),
            RequestStage::RiskChecking => f.write_str("risk_checking"),
            RequestStage::Aggregated => f.write_str("aggregated"),
            RequestStage::Emitted => f.write_str("emitted"),
            RequestStage::Errored(kind) => write!(f, "errored({kind})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: RequestStage,
    pub to: RequestStage,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid stage transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Per-request stage tracker.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    stage: RequestStage,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            stage: RequestStage::Collecting,
        }
    }

    pub fn stage(&self) -> RequestStage {
        self.stage
    }

    /// Advance to the next non-error stage. Skipping ahead is allowed; going back is not.
    pub fn advance(&mut self, to: RequestStage) -> Result<(), InvalidTransition> {
        if self.stage.is_terminal() || to.rank() <= self.stage.rank() {
            return Err(InvalidTransition {
                from: self.stage,
                to,
            });
        }
        if let RequestStage::Errored(_) = to {
            return self.fail_with(to);
        }
        self.stage = to;
        Ok(())
    }

    pub fn fail(&mut self, kind: ErrorKind) -> Result<(), InvalidTransition> {
        self.fail_with(RequestStage::Errored(kind))
    }

    fn fail_with(&mut self, to: RequestStage) -> Result<(), InvalidTransition> {
        if self.stage.is_terminal() {
            return Err(InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }
}
