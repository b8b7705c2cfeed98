//! The verification pipeline as an explicit state machine.
//!
//! ```text
//! Start → LayoutReady → CandidatesDetected → Branches → Joined → Reasoned → Done
//!   └──────────┴──────────────┴─────────────────┴──────────┴─────────┴──→ Failed(stage)
//! ```
//!
//! `Branches` covers the extraction branch and the global comparison
//! branch, which run concurrently and meet at `Joined`. `Done` and
//! `Failed` are terminal. Finding no candidates is not a failure: the run
//! moves through `CandidatesDetected` as usual.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External collaborators the pipeline calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    Layout,
    Extraction,
    Reasoning,
}

impl Collaborator {
    pub fn as_str(self) -> &'static str {
        match self {
            Collaborator::Layout => "layout",
            Collaborator::Extraction => "extraction",
            Collaborator::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStage {
    Layout,
    Extraction,
    Reasoning,
    Scoring,
}

impl From<Collaborator> for FailedStage {
    fn from(collaborator: Collaborator) -> Self {
        match collaborator {
            Collaborator::Layout => FailedStage::Layout,
            Collaborator::Extraction => FailedStage::Extraction,
            Collaborator::Reasoning => FailedStage::Reasoning,
        }
    }
}

impl std::fmt::Display for FailedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailedStage::Layout => write!(f, "layout"),
            FailedStage::Extraction => write!(f, "extraction"),
            FailedStage::Reasoning => write!(f, "reasoning"),
            FailedStage::Scoring => write!(f, "scoring"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "failed_at", rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    LayoutReady,
    CandidatesDetected,
    /// Extraction branch and global comparison branch in flight
    Branches,
    Joined,
    Reasoned,
    Done,
    Failed(FailedStage),
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed(_))
    }

    /// The one stage that follows this one on the success path.
    pub fn next(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Start => Some(PipelineStage::LayoutReady),
            PipelineStage::LayoutReady => Some(PipelineStage::CandidatesDetected),
            PipelineStage::CandidatesDetected => Some(PipelineStage::Branches),
            PipelineStage::Branches => Some(PipelineStage::Joined),
            PipelineStage::Joined => Some(PipelineStage::Reasoned),
            PipelineStage::Reasoned => Some(PipelineStage::Done),
            PipelineStage::Done | PipelineStage::Failed(_) => None,
        }
    }

    pub fn can_transition_to(self, to: PipelineStage) -> bool {
        match to {
            PipelineStage::Failed(_) => !self.is_terminal(),
            to => self.next() == Some(to),
        }
    }
}

/// One recorded stage change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: PipelineStage,
    pub to: PipelineStage,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("invalid pipeline transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: PipelineStage,
    pub to: PipelineStage,
}

/// Current stage plus every transition taken to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTrace {
    stage: PipelineStage,
    transitions: Vec<Transition>,
}

impl PipelineTrace {
    pub fn new() -> Self {
        Self {
            stage: PipelineStage::Start,
            transitions: Vec::new(),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Stages visited, starting with `Start`.
    pub fn path(&self) -> Vec<PipelineStage> {
        std::iter::once(PipelineStage::Start)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), InvalidTransition> {
        let from = self.stage;
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }
        tracing::info!(from = ?from, to = ?to, "Pipeline stage transition");
        self.transitions.push(Transition {
            from,
            to,
            at: Utc::now(),
        });
        self.stage = to;
        Ok(())
    }

    /// Move to `Failed(stage)`. A trace already in a terminal stage is left alone.
    pub fn fail(&mut self, stage: FailedStage) {
        if self.advance(PipelineStage::Failed(stage)).is_err() {
            tracing::debug!(stage = ?self.stage, failed = %stage, "Failure after terminal stage ignored");
        }
    }
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut trace = PipelineTrace::new();
        let mut stage = PipelineStage::Start;
        while let Some(next) = stage.next() {
            trace.advance(next).unwrap();
            stage = next;
        }
        assert_eq!(trace.stage(), PipelineStage::Done);
        assert_eq!(
            trace.path(),
            vec![
                PipelineStage::Start,
                PipelineStage::LayoutReady,
                PipelineStage::CandidatesDetected,
                PipelineStage::Branches,
                PipelineStage::Joined,
                PipelineStage::Reasoned,
                PipelineStage::Done,
            ]
        );
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut trace = PipelineTrace::new();
        let err = trace.advance(PipelineStage::Branches).unwrap_err();
        assert_eq!(err.from, PipelineStage::Start);
        assert_eq!(trace.stage(), PipelineStage::Start);
        assert!(trace.transitions().is_empty());
    }

    #[test]
    fn test_failure_reachable_from_any_live_stage() {
        let mut stage = PipelineStage::Start;
        while !stage.is_terminal() {
            assert!(stage.can_transition_to(PipelineStage::Failed(FailedStage::Extraction)));
            stage = stage.next().unwrap();
        }
    }

    #[test]
    fn test_terminal_stages_stay_put() {
        let mut trace = PipelineTrace::new();
        trace.fail(FailedStage::Layout);
        assert_eq!(trace.stage(), PipelineStage::Failed(FailedStage::Layout));

        trace.fail(FailedStage::Scoring);
        assert!(trace.advance(PipelineStage::LayoutReady).is_err());
        assert_eq!(trace.stage(), PipelineStage::Failed(FailedStage::Layout));
        assert_eq!(trace.transitions().len(), 1);
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_value(PipelineStage::Failed(FailedStage::Layout)).unwrap();
        assert_eq!(json, serde_json::json!({"stage": "failed", "failed_at": "layout"}));
        let json = serde_json::to_value(PipelineStage::Joined).unwrap();
        assert_eq!(json, serde_json::json!({"stage": "joined"}));
    }
}
