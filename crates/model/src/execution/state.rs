use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle of a batch pipeline. Transitions are one-way: `Open` may become
/// `Closed` or `Cancelled`, and neither terminal state ever changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Open,
    Closed,
    Cancelled,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Open => "open",
            PipelineState::Closed => "closed",
            PipelineState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineState::Open)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PipelineState::Open),
            "closed" => Ok(PipelineState::Closed),
            "cancelled" | "canceled" => Ok(PipelineState::Cancelled),
            other => Err(ModelError::UnknownState(other.to_string())),
        }
    }
}

/// What `push` does with a chunk whose id is already known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Warn and leave the chunk out of the push.
    Ignore,
    /// Fail the whole push before anything is sent.
    Throw,
    /// Forget the old entry and resubmit the chunk under a fresh id.
    #[default]
    Replace,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DuplicatePolicy::Ignore => "ignore",
            DuplicatePolicy::Throw => "throw",
            DuplicatePolicy::Replace => "replace",
        };
        f.write_str(name)
    }
}

impl FromStr for DuplicatePolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(DuplicatePolicy::Ignore),
            "throw" => Ok(DuplicatePolicy::Throw),
            "replace" => Ok(DuplicatePolicy::Replace),
            other => Err(ModelError::UnknownPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            PipelineState::Open,
            PipelineState::Closed,
            PipelineState::Cancelled,
        ] {
            assert_eq!(state.as_str().parse::<PipelineState>().unwrap(), state);
        }
        assert!("paused".parse::<PipelineState>().is_err());
    }

    #[test]
    fn only_open_is_active() {
        assert!(!PipelineState::Open.is_terminal());
        assert!(PipelineState::Closed.is_terminal());
        assert!(PipelineState::Cancelled.is_terminal());
    }

    #[test]
    fn policy_defaults_to_replace() {
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Replace);
        assert_eq!("THROW".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Throw);
        assert!(matches!(
            "skip".parse::<DuplicatePolicy>(),
            Err(ModelError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&PipelineState::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
