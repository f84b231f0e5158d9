use std::fmt;

use serde::{Deserialize, Serialize};

/// Coordinator start-up stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    LoadingStoredData,
    InitializingStates,
    MinimalReady,
    HistoricalAnalysisPending,
    FullyReady,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::LoadingStoredData => "loading_stored_data",
            LifecycleState::InitializingStates => "initializing_states",
            LifecycleState::MinimalReady => "minimal_ready",
            LifecycleState::HistoricalAnalysisPending => "historical_analysis_pending",
            LifecycleState::FullyReady => "fully_ready",
        }
    }

    /// Forward one stage, or stay in `FullyReady`
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Uninitialized, LoadingStoredData)
                | (LoadingStoredData, InitializingStates)
                | (InitializingStates, MinimalReady)
                | (MinimalReady, HistoricalAnalysisPending)
                | (HistoricalAnalysisPending, FullyReady)
                | (FullyReady, FullyReady)
        )
    }

    /// Full Bayesian calculation instead of the minimal placeholder
    pub fn runs_full_calculation(&self) -> bool {
        *self >= LifecycleState::HistoricalAnalysisPending
    }

    /// The timeslot cache is only trusted after an analysis pass
    pub fn uses_timeslots(&self) -> bool {
        *self == LifecycleState::FullyReady
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use LifecycleState::*;
        assert!(Uninitialized.can_transition_to(LoadingStoredData));
        assert!(HistoricalAnalysisPending.can_transition_to(FullyReady));
        assert!(FullyReady.can_transition_to(FullyReady));
        assert!(!Uninitialized.can_transition_to(FullyReady));
        assert!(!FullyReady.can_transition_to(MinimalReady));
    }

    #[test]
    fn test_stage_capabilities() {
        assert!(!LifecycleState::MinimalReady.runs_full_calculation());
        assert!(LifecycleState::HistoricalAnalysisPending.runs_full_calculation());
        assert!(!LifecycleState::HistoricalAnalysisPending.uses_timeslots());
        assert!(LifecycleState::FullyReady.uses_timeslots());
        assert_eq!(
            serde_json::to_string(&LifecycleState::FullyReady).unwrap(),
            "\"fully_ready\""
        );
    }
}
