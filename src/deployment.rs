//! # Deployment Modes for the Notification Feed
//!
//! Controls which of the two feedback sources the reconciler runs.
//!
//! - **Hybrid**: push subscription with polling fallback (default)
//! - **EventDrivenOnly**: push subscription only
//! - **PollingOnly**: timer-driven polling only
//! - **Disabled**: neither source starts; the list stays empty
//!
//! Polling is the availability floor of the feed. Dropping it trades missed
//! alerts for fewer queries.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Which feedback sources the reconciler starts
///
/// Deserialization fails if the configured value is not one of the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display)]
#[serde(rename_all = "PascalCase")]
pub enum DeploymentMode {
    /// Push subscription only
    #[display("EventDrivenOnly")]
    EventDrivenOnly,
    /// Timer-driven polling only
    #[display("PollingOnly")]
    PollingOnly,
    /// Push subscription with polling fallback
    #[default]
    #[display("Hybrid")]
    Hybrid,
    /// No sources
    #[display("Disabled")]
    Disabled,
}

impl DeploymentMode {
    /// Check if this mode opens the push subscription
    pub fn has_event_driven(&self) -> bool {
        matches!(
            self,
            DeploymentMode::Hybrid | DeploymentMode::EventDrivenOnly
        )
    }

    /// Check if this mode runs the fallback poll
    pub fn has_polling(&self) -> bool {
        matches!(self, DeploymentMode::PollingOnly | DeploymentMode::Hybrid)
    }

    /// Check if this mode is disabled
    pub fn is_disabled(&self) -> bool {
        matches!(self, DeploymentMode::Disabled)
    }
}

/// How the fallback poll decides which rows to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display)]
#[serde(rename_all = "snake_case")]
pub enum PollStrategy {
    /// Read the newest `poll_limit` rows every tick
    #[default]
    #[display("latest")]
    Latest,
    /// Read up to `poll_limit` rows above the poll cursor, oldest first,
    /// and advance the cursor past them
    #[display("catch_up")]
    CatchUp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_sources() {
        assert!(DeploymentMode::Hybrid.has_event_driven());
        assert!(DeploymentMode::Hybrid.has_polling());
        assert!(DeploymentMode::EventDrivenOnly.has_event_driven());
        assert!(!DeploymentMode::EventDrivenOnly.has_polling());
        assert!(!DeploymentMode::PollingOnly.has_event_driven());
        assert!(DeploymentMode::PollingOnly.has_polling());
        assert!(!DeploymentMode::Disabled.has_event_driven());
        assert!(!DeploymentMode::Disabled.has_polling());
        assert!(DeploymentMode::Disabled.is_disabled());
    }

    #[test]
    fn test_mode_deserialization() {
        let mode: DeploymentMode = serde_json::from_str("\"PollingOnly\"").unwrap();
        assert_eq!(mode, DeploymentMode::PollingOnly);
        assert!(serde_json::from_str::<DeploymentMode>("\"Sometimes\"").is_err());
        assert_eq!(DeploymentMode::default(), DeploymentMode::Hybrid);
    }

    #[test]
    fn test_mode_display_matches_serde_name() {
        for mode in [
            DeploymentMode::EventDrivenOnly,
            DeploymentMode::PollingOnly,
            DeploymentMode::Hybrid,
            DeploymentMode::Disabled,
        ] {
            let serialized = serde_json::to_string(&mode).unwrap();
            assert_eq!(serialized, format!("\"{mode}\""));
        }
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(PollStrategy::CatchUp.to_string(), "catch_up");
        let strategy: PollStrategy = serde_json::from_str("\"catch_up\"").unwrap();
        assert_eq!(strategy, PollStrategy::CatchUp);
    }
}
