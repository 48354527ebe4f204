//! C4 (risk half): the precedence-ordered governor, the adaptive scan
//! filter, and the rolling state they both read.

pub mod adaptive_filter;
pub mod governor;
pub mod state;

pub use adaptive_filter::{evaluate as evaluate_adaptive_filter, AdaptiveAdjustment, AdaptiveFilterInput};
pub use governor::{can_open, dynamic_max_positions, CanOpenResult, GovernorInput, RiskConfig};
pub use state::RiskState;
