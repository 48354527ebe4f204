//! C3: the signal compositor and the two learned-state gates it consults
//! (combo-tracker, loss-pattern checker) plus the structured `ReasonSet`
//! bitset that replaces the source's regex-parsed reason strings.

pub mod combo;
pub mod compositor;
pub mod loss_pattern;
pub mod reason;

pub use combo::{ComboQueryResult, ComboStats, ComboStore};
pub use compositor::{compose, CompositorInput, CompositorParams, Signal, SignalAction};
pub use loss_pattern::{LossPatternAction, LossPatternContext, LossPatternRule};
pub use reason::ReasonSet;
