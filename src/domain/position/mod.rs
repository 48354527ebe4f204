//! C4 (position half): the per-symbol lifecycle state machine, its tunable
//! parameters, and DCA planning.

pub mod dca;
pub mod position;
pub mod state_machine;

pub use dca::{plan_dca, DcaPlan};
pub use position::{Position, PositionParams, WhipsawState};
pub use state_machine::{can_dca, tick, PositionAction};
