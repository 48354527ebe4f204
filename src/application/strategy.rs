//! Bundles the three domain parameter structs a tenant's loop consults
//! every scan, and the one place the seven C8-learnable keys are folded
//! back into them (spec §3 "Learned params", §4.8 step 6).

use rust_decimal::Decimal;

use crate::domain::ledger::{LearnedParamDefaults, LearnedParamsRecord};
use crate::domain::position::PositionParams;
use crate::domain::risk::RiskConfig;
use crate::domain::signal::CompositorParams;

/// A tenant's full strategy configuration: position lifecycle tunables,
/// risk-governor limits, and compositor scoring thresholds. Rebuilt from
/// `base_*` + the latest learned-params record on every hot-reload
/// (learning pass completion or tenant boot).
#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub position: PositionParams,
    pub risk: RiskConfig,
    pub compositor: CompositorParams,
    /// Base position size as a percent of free balance, learnable via
    /// `base_position_pct`; the executor multiplies this by the
    /// adaptive filter's and market mode's size multipliers.
    pub base_position_pct: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        let defaults = LearnedParamDefaults::default();
        Self::from_defaults(PositionParams::default(), RiskConfig::default(), CompositorParams::default(), &defaults)
    }
}

impl StrategyParams {
    pub fn from_defaults(
        mut position: PositionParams,
        risk: RiskConfig,
        mut compositor: CompositorParams,
        learned: &LearnedParamDefaults,
    ) -> Self {
        compositor.rsi_oversold = learned.rsi_oversold;
        compositor.rsi_overbought = learned.rsi_overbought;
        compositor.base_buy_threshold = learned.buy_threshold;
        position.hard_drop_pct = learned.stop_loss_pct;
        position.take_profit_pct = learned.take_profit_pct;
        position.hard_max_hold_hours = learned.max_hold_hours as i64;
        Self { position, risk, compositor, base_position_pct: learned.base_position_pct }
    }

    /// Rebuilds from this tenant's own `PositionParams`/`RiskConfig`
    /// baselines plus whichever learned overrides currently clear the
    /// confidence gate.
    pub fn reload(base_position: PositionParams, base_risk: RiskConfig, base_compositor: CompositorParams, defaults: &LearnedParamDefaults, learned: &LearnedParamsRecord) -> Self {
        let merged = learned.merge_into(defaults);
        Self::from_defaults(base_position, base_risk, base_compositor, &merged)
    }

    pub fn position_size(&self, balance: Decimal, size_mult: f64) -> Decimal {
        let pct = (self.base_position_pct * size_mult / 100.0).max(0.0);
        balance * Decimal::try_from(pct).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn learned_override_reaches_compositor_and_position_params() {
        let defaults = LearnedParamDefaults { buy_threshold: 1.5, ..LearnedParamDefaults::default() };
        let sp = StrategyParams::from_defaults(PositionParams::default(), RiskConfig::default(), CompositorParams::default(), &defaults);
        assert_eq!(sp.compositor.base_buy_threshold, 1.5);
    }

    #[test]
    fn position_size_scales_with_balance_and_multiplier() {
        let sp = StrategyParams::default();
        let full = sp.position_size(dec!(1_000_000), 1.0);
        let halved = sp.position_size(dec!(1_000_000), 0.5);
        assert_eq!(halved, full / dec!(2));
    }
}
