use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The seven tunables the learning pass (C8) grid-searches. Every value
/// is clamped to `default ± 50%` of its absolute default before it is
/// ever written, so a bad learning run can shift behavior but never
/// destabilize it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnedParams {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_hours: f64,
    pub base_position_pct: f64,
    pub buy_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedParamDefaults {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_hours: f64,
    pub base_position_pct: f64,
    pub buy_threshold: f64,
}

impl Default for LearnedParamDefaults {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stop_loss_pct: -2.5,
            take_profit_pct: 5.0,
            max_hold_hours: 4.0,
            base_position_pct: 5.0,
            buy_threshold: 2.0,
        }
    }
}

fn clamp_to_half_range(value: f64, default: f64) -> f64 {
    let spread = default.abs() * 0.5;
    value.clamp(default - spread, default + spread)
}

impl LearnedParams {
    /// Builds a params set from raw grid-search outputs, clamping every
    /// field to `default ± 50%` of the matching default.
    pub fn clamped(raw: &LearnedParamDefaults, defaults: &LearnedParamDefaults) -> Self {
        Self {
            rsi_oversold: clamp_to_half_range(raw.rsi_oversold, defaults.rsi_oversold),
            rsi_overbought: clamp_to_half_range(raw.rsi_overbought, defaults.rsi_overbought),
            stop_loss_pct: clamp_to_half_range(raw.stop_loss_pct, defaults.stop_loss_pct),
            take_profit_pct: clamp_to_half_range(raw.take_profit_pct, defaults.take_profit_pct),
            max_hold_hours: clamp_to_half_range(raw.max_hold_hours, defaults.max_hold_hours),
            base_position_pct: clamp_to_half_range(raw.base_position_pct, defaults.base_position_pct),
            buy_threshold: clamp_to_half_range(raw.buy_threshold, defaults.buy_threshold),
        }
    }

    pub fn from_defaults(defaults: &LearnedParamDefaults) -> Self {
        Self {
            rsi_oversold: defaults.rsi_oversold,
            rsi_overbought: defaults.rsi_overbought,
            stop_loss_pct: defaults.stop_loss_pct,
            take_profit_pct: defaults.take_profit_pct,
            max_hold_hours: defaults.max_hold_hours,
            base_position_pct: defaults.base_position_pct,
            buy_threshold: defaults.buy_threshold,
        }
    }
}

/// The full on-disk `learned-params.json` record the learning pass (C8)
/// writes and the strategy loader reads at the next boot/hot-reload
/// (spec §3 "Learned params"). `params` has already been through
/// [`LearnedParams::clamped`] before this is constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedParamsRecord {
    pub params: Option<LearnedParams>,
    pub confidence: f64,
    pub blacklist: Vec<String>,
    pub preferred_hours: Vec<u32>,
    pub avoid_hours: Vec<u32>,
    pub symbol_scores: HashMap<String, f64>,
    pub updated_ts: i64,
}

impl LearnedParamsRecord {
    /// Merges the learned override into `defaults` only when confidence
    /// clears the 0.5 gate (spec §3); otherwise the defaults pass through
    /// untouched. `params` is always pre-clamped so this merge can never
    /// destabilize behavior even at confidence 1.0.
    pub fn merge_into(&self, defaults: &LearnedParamDefaults) -> LearnedParamDefaults {
        if self.confidence < 0.5 {
            return *defaults;
        }
        match &self.params {
            Some(p) => LearnedParamDefaults {
                rsi_oversold: p.rsi_oversold,
                rsi_overbought: p.rsi_overbought,
                stop_loss_pct: p.stop_loss_pct,
                take_profit_pct: p.take_profit_pct,
                max_hold_hours: p.max_hold_hours,
                base_position_pct: p.base_position_pct,
                buy_threshold: p.buy_threshold,
            },
            None => *defaults,
        }
    }

    pub fn is_blacklisted(&self, symbol: &str) -> bool {
        self.blacklist.iter().any(|s| s == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_record_does_not_override_defaults() {
        let defaults = LearnedParamDefaults::default();
        let record = LearnedParamsRecord {
            params: Some(LearnedParams { take_profit_pct: 9.0, ..LearnedParams::from_defaults(&defaults) }),
            confidence: 0.3,
            ..Default::default()
        };
        assert_eq!(record.merge_into(&defaults), defaults);
    }

    #[test]
    fn sufficient_confidence_applies_clamped_override() {
        let defaults = LearnedParamDefaults::default();
        let raw = LearnedParamDefaults { take_profit_pct: 6.0, ..defaults };
        let clamped = LearnedParams::clamped(&raw, &defaults);
        let record = LearnedParamsRecord { params: Some(clamped), confidence: 0.7, ..Default::default() };
        let merged = record.merge_into(&defaults);
        assert_eq!(merged.take_profit_pct, clamped.take_profit_pct);
    }

    #[test]
    fn clamp_caps_outlandish_grid_search_output() {
        let defaults = LearnedParamDefaults::default();
        let mut raw = defaults;
        raw.take_profit_pct = 50.0; // way beyond default*1.5
        let clamped = LearnedParams::clamped(&raw, &defaults);
        assert!(clamped.take_profit_pct <= defaults.take_profit_pct * 1.5 + 1e-9);
    }

    #[test]
    fn clamp_respects_negative_defaults() {
        let defaults = LearnedParamDefaults::default();
        let mut raw = defaults;
        raw.stop_loss_pct = -100.0;
        let clamped = LearnedParams::clamped(&raw, &defaults);
        assert!(clamped.stop_loss_pct >= defaults.stop_loss_pct * 1.5 - 1e-9);
    }

    #[test]
    fn value_within_range_passes_through() {
        let defaults = LearnedParamDefaults::default();
        let raw = defaults;
        let clamped = LearnedParams::clamped(&raw, &defaults);
        assert_eq!(clamped.rsi_oversold, defaults.rsi_oversold);
    }
}

/// Property test (spec §8): no matter how wild a raw grid-search output
/// is, every clamped field stays within `default ± 50%` of its default.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn defaults() -> LearnedParamDefaults {
        LearnedParamDefaults::default()
    }

    fn within_half_range(value: f64, default: f64) -> bool {
        let spread = default.abs() * 0.5;
        let lo = (default - spread).min(default + spread);
        let hi = (default - spread).max(default + spread);
        value >= lo - 1e-9 && value <= hi + 1e-9
    }

    proptest! {
        #[test]
        fn clamped_fields_never_escape_half_range(
            rsi_oversold in -1000.0..1000.0f64,
            rsi_overbought in -1000.0..1000.0f64,
            stop_loss_pct in -1000.0..1000.0f64,
            take_profit_pct in -1000.0..1000.0f64,
            max_hold_hours in -1000.0..1000.0f64,
            base_position_pct in -1000.0..1000.0f64,
            buy_threshold in -1000.0..1000.0f64,
        ) {
            let d = defaults();
            let raw = LearnedParamDefaults {
                rsi_oversold, rsi_overbought, stop_loss_pct, take_profit_pct,
                max_hold_hours, base_position_pct, buy_threshold,
            };
            let clamped = LearnedParams::clamped(&raw, &d);
            prop_assert!(within_half_range(clamped.rsi_oversold, d.rsi_oversold));
            prop_assert!(within_half_range(clamped.rsi_overbought, d.rsi_overbought));
            prop_assert!(within_half_range(clamped.stop_loss_pct, d.stop_loss_pct));
            prop_assert!(within_half_range(clamped.take_profit_pct, d.take_profit_pct));
            prop_assert!(within_half_range(clamped.max_hold_hours, d.max_hold_hours));
            prop_assert!(within_half_range(clamped.base_position_pct, d.base_position_pct));
            prop_assert!(within_half_range(clamped.buy_threshold, d.buy_threshold));
        }
    }
}
