use serde::{Deserialize, Serialize};

use crate::domain::market::regime::Regime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossPatternAction {
    Warn,
    Block,
}

/// A condition bucket the learning pass found to correlate with losses
/// (spec §4.8 step 7: `lossrate ≥ 60% AND trades ≥ 5 → block`,
/// `≥ 50% → warn`). Any unset bucket matches anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossPatternRule {
    pub rsi_below: Option<f64>,
    pub bb_position_above: Option<f64>,
    pub hour: Option<u32>,
    pub regime: Option<Regime>,
    pub symbol: Option<String>,
    pub action: LossPatternAction,
    pub lossrate: f64,
    pub trades: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct LossPatternContext<'a> {
    pub rsi: Option<f64>,
    pub bb_position: Option<f64>,
    pub hour: u32,
    pub regime: Option<Regime>,
    pub symbol: &'a str,
}

fn matches(rule: &LossPatternRule, ctx: &LossPatternContext<'_>) -> bool {
    if let Some(threshold) = rule.rsi_below {
        match ctx.rsi {
            Some(rsi) if rsi < threshold => {}
            _ => return false,
        }
    }
    if let Some(threshold) = rule.bb_position_above {
        match ctx.bb_position {
            Some(pos) if pos > threshold => {}
            _ => return false,
        }
    }
    if let Some(hour) = rule.hour {
        if hour != ctx.hour {
            return false;
        }
    }
    if let Some(regime) = rule.regime {
        if Some(regime) != ctx.regime {
            return false;
        }
    }
    if let Some(symbol) = &rule.symbol {
        if symbol != ctx.symbol {
            return false;
        }
    }
    true
}

/// Any matching rule with `action=Block` short-circuits the compositor to
/// HOLD; a matching `Warn` rule is surfaced but doesn't block.
pub fn check(rules: &[LossPatternRule], ctx: &LossPatternContext<'_>) -> Option<LossPatternAction> {
    let mut warned = false;
    for rule in rules {
        if matches(rule, ctx) {
            match rule.action {
                LossPatternAction::Block => return Some(LossPatternAction::Block),
                LossPatternAction::Warn => warned = true,
            }
        }
    }
    if warned {
        Some(LossPatternAction::Warn)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LossPatternContext<'static> {
        LossPatternContext { rsi: Some(28.0), bb_position: Some(0.1), hour: 3, regime: Some(Regime::Volatile), symbol: "BTC/KRW" }
    }

    #[test]
    fn no_rules_is_none() {
        assert_eq!(check(&[], &ctx()), None);
    }

    #[test]
    fn matching_block_rule_short_circuits() {
        let rules = vec![LossPatternRule {
            rsi_below: Some(30.0),
            bb_position_above: None,
            hour: None,
            regime: None,
            symbol: None,
            action: LossPatternAction::Block,
            lossrate: 0.65,
            trades: 8,
        }];
        assert_eq!(check(&rules, &ctx()), Some(LossPatternAction::Block));
    }

    #[test]
    fn non_matching_rule_is_ignored() {
        let rules = vec![LossPatternRule {
            rsi_below: Some(10.0),
            bb_position_above: None,
            hour: None,
            regime: None,
            symbol: None,
            action: LossPatternAction::Block,
            lossrate: 0.65,
            trades: 8,
        }];
        assert_eq!(check(&rules, &ctx()), None);
    }
}
