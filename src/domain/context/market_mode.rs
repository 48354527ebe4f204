use crate::domain::market::regime::Regime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketMode {
    Aggressive,
    Scalping,
    Defensive,
}

/// The full strategy profile a mode drives (spec §4.2): the trading loop
/// reads this once per scan and layers it on top of per-regime
/// multipliers and per-tenant base parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketModeProfile {
    pub buy_threshold_mult: f64,
    pub max_positions_bonus: i32,
    pub position_size_mult: f64,
    pub stop_loss_mult: f64,
    pub take_profit_mult: f64,
    pub max_hold_mult: f64,
    pub trailing_distance_pct: f64,
    pub hourly_max_trades: u32,
    pub dca_enabled: bool,
}

impl MarketMode {
    pub fn profile(self) -> MarketModeProfile {
        match self {
            MarketMode::Aggressive => MarketModeProfile {
                buy_threshold_mult: 0.85,
                max_positions_bonus: 2,
                position_size_mult: 1.2,
                stop_loss_mult: 1.2,
                take_profit_mult: 1.3,
                max_hold_mult: 1.3,
                trailing_distance_pct: 1.5,
                hourly_max_trades: 15,
                dca_enabled: true,
            },
            MarketMode::Scalping => MarketModeProfile {
                buy_threshold_mult: 1.0,
                max_positions_bonus: 1,
                position_size_mult: 0.7,
                stop_loss_mult: 0.7,
                take_profit_mult: 0.6,
                max_hold_mult: 0.4,
                trailing_distance_pct: 0.6,
                hourly_max_trades: 20,
                dca_enabled: false,
            },
            MarketMode::Defensive => MarketModeProfile {
                buy_threshold_mult: 1.4,
                max_positions_bonus: 0,
                position_size_mult: 0.5,
                stop_loss_mult: 0.8,
                take_profit_mult: 0.8,
                max_hold_mult: 0.7,
                trailing_distance_pct: 2.0,
                hourly_max_trades: 5,
                dca_enabled: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketModeInput {
    pub fear_greed: Option<u8>,
    pub regime: Option<Regime>,
    pub btc_momentum_pct: Option<f64>,
    pub btc_dominance_trend_pct: Option<f64>,
}

/// Folds Fear&Greed + regime + BTC momentum + dominance trend into one
/// scalar and buckets it into a mode. Ranging markets with no strong
/// directional push default to scalping rather than defensive, since a
/// choppy range is exactly where small frequent trades are viable.
pub fn compute_market_mode(input: &MarketModeInput) -> MarketMode {
    let mut score = 0.0;

    if let Some(fg) = input.fear_greed {
        if fg > 70 {
            score += 1.0;
        } else if fg < 30 {
            score -= 1.0;
        }
    }
    match input.regime {
        Some(Regime::Trending) => score += 1.0,
        Some(Regime::Volatile) => score -= 1.0,
        Some(Regime::Ranging) | None => {}
    }
    if let Some(momentum) = input.btc_momentum_pct {
        if momentum > 1.0 {
            score += 1.0;
        } else if momentum < -1.0 {
            score -= 1.0;
        }
    }
    if let Some(dominance) = input.btc_dominance_trend_pct {
        if dominance > 0.5 {
            score -= 0.5;
        } else if dominance < -0.5 {
            score += 0.5;
        }
    }

    if score >= 1.5 {
        MarketMode::Aggressive
    } else if score <= -1.5 {
        MarketMode::Defensive
    } else {
        MarketMode::Scalping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_bullish_signals_is_aggressive() {
        let input = MarketModeInput {
            fear_greed: Some(80),
            regime: Some(Regime::Trending),
            btc_momentum_pct: Some(2.0),
            btc_dominance_trend_pct: None,
        };
        assert_eq!(compute_market_mode(&input), MarketMode::Aggressive);
    }

    #[test]
    fn all_bearish_signals_is_defensive() {
        let input = MarketModeInput {
            fear_greed: Some(10),
            regime: Some(Regime::Volatile),
            btc_momentum_pct: Some(-2.0),
            btc_dominance_trend_pct: Some(1.0),
        };
        assert_eq!(compute_market_mode(&input), MarketMode::Defensive);
    }

    #[test]
    fn neutral_ranging_input_is_scalping() {
        let input = MarketModeInput {
            fear_greed: Some(50),
            regime: Some(Regime::Ranging),
            btc_momentum_pct: Some(0.1),
            btc_dominance_trend_pct: None,
        };
        assert_eq!(compute_market_mode(&input), MarketMode::Scalping);
    }
}
