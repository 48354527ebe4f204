use super::ContextFragment;

/// Perpetual-futures funding rate as percent per 8h period. Strongly
/// positive funding means longs are crowded and paying to hold — treated
/// as a contrarian sell signal; strongly negative means shorts are
/// crowded, a contrarian buy signal. `None` (no futures data for this
/// symbol) degrades to neutral.
pub fn evaluate(funding_rate_pct: Option<f64>) -> ContextFragment {
    let Some(rate) = funding_rate_pct else {
        return ContextFragment::neutral();
    };
    let magnitude = (rate.abs() / 0.1 * 1.5).min(1.5);
    if magnitude < 0.1 {
        ContextFragment::neutral()
    } else if rate > 0.0 {
        ContextFragment { buy_boost: 0.0, sell_boost: magnitude, reason: "funding_rate_crowded_long" }
    } else {
        ContextFragment { buy_boost: magnitude, sell_boost: 0.0, reason: "funding_rate_crowded_short" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_is_neutral() {
        assert_eq!(evaluate(None), ContextFragment::neutral());
    }

    #[test]
    fn high_positive_funding_is_contrarian_sell() {
        let f = evaluate(Some(0.15));
        assert!(f.sell_boost > 0.0);
        assert_eq!(f.buy_boost, 0.0);
    }

    #[test]
    fn high_negative_funding_is_contrarian_buy() {
        let f = evaluate(Some(-0.2));
        assert!(f.buy_boost > 0.0);
        assert_eq!(f.sell_boost, 0.0);
    }
}
