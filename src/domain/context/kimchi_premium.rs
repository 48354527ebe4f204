use super::ContextFragment;

/// The premium of the local KRW exchange price over the global
/// USD-converted price, in percent. A large positive premium means the
/// local market is overheated relative to the rest of the world — a sell
/// signal; a discount (negative premium) suggests the local market has
/// lagged a global rally and may catch up — a buy signal.
pub fn evaluate(premium_pct: Option<f64>) -> ContextFragment {
    let Some(premium) = premium_pct else {
        return ContextFragment::neutral();
    };
    let magnitude = ((premium.abs() - 1.0).max(0.0) / 4.0 * 1.5).min(1.5);
    if magnitude == 0.0 {
        ContextFragment::neutral()
    } else if premium > 0.0 {
        ContextFragment { buy_boost: 0.0, sell_boost: magnitude, reason: "kimchi_premium_overheated" }
    } else {
        ContextFragment { buy_boost: magnitude, sell_boost: 0.0, reason: "kimchi_premium_discount" }
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
    fn small_premium_is_neutral() {
        assert_eq!(evaluate(Some(0.5)), ContextFragment::neutral());
    }

    #[test]
    fn large_premium_is_sell() {
        let f = evaluate(Some(6.0));
        assert!(f.sell_boost > 0.0);
    }

    #[test]
    fn discount_is_buy() {
        let f = evaluate(Some(-3.0));
        assert!(f.buy_boost > 0.0);
    }
}
