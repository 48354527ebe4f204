use super::ContextFragment;

/// Net large-wallet exchange flow as percent of daily volume. Positive
/// means net inflow to exchanges (whales positioning to sell) — a sell
/// signal; negative means net outflow to cold storage (accumulation) — a
/// buy signal.
pub fn evaluate(net_inflow_pct: Option<f64>) -> ContextFragment {
    let Some(flow) = net_inflow_pct else {
        return ContextFragment::neutral();
    };
    let magnitude = (flow.abs() / 2.0 * 1.5).min(1.5);
    if magnitude < 0.1 {
        ContextFragment::neutral()
    } else if flow > 0.0 {
        ContextFragment { buy_boost: 0.0, sell_boost: magnitude, reason: "whale_inflow" }
    } else {
        ContextFragment { buy_boost: magnitude, sell_boost: 0.0, reason: "whale_outflow" }
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
    fn heavy_inflow_is_sell() {
        let f = evaluate(Some(3.0));
        assert!(f.sell_boost > 0.0);
    }

    #[test]
    fn heavy_outflow_is_buy() {
        let f = evaluate(Some(-3.0));
        assert!(f.buy_boost > 0.0);
    }
}
