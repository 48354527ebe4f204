use rust_decimal::Decimal;

use super::position::{Position, PositionParams};
use super::state_machine::can_dca;

/// A sized DCA fill request the application layer hands to the executor
/// once `plan_dca` says preconditions are met. Size mirrors the original
/// buy: same KRW amount as the initial entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcaPlan {
    pub krw_amount: Decimal,
}

pub fn plan_dca(
    pos: &Position,
    price: Decimal,
    now_ms: i64,
    last_rsi: Option<f64>,
    params: &PositionParams,
) -> Option<DcaPlan> {
    if !can_dca(pos, price, now_ms, last_rsi, params) {
        return None;
    }
    Some(DcaPlan { krw_amount: pos.entry_price * pos.quantity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_plan_when_preconditions_fail() {
        let params = PositionParams::default();
        let pos = Position::new("BTC/KRW", dec!(100), dec!(1), 0, &params, "x");
        assert!(plan_dca(&pos, dec!(97), 0, Some(30.0), &params).is_none());
    }

    #[test]
    fn plan_sizes_like_original_buy() {
        let params = PositionParams::default();
        let pos = Position::new("BTC/KRW", dec!(100), dec!(2), 0, &params, "x");
        let ready_ms = params.dca_min_hold_min * 60_000 + 1;
        let plan = plan_dca(&pos, dec!(96), ready_ms, Some(30.0), &params).unwrap();
        assert_eq!(plan.krw_amount, dec!(200));
    }
}
