use chrono::Timelike;

/// Cumulative guardrails layered on top of the compositor's base
/// threshold and the executor's base position size, evaluated fresh each
/// scan (spec §4.4 "Adaptive filter"). Additive on the score side,
/// multiplicative on the size side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveAdjustment {
    pub min_score_bump: f64,
    pub position_size_mult: f64,
    pub hard_cooldown_until_ms: Option<i64>,
}

impl Default for AdaptiveAdjustment {
    fn default() -> Self {
        Self { min_score_bump: 0.0, position_size_mult: 1.0, hard_cooldown_until_ms: None }
    }
}

pub struct AdaptiveFilterInput {
    pub now_ms: i64,
    pub consecutive_losses: u32,
    pub last_loss_ts: Option<i64>,
    pub fear_greed: Option<u8>,
    pub today_sells: u32,
    pub today_wins: u32,
}

/// Night hours (00-06 UTC-local per tenant clock) add +0.5; 2+ consecutive
/// losses add +0.5 and a 30-minute hard cooldown since the last loss;
/// Fear&Greed below 20 adds +1.0 (layered over C2's contrarian buy-boost,
/// deliberately working against it); win rate below 40% after 5+ sells
/// halves position size.
pub fn evaluate(input: &AdaptiveFilterInput) -> AdaptiveAdjustment {
    let mut adj = AdaptiveAdjustment::default();

    let hour = chrono::DateTime::from_timestamp_millis(input.now_ms)
        .map(|dt| dt.hour())
        .unwrap_or(12);
    if hour < 6 {
        adj.min_score_bump += 0.5;
    }

    if input.consecutive_losses >= 2 {
        adj.min_score_bump += 0.5;
        if let Some(last_loss) = input.last_loss_ts {
            adj.hard_cooldown_until_ms = Some(last_loss + 30 * 60_000);
        }
    }

    if let Some(fg) = input.fear_greed {
        if fg < 20 {
            adj.min_score_bump += 1.0;
        }
    }

    if input.today_sells >= 5 {
        let win_rate = input.today_wins as f64 / input.today_sells as f64;
        if win_rate < 0.4 {
            adj.position_size_mult *= 0.5;
        }
    }

    adj
}

impl AdaptiveAdjustment {
    pub fn is_in_hard_cooldown(&self, now_ms: i64) -> bool {
        self.hard_cooldown_until_ms.map(|until| now_ms < until).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2024-01-01T12:00:00Z — a daytime timestamp so night-hours bumps
    /// don't leak into tests that aren't exercising that rule.
    const NOON_UTC_MS: i64 = 1_704_110_400_000;

    #[test]
    fn fear_greed_extreme_adds_full_point() {
        let input = AdaptiveFilterInput {
            now_ms: NOON_UTC_MS,
            consecutive_losses: 0,
            last_loss_ts: None,
            fear_greed: Some(5),
            today_sells: 0,
            today_wins: 0,
        };
        assert!((evaluate(&input).min_score_bump - 1.0).abs() < 0.01);
    }

    #[test]
    fn consecutive_losses_sets_cooldown() {
        let input = AdaptiveFilterInput {
            now_ms: 1_000_000,
            consecutive_losses: 2,
            last_loss_ts: Some(1_000_000),
            fear_greed: None,
            today_sells: 0,
            today_wins: 0,
        };
        let adj = evaluate(&input);
        assert!(adj.is_in_hard_cooldown(1_000_000 + 10 * 60_000));
        assert!(!adj.is_in_hard_cooldown(1_000_000 + 31 * 60_000));
    }

    #[test]
    fn poor_win_rate_halves_position_size() {
        let input = AdaptiveFilterInput {
            now_ms: 0,
            consecutive_losses: 0,
            last_loss_ts: None,
            fear_greed: None,
            today_sells: 6,
            today_wins: 1,
        };
        assert_eq!(evaluate(&input).position_size_mult, 0.5);
    }

    #[test]
    fn healthy_win_rate_keeps_full_size() {
        let input = AdaptiveFilterInput {
            now_ms: 0,
            consecutive_losses: 0,
            last_loss_ts: None,
            fear_greed: None,
            today_sells: 6,
            today_wins: 5,
        };
        assert_eq!(evaluate(&input).position_size_mult, 1.0);
    }
}
