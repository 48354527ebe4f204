use super::ContextFragment;

const SOCIAL_WEIGHT: f64 = 0.35;
const NEWS_WEIGHT: f64 = 0.25;
const FEAR_GREED_WEIGHT: f64 = 0.40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FearGreedClassification {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl FearGreedClassification {
    fn from_score(score: u8) -> Self {
        match score {
            0..=19 => Self::ExtremeFear,
            20..=44 => Self::Fear,
            45..=55 => Self::Neutral,
            56..=80 => Self::Greed,
            _ => Self::ExtremeGreed,
        }
    }
}

/// Raw provider readings before merging (spec §4.2): social and news
/// scores live on [-100, 100], Fear&Greed on [0, 100]. Every field is
/// optional — a provider that failed to fetch this cycle simply drops out
/// of the weighted average instead of forcing a neutral reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentInputs {
    pub social_score: Option<f64>,
    pub news_score: Option<f64>,
    pub fear_greed: Option<u8>,
    pub symbol_mentions: u32,
    pub symbol_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentSnapshot {
    pub merged_score: f64,
    pub fear_greed_class: Option<FearGreedClassification>,
    pub per_symbol_score: Option<f64>,
    pub fragment: ContextFragment,
}

fn fear_greed_as_signed(value: u8) -> f64 {
    (value as f64 - 50.0) * 2.0
}

/// Merges social/news/Fear&Greed into one [-100, 100] score with fixed
/// weights, renormalized over whichever sources actually reported this
/// cycle, then layers a contrarian boost when Fear&Greed sits at an
/// extreme and a per-symbol nudge when the symbol was mentioned at all.
pub fn merge_sentiment(inputs: &SentimentInputs) -> SentimentSnapshot {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    if let Some(s) = inputs.social_score {
        weighted_sum += s * SOCIAL_WEIGHT;
        weight_total += SOCIAL_WEIGHT;
    }
    if let Some(n) = inputs.news_score {
        weighted_sum += n * NEWS_WEIGHT;
        weight_total += NEWS_WEIGHT;
    }
    let fear_greed_class = inputs.fear_greed.map(FearGreedClassification::from_score);
    if let Some(fg) = inputs.fear_greed {
        weighted_sum += fear_greed_as_signed(fg) * FEAR_GREED_WEIGHT;
        weight_total += FEAR_GREED_WEIGHT;
    }

    if weight_total == 0.0 {
        return SentimentSnapshot {
            merged_score: 0.0,
            fear_greed_class: None,
            per_symbol_score: None,
            fragment: ContextFragment::neutral(),
        };
    }

    let mut merged_score = weighted_sum / weight_total;

    if let Some(class) = fear_greed_class {
        match class {
            FearGreedClassification::ExtremeFear => merged_score += 20.0,
            FearGreedClassification::ExtremeGreed => merged_score -= 20.0,
            _ => {}
        }
    }
    merged_score = merged_score.clamp(-100.0, 100.0);

    let per_symbol_score = if inputs.symbol_mentions >= 1 { inputs.symbol_score } else { None };

    let mut magnitude = (merged_score.abs() / 100.0 * 1.5).min(1.5);
    if let Some(symbol_score) = per_symbol_score {
        if symbol_score.signum() == merged_score.signum() || merged_score == 0.0 {
            magnitude = (magnitude + symbol_score.abs() / 100.0 * 0.5).min(1.5);
        }
    }

    let fragment = if magnitude == 0.0 {
        ContextFragment::neutral()
    } else if merged_score > 0.0 {
        ContextFragment { buy_boost: magnitude, sell_boost: 0.0, reason: "sentiment_bullish" }
    } else {
        ContextFragment { buy_boost: 0.0, sell_boost: magnitude, reason: "sentiment_bearish" }
    };

    SentimentSnapshot { merged_score, fear_greed_class, per_symbol_score, fragment }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_inputs_is_neutral() {
        let snap = merge_sentiment(&SentimentInputs::default());
        assert_eq!(snap.merged_score, 0.0);
        assert_eq!(snap.fragment, ContextFragment::neutral());
    }

    #[test]
    fn extreme_fear_gets_contrarian_buy_boost() {
        let inputs = SentimentInputs { fear_greed: Some(10), ..Default::default() };
        let snap = merge_sentiment(&inputs);
        assert!(snap.merged_score > 0.0, "expected contrarian-positive merge, got {}", snap.merged_score);
        assert!(snap.fragment.buy_boost > 0.0);
    }

    #[test]
    fn unmentioned_symbol_ignores_symbol_score() {
        let inputs = SentimentInputs {
            social_score: Some(10.0),
            symbol_mentions: 0,
            symbol_score: Some(90.0),
            ..Default::default()
        };
        let snap = merge_sentiment(&inputs);
        assert_eq!(snap.per_symbol_score, None);
    }
}
