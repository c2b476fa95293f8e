//! Rule-based market sentiment score

use yensense_core::data::NEUTRAL_SENTIMENT;

/// Score yen sentiment from spot and inflation levels
///
/// Starts neutral at 50. A weak dollar (USD/JPY below 145) adds 10, a strong
/// one (above 150) subtracts 10. Japanese CPI above 106 adds 5, below 105
/// subtracts 5. The result is clamped to 0..=100.
pub fn calculate_sentiment_score(usd_jpy: Option<f64>, japan_cpi: Option<f64>) -> u8 {
    let mut score = i32::from(NEUTRAL_SENTIMENT);

    if let Some(rate) = usd_jpy {
        if rate < 145.0 {
            score += 10;
        } else if rate > 150.0 {
            score -= 10;
        }
    }

    if let Some(cpi) = japan_cpi {
        if cpi > 106.0 {
            score += 5;
        } else if cpi < 105.0 {
            score -= 5;
        }
    }

    u8::try_from(score.clamp(0, 100)).unwrap_or(NEUTRAL_SENTIMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_without_data() {
        assert_eq!(calculate_sentiment_score(None, None), 50);
    }

    #[test]
    fn test_fallback_levels() {
        // 147.25 is inside the neutral band, 106.5 CPI adds 5
        assert_eq!(calculate_sentiment_score(Some(147.25), Some(106.5)), 55);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(calculate_sentiment_score(Some(140.0), Some(107.0)), 65);
        assert_eq!(calculate_sentiment_score(Some(155.0), Some(104.0)), 35);
        assert_eq!(calculate_sentiment_score(Some(150.0), Some(105.0)), 50);
    }
}
