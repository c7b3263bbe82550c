//! Next-day supply prediction
//!
//! A small local forecasting heuristic: weighted moving average over the
//! most recent sales, a trend classification, a dispersion-based confidence
//! score, and a day-of-week adjustment factor. Pure and deterministic —
//! every input, including an empty history, degrades to a usable default.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Fallback quantity for items with no sales history
const DEFAULT_QUANTITY: u32 = 10;

/// Fallback confidence for items with no sales history
const DEFAULT_CONFIDENCE: f64 = 0.1;

/// Confidence for items with fewer than three observations
const SPARSE_CONFIDENCE: f64 = 0.3;

/// Recency weights, most recent observation first
const RECENCY_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Confidence clamp floor
const CONFIDENCE_MIN: f64 = 0.1;

/// Confidence clamp ceiling
const CONFIDENCE_MAX: f64 = 0.9;

/// Number of trailing observations examined for the trend
const TREND_WINDOW: usize = 5;

/// Relative band around the first-half mean within which the trend is stable
const TREND_BAND: f64 = 0.1;

/// Direction of recent demand for a menu item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// One day of historical sales for a menu item, as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    /// Date of sale
    pub date: NaiveDate,
    /// Menu item name
    pub menu_item: String,
    /// Units sold
    pub quantity: u32,
    /// Unit price in rupiah
    pub price: f64,
    /// Weather note for the day, when the backend recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
}

/// Predicted next-day supply need for a menu item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Menu item name
    pub menu_item: String,
    /// Predicted units to prepare
    pub predicted_quantity: u32,
    /// Confidence in the prediction, clamped to [0.1, 0.9]
    pub confidence: f64,
    /// Recent demand direction
    pub trend: Trend,
    /// Mean daily quantity over the full history
    pub historical_average: f64,
}

/// Predict the supply need for one menu item on `target_date`.
///
/// Records for other items are ignored; records for the item are sorted
/// chronologically before weighting. An empty history yields the default
/// prediction (quantity 10, confidence 0.1, stable trend).
#[must_use]
pub fn predict(menu_item: &str, history: &[SalesRecord], target_date: NaiveDate) -> Prediction {
    let mut records: Vec<&SalesRecord> = history
        .iter()
        .filter(|r| r.menu_item == menu_item)
        .collect();
    records.sort_by_key(|r| r.date);

    let quantities: Vec<f64> = records.iter().map(|r| f64::from(r.quantity)).collect();

    if quantities.is_empty() {
        tracing::debug!(menu_item, "no history, using default prediction");
        return Prediction {
            menu_item: menu_item.to_string(),
            predicted_quantity: DEFAULT_QUANTITY,
            confidence: DEFAULT_CONFIDENCE,
            trend: Trend::Stable,
            historical_average: 0.0,
        };
    }

    let overall_average = mean(&quantities);
    let base = round_quantity(weighted_average(&quantities));
    let factor = weekday_factor(&records, target_date.weekday(), overall_average);
    let predicted_quantity = round_quantity(f64::from(base) * factor);

    Prediction {
        menu_item: menu_item.to_string(),
        predicted_quantity,
        confidence: confidence_of(&quantities),
        trend: trend_of(&quantities),
        historical_average: round2(overall_average),
    }
}

/// Predict every menu item that appears in `history`.
///
/// Items are emitted in first-appearance order.
#[must_use]
pub fn predict_all(history: &[SalesRecord], target_date: NaiveDate) -> Vec<Prediction> {
    let mut items: Vec<&str> = Vec::new();
    for record in history {
        if !items.contains(&record.menu_item.as_str()) {
            items.push(&record.menu_item);
        }
    }

    items
        .into_iter()
        .map(|item| predict(item, history, target_date))
        .collect()
}

/// Weighted moving average over the last (up to) three observations.
///
/// Weights are applied most-recent-first and renormalized to sum to one
/// when fewer than three observations exist.
fn weighted_average(quantities: &[f64]) -> f64 {
    let n = quantities.len().min(RECENCY_WEIGHTS.len());
    let weights = &RECENCY_WEIGHTS[..n];
    let total: f64 = weights.iter().sum();

    quantities
        .iter()
        .rev()
        .take(n)
        .zip(weights)
        .map(|(q, w)| q * w / total)
        .sum()
}

/// Classify the trend over the trailing window.
///
/// Compares the mean of the first half against the second half of the last
/// five observations; a difference beyond 10% of the first-half mean counts
/// as a direction. Fewer than two points is always stable.
fn trend_of(quantities: &[f64]) -> Trend {
    if quantities.len() < 2 {
        return Trend::Stable;
    }

    let start = quantities.len().saturating_sub(TREND_WINDOW);
    let window = &quantities[start..];
    let mid = window.len() / 2;
    let first = mean(&window[..mid]);
    let second = mean(&window[mid..]);
    let band = first * TREND_BAND;

    if second > first + band {
        Trend::Up
    } else if second < first - band {
        Trend::Down
    } else {
        Trend::Stable
    }
}

/// Confidence from the inverted coefficient of variation of the history.
///
/// Clamped to [0.1, 0.9] and rounded to two decimals. Fewer than three
/// observations yields a fixed 0.3; an all-zero history yields the floor.
fn confidence_of(quantities: &[f64]) -> f64 {
    if quantities.len() < 3 {
        return SPARSE_CONFIDENCE;
    }

    let m = mean(quantities);
    if m <= f64::EPSILON {
        return CONFIDENCE_MIN;
    }

    let variance = quantities.iter().map(|q| (q - m).powi(2)).sum::<f64>()
        / usize_to_f64(quantities.len());
    let cv = variance.sqrt() / m;

    round2((1.0 - cv).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX))
}

/// Ratio of the same-weekday average to the overall average.
///
/// Returns 1.0 (no scaling) when no same-weekday records exist or the
/// overall average is zero.
fn weekday_factor(records: &[&SalesRecord], weekday: Weekday, overall_average: f64) -> f64 {
    if overall_average <= f64::EPSILON {
        return 1.0;
    }

    let same_day: Vec<f64> = records
        .iter()
        .filter(|r| r.date.weekday() == weekday)
        .map(|r| f64::from(r.quantity))
        .collect();

    if same_day.is_empty() {
        1.0
    } else {
        mean(&same_day) / overall_average
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / usize_to_f64(values.len())
}

/// Round to the nearest whole quantity, never negative.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_quantity(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn usize_to_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, item: &str, quantity: u32) -> SalesRecord {
        SalesRecord {
            date: date.parse().unwrap(),
            menu_item: item.to_string(),
            quantity,
            price: 15_000.0,
            weather: None,
        }
    }

    fn any_date() -> NaiveDate {
        "2024-06-14".parse().unwrap()
    }

    #[test]
    fn empty_history_uses_defaults() {
        let p = predict("ayam goreng", &[], any_date());
        assert_eq!(p.predicted_quantity, 10);
        assert!((p.confidence - 0.1).abs() < f64::EPSILON);
        assert_eq!(p.trend, Trend::Stable);
        assert!((p.historical_average - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weights_align_to_recency() {
        // Oldest to newest: 10, 20, 30. Most recent carries 0.5:
        // 30*0.5 + 20*0.3 + 10*0.2 = 23
        let history = vec![
            record("2024-06-10", "tempe", 10),
            record("2024-06-11", "tempe", 20),
            record("2024-06-12", "tempe", 30),
        ];
        // Thursday target: history has Mon-Wed only, so no weekday scaling
        let p = predict("tempe", &history, "2024-06-13".parse().unwrap());
        assert_eq!(p.predicted_quantity, 23);
    }

    #[test]
    fn weights_renormalize_for_short_history() {
        // Two observations: weights 0.5/0.3 renormalized -> 0.625/0.375
        // 20*0.625 + 10*0.375 = 16.25 -> 16
        let history = vec![
            record("2024-06-10", "tahu", 10),
            record("2024-06-11", "tahu", 20),
        ];
        let p = predict("tahu", &history, "2024-06-13".parse().unwrap());
        assert_eq!(p.predicted_quantity, 16);
    }

    #[test]
    fn zero_variance_confidence_hits_ceiling() {
        let history = vec![
            record("2024-06-10", "sayur", 15),
            record("2024-06-11", "sayur", 15),
            record("2024-06-12", "sayur", 15),
        ];
        let p = predict("sayur", &history, any_date());
        assert!((p.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn sparse_history_confidence_is_fixed() {
        let history = vec![
            record("2024-06-10", "sayur", 5),
            record("2024-06-11", "sayur", 50),
        ];
        let p = predict("sayur", &history, "2024-06-13".parse().unwrap());
        assert!((p.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn all_zero_history_confidence_is_floor() {
        let history = vec![
            record("2024-06-10", "es teh", 0),
            record("2024-06-11", "es teh", 0),
            record("2024-06-12", "es teh", 0),
        ];
        let p = predict("es teh", &history, any_date());
        assert!((p.confidence - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn rising_series_trends_up() {
        let history = vec![
            record("2024-06-08", "ayam", 5),
            record("2024-06-09", "ayam", 6),
            record("2024-06-10", "ayam", 10),
            record("2024-06-11", "ayam", 12),
            record("2024-06-12", "ayam", 15),
        ];
        let p = predict("ayam", &history, any_date());
        assert_eq!(p.trend, Trend::Up);
    }

    #[test]
    fn falling_series_trends_down() {
        let history = vec![
            record("2024-06-08", "ayam", 20),
            record("2024-06-09", "ayam", 18),
            record("2024-06-10", "ayam", 10),
            record("2024-06-11", "ayam", 8),
            record("2024-06-12", "ayam", 5),
        ];
        let p = predict("ayam", &history, any_date());
        assert_eq!(p.trend, Trend::Down);
    }

    #[test]
    fn flat_series_is_stable() {
        let history = vec![
            record("2024-06-10", "ayam", 10),
            record("2024-06-11", "ayam", 10),
            record("2024-06-12", "ayam", 11),
        ];
        let p = predict("ayam", &history, any_date());
        assert_eq!(p.trend, Trend::Stable);
    }

    #[test]
    fn single_point_is_stable() {
        let history = vec![record("2024-06-12", "ayam", 10)];
        let p = predict("ayam", &history, any_date());
        assert_eq!(p.trend, Trend::Stable);
    }

    #[test]
    fn weekday_scaling_is_a_pure_multiplier() {
        // Fridays sell double the overall average
        let history = vec![
            record("2024-05-31", "rendang", 20), // Friday
            record("2024-06-03", "rendang", 10), // Monday
            record("2024-06-04", "rendang", 10), // Tuesday
            record("2024-06-07", "rendang", 20), // Friday
            record("2024-06-10", "rendang", 10), // Monday
            record("2024-06-11", "rendang", 10), // Tuesday
        ];
        let overall: f64 = 80.0 / 6.0;
        let friday_avg = 20.0;
        let factor = friday_avg / overall;

        // Base from the last three (Fri 20, Mon 10, Tue 10), most recent
        // first: 10*0.5 + 10*0.3 + 20*0.2 = 12
        let friday: NaiveDate = "2024-06-14".parse().unwrap();
        let p = predict("rendang", &history, friday);
        let expected = (12.0 * factor).round();
        assert_eq!(f64::from(p.predicted_quantity), expected);

        // A weekday with no history at all leaves the base unscaled
        let sunday: NaiveDate = "2024-06-16".parse().unwrap();
        let p = predict("rendang", &history, sunday);
        assert_eq!(p.predicted_quantity, 12);
    }

    #[test]
    fn other_items_are_ignored() {
        let history = vec![
            record("2024-06-10", "ayam", 10),
            record("2024-06-11", "tempe", 99),
            record("2024-06-12", "ayam", 10),
        ];
        let p = predict("ayam", &history, "2024-06-13".parse().unwrap());
        assert!((p.historical_average - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unsorted_history_is_sorted_before_weighting() {
        let history = vec![
            record("2024-06-12", "tempe", 30),
            record("2024-06-10", "tempe", 10),
            record("2024-06-11", "tempe", 20),
        ];
        let p = predict("tempe", &history, "2024-06-13".parse().unwrap());
        assert_eq!(p.predicted_quantity, 23);
    }

    #[test]
    fn predict_all_covers_each_item_once() {
        let history = vec![
            record("2024-06-10", "ayam", 10),
            record("2024-06-10", "tempe", 5),
            record("2024-06-11", "ayam", 12),
        ];
        let all = predict_all(&history, any_date());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].menu_item, "ayam");
        assert_eq!(all[1].menu_item, "tempe");
    }
}
