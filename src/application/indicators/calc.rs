//! Pure indicator math over closed-candle history. Each function returns the
//! latest value, or `None` when the history is too short for the requested
//! period.
//!
//! Smoothing conventions: EMA is seeded with SMA(P) and folded with
//! α = 2/(P+1); RSI and ATR use Wilder's smoothing (seed = simple mean of the
//! first P terms, then `(prev·(P−1) + current) / P`).

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average over the whole available history, seeded with
/// SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = values[..period].iter().sum::<f64>() / period as f64;
    for &v in &values[period..] {
        value = alpha * v + (1.0 - alpha) * value;
    }
    Some(value)
}

/// Wilder RSI. Defined once `period + 1` values are available; bounded
/// [0, 100].
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// True range series: `max(H−L, |H−prevC|, |L−prevC|)`; the first element is
/// plain high − low.
fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let mut ranges = Vec::with_capacity(highs.len());
    for i in 0..highs.len() {
        let h_l = highs[i] - lows[i];
        let tr = if i == 0 {
            h_l
        } else {
            let h_pc = (highs[i] - closes[i - 1]).abs();
            let l_pc = (lows[i] - closes[i - 1]).abs();
            h_l.max(h_pc).max(l_pc)
        };
        ranges.push(tr);
    }
    ranges
}

/// Wilder ATR over OHLC history.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || highs.len() < period || highs.len() != lows.len() || highs.len() != closes.len()
    {
        return None;
    }
    let ranges = true_ranges(highs, lows, closes);
    let mut value = ranges[..period].iter().sum::<f64>() / period as f64;
    for &tr in &ranges[period..] {
        value = (value * (period as f64 - 1.0) + tr) / period as f64;
    }
    Some(value)
}

/// Bollinger bands: (upper, middle, lower) with middle = SMA(P) and a
/// population standard deviation over the same window.
pub fn bollinger(values: &[f64], period: usize, k: f64) -> Option<(f64, f64, f64)> {
    let middle = sma(values, period)?;
    let window = &values[values.len() - period..];
    let variance =
        window.iter().map(|v| (v - middle) * (v - middle)).sum::<f64>() / period as f64;
    let sigma = variance.sqrt();
    Some((middle + k * sigma, middle, middle - k * sigma))
}

/// MACD line, signal line and histogram.
///
/// The signal line is an EMA of the MACD series, so `slow + signal` values
/// are required before all three parts are defined.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<(f64, f64, f64)> {
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return None;
    }
    if values.len() < slow + signal {
        return None;
    }

    // MACD series from the first index where the slow EMA exists.
    let mut series = Vec::with_capacity(values.len() - slow + 1);
    for end in slow..=values.len() {
        let window = &values[..end];
        let macd_value = ema(window, fast)? - ema(window, slow)?;
        series.push(macd_value);
    }

    let macd_value = *series.last()?;
    let signal_value = ema(&series, signal)?;
    Some((macd_value, signal_value, macd_value - signal_value))
}

/// Latest Supertrend value and trend direction (`true` = bullish), applying
/// the band carry rule across the whole history: in an uptrend the final
/// upper band only ratchets down, in a downtrend the final lower band only
/// ratchets up, and bands reset on a trend flip.
pub fn supertrend(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Option<(f64, bool)> {
    if period == 0 || highs.len() < period {
        return None;
    }
    let ranges = true_ranges(highs, lows, closes);

    let mut atr_value = ranges[..period].iter().sum::<f64>() / period as f64;
    let mut prev_upper = (highs[period - 1] + lows[period - 1]) / 2.0 + multiplier * atr_value;
    let mut prev_lower = (highs[period - 1] + lows[period - 1]) / 2.0 - multiplier * atr_value;
    let mut bullish = true;

    for i in period..highs.len() {
        atr_value = (atr_value * (period as f64 - 1.0) + ranges[i]) / period as f64;
        let hl2 = (highs[i] + lows[i]) / 2.0;
        let basic_upper = hl2 + multiplier * atr_value;
        let basic_lower = hl2 - multiplier * atr_value;
        let prev_close = closes[i - 1];

        // Band carry: the upper band only moves down (resets once the close
        // escapes above it); the lower band only moves up (resets below).
        let final_upper = if basic_upper < prev_upper || prev_close > prev_upper {
            basic_upper
        } else {
            prev_upper
        };
        let final_lower = if basic_lower > prev_lower || prev_close < prev_lower {
            basic_lower
        } else {
            prev_lower
        };

        bullish = if bullish {
            closes[i] > final_lower
        } else {
            closes[i] >= final_upper
        };

        prev_upper = final_upper;
        prev_lower = final_lower;
    }

    let value = if bullish { prev_lower } else { prev_upper };
    Some((value, bullish))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&values, 5), Some(3.0));
        assert_eq!(sma(&values, 2), Some(4.5));
        assert_eq!(sma(&values, 6), None);
    }

    #[test]
    fn test_ema_seeds_with_sma() {
        let values = [2.0, 4.0, 6.0];
        // Seed = SMA(2) of first two = 3.0; α = 2/3; 6·2/3 + 3·1/3 = 5.0
        let value = ema(&values, 2).unwrap();
        assert!((value - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        let values = [1.0; 14];
        assert_eq!(rsi(&values, 14), None);

        let values: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        // Monotonic rise: no losses, RSI pegged at 100.
        assert_eq!(rsi(&values, 14), Some(100.0));
    }

    #[test]
    fn test_rsi_bounded() {
        let values: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 1.5 } else { -1.0 } * (i as f64 % 7.0))
            .collect();
        let value = rsi(&values, 14).unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_atr_flat_series() {
        // Constant 2-point range, no gaps: ATR converges to exactly 2.
        let highs = [12.0; 20];
        let lows = [10.0; 20];
        let closes = [11.0; 20];
        let value = atr(&highs, &lows, &closes, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bollinger_symmetry() {
        let values = [10.0, 12.0, 14.0, 16.0, 18.0];
        let (upper, middle, lower) = bollinger(&values, 5, 2.0).unwrap();
        assert_eq!(middle, 14.0);
        assert!((upper - middle - (middle - lower)).abs() < 1e-12);
        assert!(upper > middle && middle > lower);
    }

    #[test]
    fn test_macd_insufficient_history() {
        let values = [1.0; 30];
        assert_eq!(macd(&values, 12, 26, 9), None);
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let values = [50.0; 40];
        let (line, signal, hist) = macd(&values, 12, 26, 9).unwrap();
        assert!(line.abs() < 1e-9);
        assert!(signal.abs() < 1e-9);
        assert!(hist.abs() < 1e-9);
    }

    #[test]
    fn test_supertrend_uptrend_is_bullish() {
        let n = 30;
        let highs: Vec<f64> = (0..n).map(|i| 102.0 + i as f64).collect();
        let lows: Vec<f64> = (0..n).map(|i| 98.0 + i as f64).collect();
        let closes: Vec<f64> = (0..n).map(|i| 101.0 + i as f64).collect();
        let (value, bullish) = supertrend(&highs, &lows, &closes, 10, 3.0).unwrap();
        assert!(bullish);
        assert!(value < *closes.last().unwrap());
    }

    #[test]
    fn test_supertrend_downtrend_is_bearish() {
        let n = 30;
        let highs: Vec<f64> = (0..n).map(|i| 202.0 - 2.0 * i as f64).collect();
        let lows: Vec<f64> = (0..n).map(|i| 198.0 - 2.0 * i as f64).collect();
        let closes: Vec<f64> = (0..n).map(|i| 199.0 - 2.0 * i as f64).collect();
        let (value, bullish) = supertrend(&highs, &lows, &closes, 10, 3.0).unwrap();
        assert!(!bullish);
        assert!(value > *closes.last().unwrap());
    }
}
