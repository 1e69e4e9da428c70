use common::{AnalysisResult, Series, Signal};

use super::{hold, insert_volume_ratio, label, last_row, snapshot, Scored};
use crate::indicators::{ema, ops, MacdIndicator, RsiIndicator};
use crate::{Frame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct MacdCrossParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub volume_factor: f64,
    pub startup_window: usize,
}

impl Default for MacdCrossParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            volume_factor: 1.2,
            startup_window: 50,
        }
    }
}

/// MACD golden/death cross, confirmed by RSI and volume.
#[derive(Debug, Clone)]
pub struct MacdCross {
    name: String,
    params: MacdCrossParams,
}

impl MacdCross {
    pub const ID: &'static str = "macd_cross";

    pub fn new() -> Self {
        Self::with_params(Self::ID, MacdCrossParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: MacdCrossParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Default for MacdCross {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MacdCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "MACD golden and death crosses confirmed by RSI and volume"
    }

    fn startup_window(&self) -> usize {
        self.params.startup_window
    }

    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError> {
        let p = &self.params;
        let mut frame = Frame::from_series(series);
        let close = frame.close();

        let macd = MacdIndicator::new(p.fast, p.slow, p.signal).compute(&close);
        frame.insert_flag("macd_above_signal", ops::gt(&macd.macd, &macd.signal))?;
        frame.insert_flag("macd_below_signal", ops::lt(&macd.macd, &macd.signal))?;
        frame.insert_flag("macd_golden_cross", ops::crossed_above(&macd.macd, &macd.signal))?;
        frame.insert_flag("macd_death_cross", ops::crossed_below(&macd.macd, &macd.signal))?;
        frame.insert_flag("macd_hist_rising", ops::rising(&macd.histogram, 1))?;
        frame.insert_flag("macd_hist_falling", ops::falling(&macd.histogram, 1))?;
        frame.insert("macd", macd.macd)?;
        frame.insert("macd_signal", macd.signal)?;
        frame.insert("macd_hist", macd.histogram)?;

        frame.insert("rsi", RsiIndicator::new(p.rsi_period).compute(&close))?;
        insert_volume_ratio(&mut frame)?;

        let ema_fast = ema(&close, p.fast);
        let ema_slow = ema(&close, p.slow);
        frame.insert_flag("ema_trend_up", ops::gt(&ema_fast, &ema_slow))?;
        frame.insert("ema_fast", ema_fast)?;
        frame.insert("ema_slow", ema_slow)?;

        Ok(frame)
    }

    fn decide(&self, frame: &Frame) -> Result<AnalysisResult, StrategyError> {
        let p = &self.params;
        let row = last_row(frame)?;
        let indicators = snapshot(
            &row,
            &["macd", "macd_signal", "macd_hist", "rsi", "volume_ratio", "close"],
        );
        let rsi = row.value("rsi");
        let volume_ratio = row.value("volume_ratio");
        let high_volume = volume_ratio > p.volume_factor;

        if row.flag("macd_golden_cross") {
            return Ok(Scored::base(0.8, "MACD golden cross")
                .bonus(row.flag("macd_hist_rising"), 0.1, || "MACD histogram rising".into())
                .bonus(rsi < p.rsi_overbought, 0.05, || format!("{} not overbought", label("RSI", rsi)))
                .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                .finish(Signal::Buy, indicators));
        }

        if row.flag("macd_death_cross") {
            return Ok(Scored::base(0.8, "MACD death cross")
                .bonus(row.flag("macd_hist_falling"), 0.1, || "MACD histogram falling".into())
                .bonus(rsi > p.rsi_oversold, 0.05, || format!("{} not oversold", label("RSI", rsi)))
                .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                .finish(Signal::Sell, indicators));
        }

        let trend_up = row.flag("ema_trend_up");
        if row.flag("macd_above_signal") && trend_up {
            if rsi < p.rsi_overbought {
                let reasons = vec![
                    "MACD above signal line".to_string(),
                    "trend up".to_string(),
                    format!("{} in range", label("RSI", rsi)),
                ];
                return Ok(AnalysisResult::new(Signal::Buy, 0.6, reasons, indicators));
            }
        } else if row.flag("macd_below_signal") && !trend_up && rsi > p.rsi_oversold {
            let reasons = vec![
                "MACD below signal line".to_string(),
                "trend down".to_string(),
                format!("{} in range", label("RSI", rsi)),
            ];
            return Ok(AnalysisResult::new(Signal::Sell, 0.6, reasons, indicators));
        }

        Ok(hold("MACD signal unclear", indicators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{choppy, frame_with, series_from_closes};

    fn decide(values: &[(&'static str, f64)], flags: &[(&'static str, bool)]) -> AnalysisResult {
        MacdCross::new().decide(&frame_with(10.0, values, flags)).unwrap()
    }

    #[test]
    fn golden_cross_with_all_confirmations_is_full_buy() {
        let result = decide(
            &[("rsi", 55.0), ("volume_ratio", 1.5)],
            &[("macd_golden_cross", true), ("macd_hist_rising", true)],
        );
        assert_eq!(result.signal, Signal::Buy);
        assert!((result.confidence - 1.0).abs() < 1e-12);
        assert_eq!(result.reasons[0], "MACD golden cross");
        assert_eq!(result.reasons.len(), 4);
    }

    #[test]
    fn death_cross_base_confidence() {
        // rsi below the oversold line and quiet volume: no bonuses
        let result = decide(
            &[("rsi", 25.0), ("volume_ratio", 0.8)],
            &[("macd_death_cross", true)],
        );
        assert_eq!(result.signal, Signal::Sell);
        assert!((result.confidence - 0.8).abs() < 1e-12);
        assert_eq!(result.reasons, vec!["MACD death cross"]);
    }

    #[test]
    fn continuation_above_signal_is_weak_buy() {
        let result = decide(&[("rsi", 60.0)], &[("macd_above_signal", true), ("ema_trend_up", true)]);
        assert_eq!(result.signal, Signal::Buy);
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn overbought_continuation_holds_instead_of_selling() {
        let result = decide(&[("rsi", 75.0)], &[("macd_above_signal", true), ("ema_trend_up", true)]);
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn continuation_below_signal_is_weak_sell() {
        let result = decide(&[("rsi", 40.0)], &[("macd_below_signal", true)]);
        assert_eq!(result.signal, Signal::Sell);
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn no_flags_holds() {
        let result = decide(&[("rsi", 50.0)], &[]);
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.reasons, vec!["MACD signal unclear"]);
        assert!(result.indicators.contains_key("macd_hist"));
    }

    #[test]
    fn steady_uptrend_reads_as_buy_or_hold() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.5).collect();
        let result = MacdCross::new().analyze(&series_from_closes(&closes));
        assert_ne!(result.signal, Signal::Sell);
    }

    #[test]
    fn analyze_on_noise_stays_in_bounds() {
        let result = MacdCross::new().analyze(&series_from_closes(&choppy(120)));
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(!result.reasons.is_empty());
    }
}
