use common::{AnalysisResult, Series, Signal};

use super::{hold, insert_volume_ratio, label, last_row, snapshot, Scored};
use crate::indicators::{ema, ops, BollingerBands, RsiIndicator};
use crate::{Frame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct BollingerParams {
    pub period: usize,
    pub k: f64,
    /// %b below this counts as touching the lower band.
    pub lower_threshold: f64,
    /// %b above this counts as touching the upper band.
    pub upper_threshold: f64,
    pub width_window: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub ema_period: usize,
    pub volume_factor: f64,
    pub startup_window: usize,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            k: 2.0,
            lower_threshold: 0.1,
            upper_threshold: 0.9,
            width_window: 20,
            rsi_period: 14,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            ema_period: 20,
            volume_factor: 1.2,
            startup_window: 50,
        }
    }
}

/// Mean reversion off the Bollinger Bands.
#[derive(Debug, Clone)]
pub struct BollingerReversion {
    name: String,
    params: BollingerParams,
}

impl BollingerReversion {
    pub const ID: &'static str = "bollinger";

    pub fn new() -> Self {
        Self::with_params(Self::ID, BollingerParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: BollingerParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Default for BollingerReversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for BollingerReversion {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Bollinger Band mean reversion with squeeze and expansion detection"
    }

    fn startup_window(&self) -> usize {
        self.params.startup_window
    }

    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError> {
        let p = &self.params;
        let mut frame = Frame::from_series(series);
        let close = frame.close();

        let bands = BollingerBands::new(p.period, p.k).compute(&close);
        let width = bands.width();
        let percent = bands.percent_b(&close);
        frame.insert_flag("price_above_upper", ops::gt(&close, &bands.upper))?;
        frame.insert_flag("price_below_lower", ops::lt(&close, &bands.lower))?;
        frame.insert_flag("price_near_upper", ops::gt_scalar(&percent, p.upper_threshold))?;
        frame.insert_flag("price_near_lower", ops::lt_scalar(&percent, p.lower_threshold))?;
        frame.insert_flag(
            "bb_squeeze",
            ops::lt(&width, &ops::rolling_quantile(&width, p.width_window, 0.2)),
        )?;
        frame.insert_flag(
            "bb_expansion",
            ops::gt(&width, &ops::rolling_quantile(&width, p.width_window, 0.8)),
        )?;
        frame.insert("bb_upper", bands.upper)?;
        frame.insert("bb_middle", bands.middle)?;
        frame.insert("bb_lower", bands.lower)?;
        frame.insert("bb_width", width)?;
        frame.insert("bb_percent", percent)?;

        let rsi = RsiIndicator::new(p.rsi_period).compute(&close);
        frame.insert_flag("rsi_rising", ops::rising(&rsi, 1))?;
        frame.insert_flag("rsi_falling", ops::falling(&rsi, 1))?;
        frame.insert("rsi", rsi)?;

        frame.insert("price_momentum", ops::rate_of_change(&close, 5))?;
        insert_volume_ratio(&mut frame)?;

        let ema_20 = ema(&close, p.ema_period);
        let price_vs_ema = close.iter().zip(&ema_20).map(|(c, e)| c / e - 1.0).collect();
        frame.insert("price_vs_ema", price_vs_ema)?;
        frame.insert("ema_20", ema_20)?;

        Ok(frame)
    }

    fn decide(&self, frame: &Frame) -> Result<AnalysisResult, StrategyError> {
        let p = &self.params;
        let row = last_row(frame)?;
        let indicators = snapshot(
            &row,
            &[
                "bb_percent",
                "bb_width",
                "rsi",
                "volume_ratio",
                "close",
                "bb_upper",
                "bb_lower",
                "bb_middle",
            ],
        );
        let percent = row.value("bb_percent");
        let rsi = row.value("rsi");
        let volume_ratio = row.value("volume_ratio");
        let high_volume = volume_ratio > p.volume_factor;
        let position = if percent.is_finite() {
            format!("{:.1}%", percent * 100.0)
        } else {
            "n/a".to_string()
        };

        if row.flag("price_near_lower") || row.flag("price_below_lower") {
            return Ok(Scored::base(0.75, format!("price near lower band (position {position})"))
                .bonus(rsi < p.rsi_oversold, 0.1, || format!("{} confirms oversold", label("RSI", rsi)))
                .bonus(row.flag("rsi_rising"), 0.05, || "RSI turning up".into())
                .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                .bonus(row.flag("bb_squeeze"), 0.05, || "bands squeezing, breakout near".into())
                .finish(Signal::Buy, indicators));
        }

        if row.flag("price_near_upper") || row.flag("price_above_upper") {
            return Ok(Scored::base(0.75, format!("price near upper band (position {position})"))
                .bonus(rsi > p.rsi_overbought, 0.1, || format!("{} confirms overbought", label("RSI", rsi)))
                .bonus(row.flag("rsi_falling"), 0.05, || "RSI turning down".into())
                .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                .bonus(row.flag("bb_expansion"), 0.05, || "bands expanding".into())
                .finish(Signal::Sell, indicators));
        }

        if (percent - 0.5).abs() < 0.1 {
            let price_vs_ema = row.value("price_vs_ema");
            if price_vs_ema > 0.0 && rsi > 50.0 {
                let reasons = vec![
                    "price near middle band".to_string(),
                    "bias up".to_string(),
                    format!("{} neutral but firm", label("RSI", rsi)),
                ];
                return Ok(AnalysisResult::new(Signal::Buy, 0.5, reasons, indicators));
            }
            if price_vs_ema < 0.0 && rsi < 50.0 {
                let reasons = vec![
                    "price near middle band".to_string(),
                    "bias down".to_string(),
                    format!("{} neutral but soft", label("RSI", rsi)),
                ];
                return Ok(AnalysisResult::new(Signal::Sell, 0.5, reasons, indicators));
            }
        }

        Ok(hold(
            format!("price mid-band ({position}), no clear signal"),
            indicators,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{choppy, frame_with, series_from_closes};

    fn decide(values: &[(&'static str, f64)], flags: &[(&'static str, bool)]) -> AnalysisResult {
        BollingerReversion::new()
            .decide(&frame_with(10.0, values, flags))
            .unwrap()
    }

    #[test]
    fn lower_band_touch_buys() {
        let result = decide(
            &[("bb_percent", 0.05), ("rsi", 30.0), ("volume_ratio", 1.0)],
            &[("price_near_lower", true), ("bb_squeeze", true)],
        );
        assert_eq!(result.signal, Signal::Buy);
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert_eq!(result.reasons[0], "price near lower band (position 5.0%)");
    }

    #[test]
    fn close_above_upper_band_sells() {
        let result = decide(
            &[("bb_percent", 1.2), ("rsi", 70.0), ("volume_ratio", 1.5)],
            &[("price_above_upper", true), ("rsi_falling", true), ("bb_expansion", true)],
        );
        assert_eq!(result.signal, Signal::Sell);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn middle_band_follows_bias() {
        let buy = decide(&[("bb_percent", 0.55), ("rsi", 55.0), ("price_vs_ema", 0.01)], &[]);
        assert_eq!(buy.signal, Signal::Buy);
        assert_eq!(buy.confidence, 0.5);

        let sell = decide(&[("bb_percent", 0.45), ("rsi", 45.0), ("price_vs_ema", -0.01)], &[]);
        assert_eq!(sell.signal, Signal::Sell);

        let mixed = decide(&[("bb_percent", 0.45), ("rsi", 55.0), ("price_vs_ema", -0.01)], &[]);
        assert_eq!(mixed.signal, Signal::Hold);
    }

    #[test]
    fn upper_middle_zone_holds() {
        let result = decide(&[("bb_percent", 0.75), ("rsi", 60.0)], &[]);
        assert_eq!(result.signal, Signal::Hold);
        assert!(result.reasons[0].contains("75.0%"));
    }

    #[test]
    fn breakdown_below_band_is_buy() {
        let mut closes = choppy(59);
        closes.push(80.0);
        let result = BollingerReversion::new().analyze(&series_from_closes(&closes));
        assert_eq!(result.signal, Signal::Buy);
        assert!(result.indicators["bb_percent"].as_f64().unwrap() < 0.0);
    }

    #[test]
    fn flat_series_sanitizes_undefined_percent() {
        // zero-width bands make %b undefined; it must come back as 0.0
        let result = BollingerReversion::new().analyze(&series_from_closes(&[50.0; 60]));
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.indicators["bb_percent"].as_f64(), Some(0.0));
        assert_eq!(result.reasons, vec!["price mid-band (n/a), no clear signal"]);
    }
}
