use common::{AnalysisResult, Series, Signal};

use super::{hold, insert_volume_ratio, label, last_row, snapshot, Checklist};
use crate::indicators::{ema, ops, AdxIndicator, AtrIndicator, BollingerBands, MacdIndicator, RsiIndicator};
use crate::{Frame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct AdxTrendParams {
    pub adx_period: usize,
    pub strong: f64,
    pub weak: f64,
    pub di_diff: f64,
    pub slope_periods: usize,
    pub min_slope: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub rsi_buy_floor: f64,
    pub rsi_buy_ceiling: f64,
    pub rsi_sell: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_factor: f64,
    pub atr_period: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub startup_window: usize,
}

impl Default for AdxTrendParams {
    fn default() -> Self {
        Self {
            adx_period: 14,
            strong: 30.0,
            weak: 20.0,
            di_diff: 5.0,
            slope_periods: 5,
            min_slope: 1.5,
            ema_fast: 12,
            ema_slow: 30,
            rsi_period: 14,
            rsi_buy_floor: 50.0,
            rsi_buy_ceiling: 80.0,
            rsi_sell: 75.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_factor: 1.6,
            atr_period: 14,
            buy_threshold: 0.7,
            sell_threshold: 0.4,
            startup_window: 100,
        }
    }
}

/// Trend strength from ADX and the directional lines, scored as the share of
/// buy and sell conditions that hold.
#[derive(Debug, Clone)]
pub struct AdxTrend {
    name: String,
    params: AdxTrendParams,
}

impl AdxTrend {
    pub const ID: &'static str = "adx_trend";

    pub fn new() -> Self {
        Self::with_params(Self::ID, AdxTrendParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: AdxTrendParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Default for AdxTrend {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for AdxTrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "ADX trend strength confirmed by EMA, RSI, MACD and volume"
    }

    fn startup_window(&self) -> usize {
        self.params.startup_window
    }

    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError> {
        let p = &self.params;
        let mut frame = Frame::from_series(series);
        let (high, low, close) = (frame.high(), frame.low(), frame.close());
        let n = close.len();

        let dmi = AdxIndicator::new(p.adx_period).compute(&high, &low, &close);
        let di_diff = ops::sub(&dmi.plus_di, &dmi.minus_di);
        let di_ratio = dmi
            .plus_di
            .iter()
            .zip(&dmi.minus_di)
            .map(|(plus, minus)| plus / (minus + 0.001))
            .collect();
        let slope: Vec<f64> = ops::sub(&dmi.adx, &ops::shift(&dmi.adx, p.slope_periods))
            .into_iter()
            .map(|v| v / p.slope_periods as f64)
            .collect();

        let adx_rising = ops::gt_scalar(&slope, p.min_slope);
        let very_strong = ops::gt_scalar(&dmi.adx, 50.0);
        let strong: Vec<bool> = dmi.adx.iter().map(|a| *a > p.strong && *a <= 50.0).collect();
        let moderate = dmi.adx.iter().map(|a| *a > 25.0 && *a <= p.strong).collect();
        let bullish = ops::and(&ops::gt(&dmi.plus_di, &dmi.minus_di), &ops::gt_scalar(&di_diff, p.di_diff));
        let bearish = ops::and(&ops::gt(&dmi.minus_di, &dmi.plus_di), &ops::lt_scalar(&di_diff, -p.di_diff));

        let ema_fast = ema(&close, p.ema_fast);
        let ema_slow = ema(&close, p.ema_slow);
        let ema_trend_up = ops::gt(&ema_fast, &ema_slow);
        let price_above_ema_fast = ops::gt(&close, &ema_fast);

        let macd = MacdIndicator::new(p.macd_fast, p.macd_slow, p.macd_signal).compute(&close);
        let macd_bullish = ops::gt(&macd.macd, &macd.signal);

        let points = |flag: bool, weight: f64| if flag { weight } else { 0.0 };
        let trend_score = (0..n)
            .map(|i| {
                points(bullish[i], 2.0)
                    + points(strong[i] || very_strong[i], 2.0)
                    + points(adx_rising[i], 1.0)
                    + points(ema_trend_up[i], 1.0)
                    + points(price_above_ema_fast[i], 1.0)
                    + points(macd_bullish[i], 1.0)
            })
            .collect();

        frame.insert_flag("adx_falling", ops::lt_scalar(&slope, -p.min_slope))?;
        frame.insert_flag("adx_weak", dmi.adx.iter().map(|a| *a <= p.weak).collect())?;
        frame.insert_flag("adx_rising", adx_rising)?;
        frame.insert_flag("adx_very_strong", very_strong)?;
        frame.insert_flag("adx_strong", strong)?;
        frame.insert_flag("adx_moderate", moderate)?;
        frame.insert_flag("bullish_trend", bullish)?;
        frame.insert_flag("bearish_trend", bearish)?;
        frame.insert_flag("ema_trend_up", ema_trend_up)?;
        frame.insert_flag("price_above_ema_fast", price_above_ema_fast)?;
        frame.insert_flag("macd_bullish", macd_bullish)?;
        frame.insert("adx", dmi.adx)?;
        frame.insert("di_plus", dmi.plus_di)?;
        frame.insert("di_minus", dmi.minus_di)?;
        frame.insert("di_diff", di_diff)?;
        frame.insert("di_ratio", di_ratio)?;
        frame.insert("adx_slope", slope)?;
        frame.insert("ema_fast", ema_fast)?;
        frame.insert("ema_slow", ema_slow)?;
        frame.insert("macd", macd.macd)?;
        frame.insert("macd_signal", macd.signal)?;
        frame.insert("macd_hist", macd.histogram)?;
        frame.insert("trend_score", trend_score)?;

        frame.insert("rsi", RsiIndicator::new(p.rsi_period).compute(&close))?;

        let atr = AtrIndicator::new(p.atr_period).compute(&high, &low, &close);
        frame.insert("atr_percent", ops::div(&atr, &close))?;
        frame.insert("atr", atr)?;

        insert_volume_ratio(&mut frame)?;

        let bands = BollingerBands::new(20, 2.0).compute(&close);
        frame.insert("bb_percent", bands.percent_b(&close))?;
        frame.insert("bb_upper", bands.upper)?;
        frame.insert("bb_middle", bands.middle)?;
        frame.insert("bb_lower", bands.lower)?;

        frame.insert("price_momentum", ops::rate_of_change(&close, 5))?;

        Ok(frame)
    }

    fn decide(&self, frame: &Frame) -> Result<AnalysisResult, StrategyError> {
        let p = &self.params;
        let row = last_row(frame)?;
        let indicators = snapshot(
            &row,
            &[
                "adx",
                "di_plus",
                "di_minus",
                "di_diff",
                "adx_slope",
                "rsi",
                "ema_fast",
                "ema_slow",
                "macd",
                "macd_signal",
                "trend_score",
                "close",
                "volume_ratio",
            ],
        );
        let adx = row.value("adx");
        let rsi = row.value("rsi");
        let volume_ratio = row.value("volume_ratio");
        let trend_score = row.value("trend_score");
        let ema_trend_up = row.flag("ema_trend_up");
        let macd_bullish = row.flag("macd_bullish");

        let mut buy = Checklist::new();
        buy.check(row.flag("bullish_trend"), || "DI+ above DI-, bullish trend".into());
        buy.check(adx > p.strong, || format!("{} trend strong enough", label("ADX", adx)));
        buy.check(row.flag("adx_rising"), || "ADX rising".into());
        buy.check(ema_trend_up, || "EMA trend up".into());
        buy.check(row.flag("price_above_ema_fast"), || "price above fast EMA".into());
        buy.check(rsi > p.rsi_buy_floor && rsi < p.rsi_buy_ceiling, || {
            format!("{} in healthy range", label("RSI", rsi))
        });
        buy.check(macd_bullish, || "MACD bullish".into());
        buy.check(volume_ratio > p.volume_factor, || format!("volume expanding ({volume_ratio:.1}x)"));
        buy.check(trend_score >= 6.0, || format!("high trend score ({trend_score:.0})"));

        let mut sell = Checklist::new();
        sell.check(row.flag("bearish_trend"), || "DI- above DI+, bearish trend".into());
        sell.check(adx < p.weak, || format!("{} trend weakening", label("ADX", adx)));
        sell.check(row.flag("adx_falling"), || "ADX falling".into());
        sell.check(!ema_trend_up, || "EMA trend turned down".into());
        sell.check(rsi > p.rsi_sell, || format!("{} overbought", label("RSI", rsi)));
        sell.check(!macd_bullish, || "MACD bearish".into());
        sell.check(trend_score <= 3.0, || format!("trend score low ({trend_score:.0})"));

        let buy_score = buy.score();
        let sell_score = sell.score();
        if buy_score >= p.buy_threshold {
            return Ok(AnalysisResult::new(Signal::Buy, buy_score, buy.into_reasons(), indicators));
        }
        if sell_score >= p.sell_threshold {
            return Ok(AnalysisResult::new(Signal::Sell, sell_score, sell.into_reasons(), indicators));
        }
        Ok(hold("mixed signals, hold and watch", indicators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{frame_with, series_from_closes, with_volume};

    fn decide(values: &[(&'static str, f64)], flags: &[(&'static str, bool)]) -> AnalysisResult {
        AdxTrend::new().decide(&frame_with(10.0, values, flags)).unwrap()
    }

    #[test]
    fn seven_of_nine_buy_conditions_is_buy() {
        let result = decide(
            &[("adx", 35.0), ("rsi", 60.0), ("volume_ratio", 1.0), ("trend_score", 5.0)],
            &[
                ("bullish_trend", true),
                ("adx_rising", true),
                ("ema_trend_up", true),
                ("price_above_ema_fast", true),
                ("macd_bullish", true),
            ],
        );
        // bullish, adx>30, rising, ema, price, rsi, macd: 7 of 9
        assert_eq!(result.signal, Signal::Buy);
        assert!((result.confidence - 7.0 / 9.0).abs() < 1e-12);
        assert_eq!(result.reasons.len(), 7);
    }

    #[test]
    fn six_of_nine_is_not_enough() {
        let result = decide(
            &[("adx", 35.0), ("rsi", 85.0), ("volume_ratio", 1.0), ("trend_score", 5.0)],
            &[
                ("bullish_trend", true),
                ("adx_rising", true),
                ("ema_trend_up", true),
                ("price_above_ema_fast", true),
                ("macd_bullish", true),
            ],
        );
        // rsi 85 also counts as one sell condition, 1/7 < 0.4
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.reasons, vec!["mixed signals, hold and watch"]);
    }

    #[test]
    fn sell_score_uses_seven_conditions() {
        // bearish, !ema, !macd: 3 of 7
        let result = decide(
            &[("adx", 25.0), ("rsi", 50.0), ("trend_score", 4.0)],
            &[("bearish_trend", true)],
        );
        assert_eq!(result.signal, Signal::Sell);
        assert!((result.confidence - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(result.reasons[0], "DI- above DI+, bearish trend");
    }

    #[test]
    fn undefined_adx_is_no_information() {
        let result = decide(&[("adx", f64::NAN), ("rsi", 50.0), ("trend_score", 4.0)], &[("ema_trend_up", true), ("macd_bullish", true)]);
        assert_eq!(result.signal, Signal::Hold);
    }

    #[test]
    fn strong_uptrend_with_volume_buys() {
        let closes: Vec<f64> = (0..120).map(|i| 20.0 + i as f64 * 0.4 + (i % 2) as f64 * 0.15).collect();
        let series = with_volume(series_from_closes(&closes), 5_000.0);
        let result = AdxTrend::new().analyze(&series);
        assert_eq!(result.signal, Signal::Buy);
        assert!(result.confidence >= 0.7);
        assert!(result.indicators["adx"].as_f64().unwrap() > 30.0);
    }

    #[test]
    fn trend_score_matches_components() {
        let closes: Vec<f64> = (0..120).map(|i| 20.0 + i as f64 * 0.4).collect();
        let frame = AdxTrend::new().compute_indicators(&series_from_closes(&closes)).unwrap();
        let row = frame.last().unwrap();
        let expected = 2.0 * row.flag("bullish_trend") as u8 as f64
            + 2.0 * (row.flag("adx_strong") || row.flag("adx_very_strong")) as u8 as f64
            + row.flag("adx_rising") as u8 as f64
            + row.flag("ema_trend_up") as u8 as f64
            + row.flag("price_above_ema_fast") as u8 as f64
            + row.flag("macd_bullish") as u8 as f64;
        assert_eq!(row.value("trend_score"), expected);
    }
}
