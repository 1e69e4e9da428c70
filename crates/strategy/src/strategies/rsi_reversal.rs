use common::{AnalysisResult, IndicatorValue, Series, Signal};

use super::{hold, insert_volume_ratio, label, last_row, snapshot, Scored};
use crate::indicators::{ema, ops, MacdIndicator, RsiIndicator};
use crate::{Frame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct RsiReversalParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub middle: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub divergence_lookback: usize,
    pub volume_factor: f64,
    pub startup_window: usize,
}

impl Default for RsiReversalParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            middle: 50.0,
            ema_fast: 20,
            ema_slow: 50,
            divergence_lookback: 5,
            volume_factor: 1.3,
            startup_window: 50,
        }
    }
}

/// RSI overbought/oversold reversals, strengthened by divergence.
#[derive(Debug, Clone)]
pub struct RsiReversal {
    name: String,
    params: RsiReversalParams,
}

impl RsiReversal {
    pub const ID: &'static str = "rsi_reversal";

    pub fn new() -> Self {
        Self::with_params(Self::ID, RsiReversalParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: RsiReversalParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Default for RsiReversal {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RsiReversal {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "RSI overbought and oversold reversals with divergence confirmation"
    }

    fn startup_window(&self) -> usize {
        self.params.startup_window
    }

    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError> {
        let p = &self.params;
        let mut frame = Frame::from_series(series);
        let close = frame.close();

        let rsi = RsiIndicator::new(p.rsi_period).compute(&close);
        frame.insert_flag("rsi_oversold", ops::lt_scalar(&rsi, p.oversold))?;
        frame.insert_flag("rsi_overbought", ops::gt_scalar(&rsi, p.overbought))?;
        frame.insert_flag("rsi_rising", ops::rising(&rsi, 1))?;
        frame.insert_flag("rsi_falling", ops::falling(&rsi, 1))?;

        // Price makes a new low while RSI does not, or the mirror image.
        let n = p.divergence_lookback;
        let price_lower = ops::falling(&close, n);
        let price_higher = ops::rising(&close, n);
        let rsi_lower = ops::falling(&rsi, n);
        let rsi_higher = ops::rising(&rsi, n);
        let not = |v: Vec<bool>| v.into_iter().map(|b| !b).collect::<Vec<_>>();
        frame.insert_flag("bullish_divergence", ops::and(&price_lower, &not(rsi_lower)))?;
        frame.insert_flag("bearish_divergence", ops::and(&price_higher, &not(rsi_higher)))?;
        frame.insert("rsi_prev", ops::shift(&rsi, 1))?;
        frame.insert("rsi", rsi)?;

        let ema_fast = ema(&close, p.ema_fast);
        let ema_slow = ema(&close, p.ema_slow);
        frame.insert_flag("ema_trend_up", ops::gt(&ema_fast, &ema_slow))?;
        frame.insert_flag("price_above_ema", ops::gt(&close, &ema_fast))?;
        frame.insert("ema_fast", ema_fast)?;
        frame.insert("ema_slow", ema_slow)?;

        insert_volume_ratio(&mut frame)?;
        let high_volume = ops::gt_scalar(frame.column("volume_ratio").unwrap_or_default(), p.volume_factor);
        frame.insert_flag("high_volume", high_volume)?;

        let macd = MacdIndicator::default().compute(&close);
        frame.insert_flag("macd_bullish", ops::gt(&macd.macd, &macd.signal))?;
        frame.insert("macd", macd.macd)?;
        frame.insert("macd_signal", macd.signal)?;

        Ok(frame)
    }

    fn decide(&self, frame: &Frame) -> Result<AnalysisResult, StrategyError> {
        let p = &self.params;
        let row = last_row(frame)?;
        let indicators = snapshot(
            &row,
            &["rsi", "rsi_prev", "close", "volume_ratio", "ema_fast", "ema_slow"],
        );
        let rsi = row.value("rsi");
        let trend_up = row.flag("ema_trend_up");
        let macd_bullish = row.flag("macd_bullish");
        let high_volume = row.flag("high_volume");

        if row.flag("rsi_oversold") {
            return Ok(Scored::base(0.7, format!("{} oversold", label("RSI", rsi)))
                .bonus(row.flag("rsi_rising"), 0.1, || "RSI turning up".into())
                .bonus(row.flag("bullish_divergence"), 0.15, || "bullish divergence".into())
                .bonus(trend_up, 0.05, || "primary trend up".into())
                .bonus(high_volume, 0.05, || "volume expanding".into())
                .bonus(macd_bullish, 0.05, || "MACD supportive".into())
                .finish(Signal::Buy, indicators));
        }

        if row.flag("rsi_overbought") {
            return Ok(Scored::base(0.7, format!("{} overbought", label("RSI", rsi)))
                .bonus(row.flag("rsi_falling"), 0.1, || "RSI turning down".into())
                .bonus(row.flag("bearish_divergence"), 0.15, || "bearish divergence".into())
                .bonus(!trend_up, 0.05, || "primary trend down".into())
                .bonus(high_volume, 0.05, || "volume expanding".into())
                .bonus(!macd_bullish, 0.05, || "MACD weakening".into())
                .finish(Signal::Sell, indicators));
        }

        let price_above_ema = row.flag("price_above_ema");
        if rsi > p.middle && trend_up {
            if price_above_ema && row.flag("rsi_rising") {
                return Ok(weak(Signal::Buy, rsi, "firm", ["trend up", "price strong"], indicators));
            }
        } else if rsi < p.middle && !trend_up && !price_above_ema && row.flag("rsi_falling") {
            return Ok(weak(Signal::Sell, rsi, "soft", ["trend down", "price weak"], indicators));
        }

        Ok(hold(
            format!("{} neutral, waiting for a clear signal", label("RSI", rsi)),
            indicators,
        ))
    }
}

fn weak(
    signal: Signal,
    rsi: f64,
    bias: &str,
    context: [&str; 2],
    indicators: std::collections::BTreeMap<String, IndicatorValue>,
) -> AnalysisResult {
    let mut reasons = vec![format!("{} neutral but {bias}", label("RSI", rsi))];
    reasons.extend(context.iter().map(|s| s.to_string()));
    AnalysisResult::new(signal, 0.55, reasons, indicators)
}
