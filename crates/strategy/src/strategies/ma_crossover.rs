use common::{AnalysisResult, Series, Signal};

use super::{hold, insert_volume_ratio, label, last_row, snapshot, Scored};
use crate::indicators::{ema, ops, MacdIndicator, RsiIndicator};
use crate::{Frame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct MaCrossoverParams {
    pub fast: usize,
    pub slow: usize,
    /// Bars back the fast line is compared with to call it rising.
    pub slope_lookback: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_factor: f64,
    pub startup_window: usize,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            fast: 20,
            slow: 50,
            slope_lookback: 3,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_factor: 1.2,
            startup_window: 60,
        }
    }
}

/// Fast/slow EMA crossover with trend-following continuation.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    name: String,
    params: MaCrossoverParams,
}

impl MaCrossover {
    pub const ID: &'static str = "ma_crossover";

    pub fn new() -> Self {
        Self::with_params(Self::ID, MaCrossoverParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: MaCrossoverParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Fast and slow moving average golden and death crosses"
    }

    fn startup_window(&self) -> usize {
        self.params.startup_window
    }

    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError> {
        let p = &self.params;
        let mut frame = Frame::from_series(series);
        let close = frame.close();

        let fast = ema(&close, p.fast);
        let slow = ema(&close, p.slow);
        frame.insert_flag("ma_fast_above_slow", ops::gt(&fast, &slow))?;
        frame.insert_flag("golden_cross", ops::crossed_above(&fast, &slow))?;
        frame.insert_flag("death_cross", ops::crossed_below(&fast, &slow))?;
        frame.insert_flag("price_above_ma_fast", ops::gt(&close, &fast))?;
        frame.insert_flag("price_above_ma_slow", ops::gt(&close, &slow))?;
        frame.insert_flag("ma_fast_rising", ops::rising(&fast, p.slope_lookback))?;
        frame.insert_flag("ma_slow_rising", ops::rising(&slow, 5))?;
        frame.insert("ma_gap", ops::div(&ops::sub(&fast, &slow), &slow))?;
        frame.insert("ma_fast", fast)?;
        frame.insert("ma_slow", slow)?;

        frame.insert("rsi", RsiIndicator::new(p.rsi_period).compute(&close))?;
        insert_volume_ratio(&mut frame)?;

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
            &["ma_fast", "ma_slow", "ma_gap", "rsi", "volume_ratio", "close"],
        );
        let fast = row.value("ma_fast");
        let slow = row.value("ma_slow");
        let rsi = row.value("rsi");
        let volume_ratio = row.value("volume_ratio");
        let high_volume = volume_ratio > p.volume_factor;
        let above_fast = row.flag("price_above_ma_fast");
        let fast_rising = row.flag("ma_fast_rising");
        let macd_bullish = row.flag("macd_bullish");

        if row.flag("golden_cross") {
            return Ok(Scored::base(0.8, format!("golden cross (fast {fast:.2} > slow {slow:.2})"))
                .bonus(above_fast, 0.1, || "price above fast line".into())
                .bonus(fast_rising, 0.05, || "fast line rising".into())
                .bonus(rsi > 50.0 && rsi < p.rsi_overbought, 0.05, || {
                    format!("{} firm but not overbought", label("RSI", rsi))
                })
                .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                .bonus(macd_bullish, 0.05, || "MACD bullish".into())
                .finish(Signal::Buy, indicators));
        }

        if row.flag("death_cross") {
            return Ok(Scored::base(0.8, format!("death cross (fast {fast:.2} < slow {slow:.2})"))
                .bonus(!above_fast, 0.1, || "price below fast line".into())
                .bonus(!fast_rising, 0.05, || "fast line falling".into())
                .bonus(rsi < 50.0 && rsi > p.rsi_oversold, 0.05, || {
                    format!("{} soft but not oversold", label("RSI", rsi))
                })
                .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                .bonus(!macd_bullish, 0.05, || "MACD bearish".into())
                .finish(Signal::Sell, indicators));
        }

        if row.flag("ma_fast_above_slow") {
            if above_fast && fast_rising && rsi > 50.0 {
                let reasons = vec![
                    "fast line above slow line".to_string(),
                    "price strong".to_string(),
                    format!("{} firm", label("RSI", rsi)),
                ];
                return Ok(AnalysisResult::new(Signal::Buy, 0.6, reasons, indicators));
            }
        } else if !above_fast && !fast_rising && rsi < 50.0 {
            let reasons = vec![
                "fast line below slow line".to_string(),
                "price weak".to_string(),
                format!("{} soft", label("RSI", rsi)),
            ];
            return Ok(AnalysisResult::new(Signal::Sell, 0.6, reasons, indicators));
        }

        Ok(hold("no clear crossover, waiting", indicators))
    }
}
