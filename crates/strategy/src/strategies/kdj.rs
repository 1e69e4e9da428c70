use common::{AnalysisResult, Series, Signal};

use super::{hold, insert_volume_ratio, label, last_row, snapshot, Scored};
use crate::indicators::{ema, ops, KdjIndicator, RsiIndicator};
use crate::{Frame, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct KdjParams {
    pub period: usize,
    pub k_smooth: usize,
    pub d_smooth: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub rsi_period: usize,
    pub ema_period: usize,
    pub volume_factor: f64,
    pub startup_window: usize,
}

impl Default for KdjParams {
    fn default() -> Self {
        Self {
            period: 9,
            k_smooth: 3,
            d_smooth: 3,
            oversold: 20.0,
            overbought: 80.0,
            rsi_period: 14,
            ema_period: 20,
            volume_factor: 1.2,
            startup_window: 50,
        }
    }
}

/// KDJ stochastic crosses, weighted up in the extreme zones.
#[derive(Debug, Clone)]
pub struct KdjStochastic {
    name: String,
    params: KdjParams,
}

impl KdjStochastic {
    pub const ID: &'static str = "kdj";

    pub fn new() -> Self {
        Self::with_params(Self::ID, KdjParams::default())
    }

    pub fn with_params(name: impl Into<String>, params: KdjParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Default for KdjStochastic {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for KdjStochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "KDJ stochastic crosses with overbought and oversold zones"
    }

    fn startup_window(&self) -> usize {
        self.params.startup_window
    }

    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError> {
        let p = &self.params;
        let mut frame = Frame::from_series(series);
        let close = frame.close();

        let kdj = KdjIndicator::new(p.period, p.k_smooth, p.d_smooth).compute(
            &frame.high(),
            &frame.low(),
            &close,
        );
        let both = |a: Vec<bool>, b: Vec<bool>| ops::and(&a, &b);
        frame.insert_flag("k_above_d", ops::gt(&kdj.k, &kdj.d))?;
        frame.insert_flag("k_below_d", ops::lt(&kdj.k, &kdj.d))?;
        frame.insert_flag("kdj_golden_cross", ops::crossed_above(&kdj.k, &kdj.d))?;
        frame.insert_flag("kdj_death_cross", ops::crossed_below(&kdj.k, &kdj.d))?;
        frame.insert_flag(
            "kdj_oversold",
            both(ops::lt_scalar(&kdj.k, p.oversold), ops::lt_scalar(&kdj.d, p.oversold)),
        )?;
        frame.insert_flag(
            "kdj_overbought",
            both(ops::gt_scalar(&kdj.k, p.overbought), ops::gt_scalar(&kdj.d, p.overbought)),
        )?;
        frame.insert_flag("j_oversold", ops::lt_scalar(&kdj.j, 0.0))?;
        frame.insert_flag("j_overbought", ops::gt_scalar(&kdj.j, 100.0))?;
        frame.insert_flag("kdj_rising", both(ops::rising(&kdj.k, 1), ops::rising(&kdj.d, 1)))?;
        frame.insert_flag("kdj_falling", both(ops::falling(&kdj.k, 1), ops::falling(&kdj.d, 1)))?;
        frame.insert("k", kdj.k)?;
        frame.insert("d", kdj.d)?;
        frame.insert("j", kdj.j)?;

        frame.insert("rsi", RsiIndicator::new(p.rsi_period).compute(&close))?;
        insert_volume_ratio(&mut frame)?;

        let ema_20 = ema(&close, p.ema_period);
        frame.insert_flag("price_trend_up", ops::gt(&close, &ema_20))?;
        frame.insert("ema_20", ema_20)?;

        Ok(frame)
    }

    fn decide(&self, frame: &Frame) -> Result<AnalysisResult, StrategyError> {
        let p = &self.params;
        let row = last_row(frame)?;
        let indicators = snapshot(&row, &["k", "d", "j", "rsi", "volume_ratio", "close"]);
        let (k, d, j) = (row.value("k"), row.value("d"), row.value("j"));
        let rsi = row.value("rsi");
        let volume_ratio = row.value("volume_ratio");
        let high_volume = volume_ratio > p.volume_factor;
        let kd = format!("K:{k:.1}, D:{d:.1}");

        if row.flag("kdj_golden_cross") {
            if row.flag("kdj_oversold") {
                return Ok(Scored::base(0.85, format!("KDJ golden cross while oversold ({kd})"))
                    .bonus(row.flag("j_oversold"), 0.1, || format!("{} deeply oversold", label("J", j)))
                    .bonus(rsi < 40.0, 0.05, || format!("{} confirms oversold", label("RSI", rsi)))
                    .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                    .finish(Signal::Buy, indicators));
            }
            return Ok(Scored::base(0.7, format!("KDJ golden cross ({kd})"))
                .bonus(row.flag("price_trend_up"), 0.1, || "price trend up".into())
                .bonus(row.flag("kdj_rising"), 0.05, || "K and D rising".into())
                .finish(Signal::Buy, indicators));
        }

        if row.flag("kdj_death_cross") {
            if row.flag("kdj_overbought") {
                return Ok(Scored::base(0.85, format!("KDJ death cross while overbought ({kd})"))
                    .bonus(row.flag("j_overbought"), 0.1, || format!("{} deeply overbought", label("J", j)))
                    .bonus(rsi > 60.0, 0.05, || format!("{} confirms overbought", label("RSI", rsi)))
                    .bonus(high_volume, 0.05, || format!("volume expanding ({volume_ratio:.1}x)"))
                    .finish(Signal::Sell, indicators));
            }
            return Ok(Scored::base(0.7, format!("KDJ death cross ({kd})"))
                .bonus(!row.flag("price_trend_up"), 0.1, || "price trend down".into())
                .bonus(row.flag("kdj_falling"), 0.05, || "K and D falling".into())
                .finish(Signal::Sell, indicators));
        }

        if row.flag("k_above_d") && row.flag("kdj_rising") {
            if k > 50.0 && d > 50.0 {
                let reasons = vec![format!("KDJ bullish alignment (K:{k:.1} > D:{d:.1})"), "K and D rising".to_string()];
                return Ok(AnalysisResult::new(Signal::Buy, 0.55, reasons, indicators));
            }
        } else if row.flag("k_below_d") && row.flag("kdj_falling") && k < 50.0 && d < 50.0 {
            let reasons = vec![format!("KDJ bearish alignment (K:{k:.1} < D:{d:.1})"), "K and D falling".to_string()];
            return Ok(AnalysisResult::new(Signal::Sell, 0.55, reasons, indicators));
        }

        Ok(hold(format!("KDJ neutral ({kd}), waiting for a cross"), indicators))
    }
}
