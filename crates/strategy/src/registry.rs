use tracing::info;

use crate::config::{param_f64, param_usize, StrategyConfig, StrategyFileConfig};
use crate::strategies::{
    AdxTrend, AdxTrendParams, BollingerParams, BollingerReversion, KdjParams, KdjStochastic,
    MaCrossover, MaCrossoverParams, MacdCross, MacdCrossParams, RsiReversal, RsiReversalParams,
};
use crate::{Strategy, StrategyError};

/// Builds a fresh strategy instance.
pub type Constructor = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

/// Name → constructor map, populated by explicit registration.
///
/// Names keep their registration order. Share one registry behind an `Arc`
/// between everything that evaluates strategies.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<(String, Constructor)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the six built-in strategies under their ids.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.push(AdxTrend::ID, Box::new(|| Box::new(AdxTrend::new())));
        registry.push(MacdCross::ID, Box::new(|| Box::new(MacdCross::new())));
        registry.push(RsiReversal::ID, Box::new(|| Box::new(RsiReversal::new())));
        registry.push(BollingerReversion::ID, Box::new(|| Box::new(BollingerReversion::new())));
        registry.push(MaCrossover::ID, Box::new(|| Box::new(MaCrossover::new())));
        registry.push(KdjStochastic::ID, Box::new(|| Box::new(KdjStochastic::new())));
        registry
    }

    /// Build the registry from a strategy file. Every entry is checked
    /// (known type, well-typed params, unique name) before anything runs.
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self, StrategyError> {
        let mut registry = Self::new();
        for cfg in &file_cfg.strategies {
            let constructor = build_constructor(cfg)?;
            registry.register(cfg.registered_name(), constructor)?;
            info!(name = %cfg.registered_name(), strategy_type = %cfg.strategy_type, "Registered strategy");
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: Constructor,
    ) -> Result<(), StrategyError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(StrategyError::DuplicateStrategy(name));
        }
        self.push(name, constructor);
        Ok(())
    }

    fn push(&mut self, name: impl Into<String>, constructor: Constructor) {
        self.entries.push((name.into(), constructor));
    }

    /// A new instance of the strategy registered as `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Strategy>, StrategyError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, constructor)| constructor())
            .ok_or_else(|| StrategyError::UnknownStrategy(name.to_string()))
    }

    /// Registered names in registration order.
    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.list())
            .finish()
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_constructor(cfg: &StrategyConfig) -> Result<Constructor, StrategyError> {
    let name = cfg.registered_name().to_string();
    let p = &cfg.params;
    match cfg.strategy_type.as_str() {
        AdxTrend::ID => {
            let d = AdxTrendParams::default();
            let params = AdxTrendParams {
                adx_period: param_usize(p, "adx_period", d.adx_period)?,
                strong: param_f64(p, "strong", d.strong)?,
                weak: param_f64(p, "weak", d.weak)?,
                di_diff: param_f64(p, "di_diff", d.di_diff)?,
                slope_periods: param_usize(p, "slope_periods", d.slope_periods)?.max(1),
                min_slope: param_f64(p, "min_slope", d.min_slope)?,
                ema_fast: param_usize(p, "ema_fast", d.ema_fast)?,
                ema_slow: param_usize(p, "ema_slow", d.ema_slow)?,
                rsi_period: param_usize(p, "rsi_period", d.rsi_period)?,
                rsi_buy_floor: param_f64(p, "rsi_buy_floor", d.rsi_buy_floor)?,
                rsi_buy_ceiling: param_f64(p, "rsi_buy_ceiling", d.rsi_buy_ceiling)?,
                rsi_sell: param_f64(p, "rsi_sell", d.rsi_sell)?,
                macd_fast: param_usize(p, "macd_fast", d.macd_fast)?,
                macd_slow: param_usize(p, "macd_slow", d.macd_slow)?,
                macd_signal: param_usize(p, "macd_signal", d.macd_signal)?,
                volume_factor: param_f64(p, "volume_factor", d.volume_factor)?,
                atr_period: param_usize(p, "atr_period", d.atr_period)?,
                buy_threshold: param_f64(p, "buy_threshold", d.buy_threshold)?,
                sell_threshold: param_f64(p, "sell_threshold", d.sell_threshold)?,
                startup_window: param_usize(p, "startup_window", d.startup_window)?,
            };
            Ok(Box::new(move || Box::new(AdxTrend::with_params(name.clone(), params.clone()))))
        }
        MacdCross::ID => {
            let d = MacdCrossParams::default();
            let params = MacdCrossParams {
                fast: param_usize(p, "fast", d.fast)?,
                slow: param_usize(p, "slow", d.slow)?,
                signal: param_usize(p, "signal", d.signal)?,
                rsi_period: param_usize(p, "rsi_period", d.rsi_period)?,
                rsi_overbought: param_f64(p, "rsi_overbought", d.rsi_overbought)?,
                rsi_oversold: param_f64(p, "rsi_oversold", d.rsi_oversold)?,
                volume_factor: param_f64(p, "volume_factor", d.volume_factor)?,
                startup_window: param_usize(p, "startup_window", d.startup_window)?,
            };
            Ok(Box::new(move || Box::new(MacdCross::with_params(name.clone(), params.clone()))))
        }
        RsiReversal::ID => {
            let d = RsiReversalParams::default();
            let params = RsiReversalParams {
                rsi_period: param_usize(p, "rsi_period", d.rsi_period)?,
                oversold: param_f64(p, "oversold", d.oversold)?,
                overbought: param_f64(p, "overbought", d.overbought)?,
                middle: param_f64(p, "middle", d.middle)?,
                ema_fast: param_usize(p, "ema_fast", d.ema_fast)?,
                ema_slow: param_usize(p, "ema_slow", d.ema_slow)?,
                divergence_lookback: param_usize(p, "divergence_lookback", d.divergence_lookback)?,
                volume_factor: param_f64(p, "volume_factor", d.volume_factor)?,
                startup_window: param_usize(p, "startup_window", d.startup_window)?,
            };
            Ok(Box::new(move || Box::new(RsiReversal::with_params(name.clone(), params.clone()))))
        }
        BollingerReversion::ID => {
            let d = BollingerParams::default();
            let params = BollingerParams {
                period: param_usize(p, "period", d.period)?,
                k: param_f64(p, "k", d.k)?,
                lower_threshold: param_f64(p, "lower_threshold", d.lower_threshold)?,
                upper_threshold: param_f64(p, "upper_threshold", d.upper_threshold)?,
                width_window: param_usize(p, "width_window", d.width_window)?,
                rsi_period: param_usize(p, "rsi_period", d.rsi_period)?,
                rsi_oversold: param_f64(p, "rsi_oversold", d.rsi_oversold)?,
                rsi_overbought: param_f64(p, "rsi_overbought", d.rsi_overbought)?,
                ema_period: param_usize(p, "ema_period", d.ema_period)?,
                volume_factor: param_f64(p, "volume_factor", d.volume_factor)?,
                startup_window: param_usize(p, "startup_window", d.startup_window)?,
            };
            Ok(Box::new(move || {
                Box::new(BollingerReversion::with_params(name.clone(), params.clone()))
            }))
        }
        MaCrossover::ID => {
            let d = MaCrossoverParams::default();
            let params = MaCrossoverParams {
                fast: param_usize(p, "fast", d.fast)?,
                slow: param_usize(p, "slow", d.slow)?,
                slope_lookback: param_usize(p, "slope_lookback", d.slope_lookback)?,
                rsi_period: param_usize(p, "rsi_period", d.rsi_period)?,
                rsi_oversold: param_f64(p, "rsi_oversold", d.rsi_oversold)?,
                rsi_overbought: param_f64(p, "rsi_overbought", d.rsi_overbought)?,
                volume_factor: param_f64(p, "volume_factor", d.volume_factor)?,
                startup_window: param_usize(p, "startup_window", d.startup_window)?,
            };
            Ok(Box::new(move || Box::new(MaCrossover::with_params(name.clone(), params.clone()))))
        }
        KdjStochastic::ID => {
            let d = KdjParams::default();
            let params = KdjParams {
                period: param_usize(p, "period", d.period)?,
                k_smooth: param_usize(p, "k_smooth", d.k_smooth)?,
                d_smooth: param_usize(p, "d_smooth", d.d_smooth)?,
                oversold: param_f64(p, "oversold", d.oversold)?,
                overbought: param_f64(p, "overbought", d.overbought)?,
                rsi_period: param_usize(p, "rsi_period", d.rsi_period)?,
                ema_period: param_usize(p, "ema_period", d.ema_period)?,
                volume_factor: param_f64(p, "volume_factor", d.volume_factor)?,
                startup_window: param_usize(p, "startup_window", d.startup_window)?,
            };
            Ok(Box::new(move || Box::new(KdjStochastic::with_params(name.clone(), params.clone()))))
        }
        other => Err(StrategyError::UnknownStrategy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::series_from_closes;

    #[test]
    fn builtin_names_in_registration_order() {
        let registry = StrategyRegistry::with_builtin();
        assert_eq!(
            registry.list(),
            vec!["adx_trend", "macd_cross", "rsi_reversal", "bollinger", "ma_crossover", "kdj"]
        );
        for name in registry.list() {
            assert_eq!(registry.create(&name).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_name_fails_clearly() {
        let registry = StrategyRegistry::with_builtin();
        let err = registry.create("turtle").err().unwrap();
        assert!(matches!(err, StrategyError::UnknownStrategy(ref n) if n == "turtle"));
        assert_eq!(err.to_string(), "unknown strategy 'turtle'");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = StrategyRegistry::with_builtin();
        let err = registry
            .register("kdj", Box::new(|| Box::new(KdjStochastic::new())))
            .unwrap_err();
        assert!(matches!(err, StrategyError::DuplicateStrategy(_)));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn config_allows_two_parameterizations_of_one_type() {
        let cfg = StrategyFileConfig::parse(
            r#"
            [[strategy]]
            type = "macd_cross"

            [[strategy]]
            type = "macd_cross"
            name = "macd_short"
            [strategy.params]
            startup_window = 10
            "#,
        )
        .unwrap();
        let registry = StrategyRegistry::from_config(&cfg).unwrap();
        assert_eq!(registry.list(), vec!["macd_cross", "macd_short"]);

        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        let default = registry.create("macd_cross").unwrap().analyze(&series);
        let short = registry.create("macd_short").unwrap().analyze(&series);
        assert!(default.reasons[0].starts_with("insufficient data"));
        assert!(!short.reasons[0].starts_with("insufficient data"));
    }

    #[test]
    fn config_rejects_unknown_type_and_duplicate_names() {
        let unknown = StrategyFileConfig::parse("[[strategy]]\ntype = \"turtle\"").unwrap();
        assert!(matches!(
            StrategyRegistry::from_config(&unknown),
            Err(StrategyError::UnknownStrategy(_))
        ));

        let dup = StrategyFileConfig::parse("[[strategy]]\ntype = \"kdj\"\n[[strategy]]\ntype = \"kdj\"").unwrap();
        assert!(matches!(
            StrategyRegistry::from_config(&dup),
            Err(StrategyError::DuplicateStrategy(_))
        ));
    }

    #[test]
    fn config_rejects_badly_typed_param() {
        let cfg = StrategyFileConfig::parse(
            "[[strategy]]\ntype = \"kdj\"\n[strategy.params]\nperiod = \"nine\"",
        )
        .unwrap();
        assert!(matches!(
            StrategyRegistry::from_config(&cfg),
            Err(StrategyError::InvalidParam { .. })
        ));
    }
}
