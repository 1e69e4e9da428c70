//! Stateless indicator functions over ordered series.
//!
//! Every output is aligned to its input: `out[i]` describes the bar at
//! index `i`, and entries without enough history are `NaN`.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod kdj;
pub mod macd;
pub mod moving_average;
pub mod ops;
pub mod rsi;

pub use adx::{AdxIndicator, DirectionalIndex};
pub use atr::AtrIndicator;
pub use bollinger::{BollingerBands, Bands};
pub use kdj::{Kdj, KdjIndicator};
pub use macd::{MacdIndicator, MacdSeries};
pub use moving_average::{ema, sma};
pub use rsi::RsiIndicator;
