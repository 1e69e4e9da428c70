use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Bar, Series};

use crate::StrategyError;

/// A cleaned series enriched with named indicator columns and boolean flags.
///
/// Every column has exactly one entry per bar. The base OHLCV fields are
/// always readable by name (`open`, `high`, `low`, `close`, `volume`,
/// `amount`) without being inserted.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    bars: Vec<Bar>,
    values: BTreeMap<&'static str, Vec<f64>>,
    flags: BTreeMap<&'static str, Vec<bool>>,
}

impl Frame {
    pub fn from_series(series: &Series) -> Self {
        Self {
            bars: series.bars.clone(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn open(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn high(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn low(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn close(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volume(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Add or replace a numeric column.
    pub fn insert(&mut self, name: &'static str, column: Vec<f64>) -> Result<(), StrategyError> {
        self.check_len(name, column.len())?;
        self.values.insert(name, column);
        Ok(())
    }

    /// Add or replace a boolean column.
    pub fn insert_flag(
        &mut self,
        name: &'static str,
        column: Vec<bool>,
    ) -> Result<(), StrategyError> {
        self.check_len(name, column.len())?;
        self.flags.insert(name, column);
        Ok(())
    }

    fn check_len(&self, name: &str, actual: usize) -> Result<(), StrategyError> {
        if actual != self.bars.len() {
            return Err(StrategyError::LengthMismatch {
                column: name.to_string(),
                expected: self.bars.len(),
                actual,
            });
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn flag_column(&self, name: &str) -> Option<&[bool]> {
        self.flags.get(name).map(Vec::as_slice)
    }

    /// Inserted numeric columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &[f64])> {
        self.values.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Inserted flag columns in name order.
    pub fn flag_columns(&self) -> impl Iterator<Item = (&'static str, &[bool])> {
        self.flags.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.bars.len()).then_some(Row { frame: self, index })
    }

    /// The most recent bar, the only one decisions look at.
    pub fn last(&self) -> Option<Row<'_>> {
        self.bars.len().checked_sub(1).and_then(|i| self.row(i))
    }
}

/// A view of one bar of a [`Frame`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    frame: &'a Frame,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.frame.bars[self.index].timestamp
    }

    /// Numeric value of `name` at this bar; `NaN` when the column is unknown.
    pub fn value(&self, name: &str) -> f64 {
        let bar = &self.frame.bars[self.index];
        match name {
            "open" => bar.open,
            "high" => bar.high,
            "low" => bar.low,
            "close" => bar.close,
            "volume" => bar.volume,
            "amount" => bar.amount,
            _ => self
                .frame
                .values
                .get(name)
                .map_or(f64::NAN, |c| c[self.index]),
        }
    }

    /// Flag `name` at this bar; `false` when the column is unknown.
    pub fn flag(&self, name: &str) -> bool {
        self.frame
            .flags
            .get(name)
            .is_some_and(|c| c[self.index])
    }

    pub fn previous(&self) -> Option<Row<'a>> {
        self.index.checked_sub(1).and_then(|i| self.frame.row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(closes: &[f64]) -> Series {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 900, 0).unwrap(),
                open: *c,
                high: c + 1.0,
                low: c - 1.0,
                close: *c,
                volume: 1000.0,
                amount: c * 1000.0,
            })
            .collect();
        Series::new("600000.SH", bars)
    }

    #[test]
    fn base_columns_are_readable_by_name() {
        let frame = Frame::from_series(&series(&[10.0, 11.0]));
        let last = frame.last().unwrap();
        assert_eq!(last.value("close"), 11.0);
        assert_eq!(last.value("high"), 12.0);
        assert_eq!(last.value("amount"), 11_000.0);
        assert!(last.value("rsi").is_nan());
        assert!(!last.flag("golden_cross"));
    }

    #[test]
    fn insert_rejects_misaligned_columns() {
        let mut frame = Frame::from_series(&series(&[10.0, 11.0, 12.0]));
        let err = frame.insert("sma", vec![1.0]).unwrap_err();
        assert!(matches!(err, StrategyError::LengthMismatch { expected: 3, actual: 1, .. }));
        assert!(frame.insert_flag("up", vec![true, false]).is_err());
    }

    #[test]
    fn rows_walk_backwards() {
        let mut frame = Frame::from_series(&series(&[10.0, 11.0, 12.0]));
        frame.insert("x", vec![1.0, 2.0, 3.0]).unwrap();
        frame.insert_flag("up", vec![false, true, true]).unwrap();
        let last = frame.last().unwrap();
        let prev = last.previous().unwrap();
        assert_eq!(prev.value("x"), 2.0);
        assert!(prev.flag("up"));
        assert!(prev.previous().unwrap().previous().is_none());
    }

    #[test]
    fn empty_frame_has_no_last_row() {
        let frame = Frame::from_series(&Series::empty("000001.SZ"));
        assert!(frame.is_empty());
        assert!(frame.last().is_none());
    }
}
