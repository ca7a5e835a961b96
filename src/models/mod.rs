//! Data models for the chart state
//!
//! The sync loop rebuilds a `SeriesSet` from every feed payload and swaps it
//! in wholesale; nothing here is patched incrementally.

pub mod chart;

pub use chart::{AxisSide, ChartDataError, Series, SeriesField, SeriesSet, SeriesSpec};
