//! Chart series models

use thiserror::Error;

use crate::api::datafeed::DataPoint;

/// Which record field a series plots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesField {
    Ratio,
    BtcPrice,
    SqmPrice,
}

impl SeriesField {
    /// Pull this field's value out of a record, if the record carries it
    pub fn extract(&self, point: &DataPoint) -> Option<f64> {
        match self {
            SeriesField::Ratio => Some(point.ratio),
            SeriesField::BtcPrice => point.btc_price,
            SeriesField::SqmPrice => point.sqm_price,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SeriesField::Ratio => "ratio",
            SeriesField::BtcPrice => "btc_price",
            SeriesField::SqmPrice => "sqm_price",
        }
    }
}

/// Which vertical axis a series is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSide {
    Left,
    Right,
}

/// Display configuration for one plotted series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec {
    pub field: SeriesField,
    pub axis: AxisSide,
    /// RGB line color
    pub color: (u8, u8, u8),
    pub label: String,
}

/// One named series: its spec plus the value buffer aligned with the labels
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub spec: SeriesSpec,
    pub data: Vec<f64>,
}

/// The chart's plotted state: a shared ordered label axis plus one value
/// buffer per configured series.
///
/// Invariant: `labels.len() == series[i].data.len()` for every series. The
/// set is only ever built whole from a payload, so a half-updated state is
/// not representable.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSet {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

/// A payload record that cannot back the configured series
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartDataError {
    #[error("record \"{date}\" is missing required field `{field}`")]
    MissingField { date: String, field: &'static str },
}

impl SeriesSet {
    /// An empty set with the given series layout
    pub fn empty(specs: &[SeriesSpec]) -> Self {
        Self {
            labels: Vec::new(),
            series: specs
                .iter()
                .map(|spec| Series {
                    spec: spec.clone(),
                    data: Vec::new(),
                })
                .collect(),
        }
    }

    /// Build a complete set from a feed payload.
    ///
    /// Records are consumed in payload order, appending the date to the label
    /// axis and each configured field to its series in lock-step. No sorting,
    /// no deduplication: the feed's order is the x-axis order. A record
    /// missing a configured field fails the whole build so callers never see
    /// a partially filled set.
    pub fn from_records(
        specs: &[SeriesSpec],
        records: &[DataPoint],
    ) -> Result<Self, ChartDataError> {
        let mut labels = Vec::with_capacity(records.len());
        let mut buffers: Vec<Vec<f64>> = specs
            .iter()
            .map(|_| Vec::with_capacity(records.len()))
            .collect();

        for point in records {
            labels.push(point.date.clone());
            for (spec, buffer) in specs.iter().zip(buffers.iter_mut()) {
                let value =
                    spec.field
                        .extract(point)
                        .ok_or_else(|| ChartDataError::MissingField {
                            date: point.date.clone(),
                            field: spec.field.name(),
                        })?;
                buffer.push(value);
            }
        }

        let series = specs
            .iter()
            .zip(buffers)
            .map(|(spec, data)| Series {
                spec: spec.clone(),
                data,
            })
            .collect();

        Ok(Self { labels, series })
    }

    /// Number of points on the shared label axis
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The most recent label, i.e. the last one the feed sent
    pub fn latest_label(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }

    /// Min/max over every series bound to the given axis, `None` if that axis
    /// has no values.
    pub fn value_range(&self, axis: AxisSide) -> Option<(f64, f64)> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut seen = false;
        for series in self.series.iter().filter(|s| s.spec.axis == axis) {
            for value in &series.data {
                min = min.min(*value);
                max = max.max(*value);
                seen = true;
            }
        }
        seen.then_some((min, max))
    }
}
