//! Series data model handed from the aggregator to the renderer.
//!
//! Layout: metric -> variant -> (series | sub-series -> series). Every
//! configured group is present; an empty series means "no data collected".

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{AxisScale, PanelSlot};

/// One measurement: problem size on the x axis, metric value on the y axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataPoint {
    pub size: u64,
    pub value: f64,
}

/// Ordered points for one (metric, variant[, sub-series]) group.
///
/// Points are appended in discovery order and sorted once by
/// [`Series::finish`]. Serialized as a bare array of points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<DataPoint>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, size: u64, value: f64) {
        self.points.push(DataPoint { size, value });
    }

    /// Sort ascending by size. The sort is stable, so points sharing a size
    /// keep their insertion order.
    pub fn finish(&mut self) {
        self.points.sort_by_key(|p| p.size);
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest and largest size, if any points exist.
    pub fn size_range(&self) -> Option<(u64, u64)> {
        let min = self.points.iter().map(|p| p.size).min()?;
        let max = self.points.iter().map(|p| p.size).max()?;
        Some((min, max))
    }

    /// Smallest and largest value, if any points exist.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let first = self.points().first()?.value;
        Some(self.points().iter().fold((first, first), |(lo, hi), p| {
            (lo.min(p.value), hi.max(p.value))
        }))
    }
}

/// The data for one variant of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariantSeries {
    Single(Series),
    Split(BTreeMap<String, Series>),
}

impl VariantSeries {
    fn finish(&mut self) {
        match self {
            VariantSeries::Single(s) => s.finish(),
            VariantSeries::Split(map) => map.values_mut().for_each(Series::finish),
        }
    }

    /// The plain series, if this variant is not split into sub-series.
    #[cfg(test)]
    pub fn single(&self) -> Option<&Series> {
        match self {
            VariantSeries::Single(s) => Some(s),
            VariantSeries::Split(_) => None,
        }
    }

    #[cfg(test)]
    pub fn sub_series(&self, name: &str) -> Option<&Series> {
        match self {
            VariantSeries::Single(_) => None,
            VariantSeries::Split(map) => map.get(name),
        }
    }

    /// Total number of points across all sub-series.
    pub fn point_count(&self) -> usize {
        match self {
            VariantSeries::Single(s) => s.len(),
            VariantSeries::Split(map) => map.values().map(Series::len).sum(),
        }
    }
}

/// Presentation metadata the renderer needs to draw one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMeta {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub unit: String,
    pub x_scale: AxisScale,
    pub y_scale: AxisScale,
    pub panel: PanelSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub meta: MetricMeta,
    pub variants: BTreeMap<String, VariantSeries>,
}

impl MetricSeries {
    #[cfg(test)]
    pub fn variant(&self, name: &str) -> Option<&VariantSeries> {
        self.variants.get(name)
    }
}

/// What went wrong with a single file or directory. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Variant root or category directory does not exist.
    MissingDirectory,
    /// File name does not encode a positive problem size.
    NamingMismatch,
    /// No candidate label matched, or too few scalar lines.
    ExtractionMiss { metric: String },
    /// File could not be read (permissions, invalid UTF-8, ...).
    Unreadable { error: String },
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::MissingDirectory => write!(f, "directory missing"),
            Condition::NamingMismatch => write!(f, "name does not encode a problem size"),
            Condition::ExtractionMiss { metric } => write!(f, "no value found for {metric}"),
            Condition::Unreadable { error } => write!(f, "unreadable: {error}"),
        }
    }
}

/// A recoverable condition, tagged with where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub variant: String,
    pub category: Option<String>,
    pub path: String,
    pub condition: Condition,
}

/// The finished output of one aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub generated_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, MetricSeries>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AggregateResult {
    pub(crate) fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            metrics: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn metric(&self, key: &str) -> Option<&MetricSeries> {
        self.metrics.get(key)
    }

    /// Shorthand for `metric(key)?.variant(variant)`.
    #[cfg(test)]
    pub fn get(&self, key: &str, variant: &str) -> Option<&VariantSeries> {
        self.metric(key)?.variant(variant)
    }

    pub(crate) fn series_mut(
        &mut self,
        key: &str,
        variant: &str,
        sub: Option<&str>,
    ) -> Option<&mut Series> {
        let vs = self.metrics.get_mut(key)?.variants.get_mut(variant)?;
        match (vs, sub) {
            (VariantSeries::Single(s), None) => Some(s),
            (VariantSeries::Split(map), Some(name)) => map.get_mut(name),
            _ => None,
        }
    }

    /// Sort every series belonging to `variant`.
    pub(crate) fn finish_variant(&mut self, variant: &str) {
        for metric in self.metrics.values_mut() {
            if let Some(vs) = metric.variants.get_mut(variant) {
                vs.finish();
            }
        }
    }
}
