//! Series aggregation: run the extractors over every discovered file and
//! assemble metric -> variant -> (sub-series) -> sorted points.
//!
//! Every recoverable problem (missing directory, bad file name, unreadable
//! file, extraction miss) is logged and recorded as a [`Diagnostic`]; only an
//! unusable variant root or an invalid configuration stops the run.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{Config, ConfigError, ExtractorKind, MetricConfig, VariantConfig};
use crate::extract::KeyPatterns;
use crate::scalar;
use crate::series::{
    AggregateResult, Condition, Diagnostic, MetricMeta, MetricSeries, Series, VariantSeries,
};
use crate::walker::{RootState, SourceFile, SourceWalker, WalkError};

/// A metric row with its label lists compiled.
#[derive(Debug)]
struct MetricPlan {
    key: String,
    extractor: ExtractorKind,
    scale: f64,
    patterns: KeyPatterns,
    sub_series: Vec<(String, KeyPatterns)>,
}

impl MetricPlan {
    fn compile(m: &MetricConfig) -> Result<Self, ConfigError> {
        let compile = |labels: &[String]| {
            KeyPatterns::new(labels).map_err(|e| ConfigError::Invalid {
                detail: format!("metric '{}': {e}", m.key),
            })
        };
        let sub_series = m
            .sub_series
            .iter()
            .map(|s| Ok((s.name.clone(), compile(&s.patterns)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let patterns = compile(&m.patterns)?;
        tracing::debug!(
            metric = %m.key,
            labels = ?patterns.labels().collect::<Vec<_>>(),
            sub_series = sub_series.len(),
            "compiled metric"
        );
        Ok(Self {
            key: m.key.clone(),
            extractor: m.extractor,
            scale: m.scale,
            patterns,
            sub_series,
        })
    }

    /// Values found in `text`, keyed by sub-series (`None` for a plain metric).
    /// A sub-series or metric with no value is listed in the second vector.
    fn apply(&self, text: &str) -> (Vec<(Option<&str>, f64)>, Vec<String>) {
        let mut found = Vec::new();
        let mut missed = Vec::new();
        match self.extractor {
            ExtractorKind::Tabular if !self.sub_series.is_empty() => {
                for (name, patterns) in &self.sub_series {
                    match patterns.find(text) {
                        Some(v) => found.push((Some(name.as_str()), v * self.scale)),
                        None => missed.push(format!("{}/{name}", self.key)),
                    }
                }
            }
            ExtractorKind::Tabular => match self.patterns.find(text) {
                Some(v) => found.push((None, v * self.scale)),
                None => missed.push(self.key.clone()),
            },
            ExtractorKind::TimingFirst | ExtractorKind::TimingSecond => {
                match self.extract_timing(text) {
                    Some(v) => found.push((None, v)),
                    None => missed.push(self.key.clone()),
                }
            }
        }
        (found, missed)
    }

    /// Timing lookup order: trailing scalar pair, then the tabular labels,
    /// then isolated scalar lines anywhere in the text.
    fn extract_timing(&self, text: &str) -> Option<f64> {
        let pick = |(first, second): (f64, f64)| match self.extractor {
            ExtractorKind::TimingSecond => second,
            _ => first,
        };
        if let Some(pair) = scalar::extract_pair(text, self.scale) {
            return Some(pick(pair));
        }
        if !self.patterns.is_empty() {
            if let Some(v) = self.patterns.find(text) {
                tracing::debug!(metric = %self.key, "timing taken from tabular report");
                return Some(v * self.scale);
            }
        }
        let pair = scalar::extract_isolated_pair(text, self.scale)?;
        tracing::debug!(metric = %self.key, "timing taken from isolated scalar lines");
        Some(pick(pair))
    }
}

/// Builds an [`AggregateResult`] from a validated configuration.
#[derive(Debug)]
pub struct Aggregator {
    config: Config,
    plans: Vec<MetricPlan>,
}

impl Aggregator {
    /// Validate `config` and compile every metric's label lists.
    pub fn new(config: Config) -> Result<Self, AggregateError> {
        config.validate()?;
        let plans = config
            .metrics
            .iter()
            .map(MetricPlan::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { config, plans })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline against `walker`.
    ///
    /// Every variant root is checked before any file is read, so an unusable
    /// root fails fast.
    pub fn run(&self, walker: &dyn SourceWalker) -> Result<AggregateResult, AggregateError> {
        let mut result = self.empty_result();

        let mut present = Vec::new();
        for variant in &self.config.variants {
            match walker.check_root(&variant.root) {
                Ok(RootState::Present) => present.push(variant),
                Ok(RootState::Missing) => report(
                    &mut result,
                    Diagnostic {
                        variant: variant.name.clone(),
                        category: None,
                        path: variant.root.display().to_string(),
                        condition: Condition::MissingDirectory,
                    },
                ),
                Err(e) => {
                    return Err(AggregateError::UnusableRoot {
                        variant: variant.name.clone(),
                        source: e,
                    })
                }
            }
        }

        for variant in present {
            self.collect_variant(walker, variant, &mut result);
            result.finish_variant(&variant.name);
        }

        let points: usize = result
            .metrics
            .values()
            .flat_map(|m| m.variants.values())
            .map(VariantSeries::point_count)
            .sum();
        tracing::info!(
            metrics = result.metrics.len(),
            points,
            diagnostics = result.diagnostics.len(),
            "aggregation finished"
        );
        Ok(result)
    }

    /// Every configured group, present and empty.
    fn empty_result(&self) -> AggregateResult {
        let mut result = AggregateResult::new();
        for m in &self.config.metrics {
            let variants = self
                .config
                .variants
                .iter()
                .map(|v| {
                    let series = if m.sub_series.is_empty() {
                        VariantSeries::Single(Series::new())
                    } else {
                        VariantSeries::Split(
                            m.sub_series
                                .iter()
                                .map(|s| (s.name.clone(), Series::new()))
                                .collect(),
                        )
                    };
                    (v.name.clone(), series)
                })
                .collect::<BTreeMap<_, _>>();
            let meta = MetricMeta {
                title: m.title.clone(),
                x_label: self.config.x_label.clone(),
                y_label: m.y_label.clone(),
                unit: m.unit.clone(),
                x_scale: m.x_scale,
                y_scale: m.y_scale,
                panel: m.panel,
            };
            result
                .metrics
                .insert(m.key.clone(), MetricSeries { meta, variants });
        }
        result
    }

    fn collect_variant(
        &self,
        walker: &dyn SourceWalker,
        variant: &VariantConfig,
        result: &mut AggregateResult,
    ) {
        for (category, metrics) in self.config.categories() {
            let plans: Vec<&MetricPlan> = self
                .plans
                .iter()
                .filter(|p| metrics.iter().any(|m| m.key == p.key))
                .collect();
            let diag = |path: &Path, condition| Diagnostic {
                variant: variant.name.clone(),
                category: Some(category.to_string()),
                path: path.display().to_string(),
                condition,
            };

            let discovery = match walker.discover(&variant.root, category) {
                Ok(Some(d)) => d,
                Ok(None) => {
                    let dir = variant.root.join(category);
                    report(result, diag(&dir, Condition::MissingDirectory));
                    continue;
                }
                Err(e) => {
                    let dir = variant.root.join(category);
                    let condition = Condition::Unreadable {
                        error: e.to_string(),
                    };
                    report(result, diag(&dir, condition));
                    continue;
                }
            };

            for path in &discovery.skipped {
                report(result, diag(path, Condition::NamingMismatch));
            }
            for (path, error) in &discovery.failed {
                let condition = Condition::Unreadable {
                    error: error.clone(),
                };
                report(result, diag(path, condition));
            }

            let mut points = 0usize;
            for file in &discovery.files {
                let text = match walker.read(file) {
                    Ok(t) => t,
                    Err(e) => {
                        let condition = Condition::Unreadable {
                            error: e.to_string(),
                        };
                        report(result, diag(&file.path, condition));
                        continue;
                    }
                };
                points += self.extract_file(&plans, file, &text, &variant.name, result, &diag);
            }

            tracing::info!(
                variant = %variant.name,
                category,
                files = discovery.files.len(),
                points,
                "category collected"
            );
        }
    }

    /// Apply every plan of the category to one file; returns the number of points added.
    fn extract_file(
        &self,
        plans: &[&MetricPlan],
        file: &SourceFile,
        text: &str,
        variant: &str,
        result: &mut AggregateResult,
        diag: &dyn Fn(&Path, Condition) -> Diagnostic,
    ) -> usize {
        let mut added = 0;
        for plan in plans {
            let (found, missed) = plan.apply(text);
            for (sub, value) in found {
                if let Some(series) = result.series_mut(&plan.key, variant, sub) {
                    series.push(file.size, value);
                    added += 1;
                }
            }
            for metric in missed {
                report(result, diag(&file.path, Condition::ExtractionMiss { metric }));
            }
        }
        added
    }
}

fn report(result: &mut AggregateResult, diagnostic: Diagnostic) {
    tracing::warn!(
        variant = %diagnostic.variant,
        category = diagnostic.category.as_deref().unwrap_or("-"),
        path = %diagnostic.path,
        condition = %diagnostic.condition,
        "skipped"
    );
    result.diagnostics.push(diagnostic);
}

/// Fatal aggregation errors.
#[derive(Debug)]
pub enum AggregateError {
    Config(ConfigError),
    UnusableRoot { variant: String, source: WalkError },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::Config(e) => write!(f, "{e}"),
            AggregateError::UnusableRoot { variant, source } => {
                write!(f, "unusable root for variant '{variant}': {source}")
            }
        }
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregateError::Config(e) => Some(e),
            AggregateError::UnusableRoot { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for AggregateError {
    fn from(e: ConfigError) -> Self {
        AggregateError::Config(e)
    }
}
