use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "benchseries.toml";

/// Top-level configuration loaded from benchseries.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// X-axis label shared by all panels.
    pub x_label: String,
    #[serde(rename = "variant")]
    pub variants: Vec<VariantConfig>,
    #[serde(rename = "metric")]
    pub metrics: Vec<MetricConfig>,
}

/// One experimental configuration and the directory holding its results.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VariantConfig {
    pub name: String,
    pub root: PathBuf,
}

/// One row of the metric table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricConfig {
    pub key: String,
    /// Subdirectory of each variant root the metric is read from.
    pub category: String,
    pub title: String,
    pub y_label: String,
    #[serde(default)]
    pub unit: String,
    /// Multiplier applied to every extracted value.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_x_scale")]
    pub x_scale: AxisScale,
    #[serde(default)]
    pub y_scale: AxisScale,
    #[serde(default)]
    pub extractor: ExtractorKind,
    /// Candidate labels, highest priority first.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub sub_series: Vec<SubSeriesConfig>,
    #[serde(default)]
    pub panel: PanelSlot,
}

/// A named reading within a metric, extracted with its own label list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubSeriesConfig {
    pub name: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScale {
    #[default]
    Linear,
    Log,
}

/// Which extractor a metric uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Labelled row in a tabular counter report.
    #[default]
    Tabular,
    /// First (second-to-last line) value of a scalar timing dump.
    TimingFirst,
    /// Second (last line) value of a scalar timing dump.
    TimingSecond,
}

impl ExtractorKind {
    pub fn is_timing(self) -> bool {
        matches!(self, ExtractorKind::TimingFirst | ExtractorKind::TimingSecond)
    }
}

/// Grid position hint for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PanelSlot {
    pub row: u32,
    pub col: u32,
    /// Number of columns the panel spans.
    pub span: u32,
}

fn default_scale() -> f64 {
    1.0
}

fn default_x_scale() -> AxisScale {
    AxisScale::Log
}

// --- Default implementations ---

impl Default for PanelSlot {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            span: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            x_label: "Problem size N".to_string(),
            variants: vec![
                VariantConfig {
                    name: "T1".to_string(),
                    root: PathBuf::from("resultadosT1"),
                },
                VariantConfig {
                    name: "T2".to_string(),
                    root: PathBuf::from("resultadosT2"),
                },
            ],
            metrics: default_metrics(),
        }
    }
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn timing_metric(
    key: &str,
    title: &str,
    extractor: ExtractorKind,
    patterns: &[&str],
    col: u32,
) -> MetricConfig {
    MetricConfig {
        key: key.to_string(),
        category: "tempo".to_string(),
        title: title.to_string(),
        y_label: "Time (ms)".to_string(),
        unit: "ms".to_string(),
        scale: 1000.0,
        x_scale: AxisScale::Log,
        y_scale: AxisScale::Linear,
        extractor,
        patterns: labels(patterns),
        sub_series: Vec::new(),
        panel: PanelSlot { row: 0, col, span: 1 },
    }
}

fn default_metrics() -> Vec<MetricConfig> {
    vec![
        timing_metric(
            "tempo_op1",
            "Execution time OP1 (PCG iteration)",
            ExtractorKind::TimingFirst,
            &["Runtime (RDTSC) [s]", "Runtime unhalted [s]"],
            0,
        ),
        timing_metric(
            "tempo_op2",
            "Execution time OP2 (residual)",
            ExtractorKind::TimingSecond,
            &[],
            1,
        ),
        MetricConfig {
            key: "mem".to_string(),
            category: "mem".to_string(),
            title: "Memory bandwidth".to_string(),
            y_label: "MBytes/s".to_string(),
            unit: "MBytes/s".to_string(),
            scale: 1.0,
            x_scale: AxisScale::Log,
            y_scale: AxisScale::Linear,
            extractor: ExtractorKind::Tabular,
            patterns: labels(&["Memory bandwidth [MBytes/s]", "L3 bandwidth [MBytes/s]"]),
            sub_series: Vec::new(),
            panel: PanelSlot {
                row: 1,
                col: 0,
                span: 1,
            },
        },
        MetricConfig {
            key: "l2".to_string(),
            category: "l2".to_string(),
            title: "L2 cache miss".to_string(),
            y_label: "Miss ratio".to_string(),
            unit: String::new(),
            scale: 1.0,
            x_scale: AxisScale::Log,
            y_scale: AxisScale::Linear,
            extractor: ExtractorKind::Tabular,
            patterns: labels(&["L2 miss ratio", "L2 miss rate", "data cache miss ratio"]),
            sub_series: Vec::new(),
            panel: PanelSlot {
                row: 1,
                col: 1,
                span: 1,
            },
        },
        MetricConfig {
            key: "flops".to_string(),
            category: "flops".to_string(),
            title: "Arithmetic performance (FLOPS)".to_string(),
            y_label: "MFLOP/s".to_string(),
            unit: "MFLOP/s".to_string(),
            scale: 1.0,
            x_scale: AxisScale::Log,
            y_scale: AxisScale::Linear,
            extractor: ExtractorKind::Tabular,
            patterns: Vec::new(),
            sub_series: vec![
                SubSeriesConfig {
                    name: "Total".to_string(),
                    patterns: labels(&["DP MFLOP/s", "MFLOP/s"]),
                },
                SubSeriesConfig {
                    name: "AVX".to_string(),
                    patterns: labels(&["AVX DP MFLOP/s", "AVX MFLOP/s"]),
                },
            ],
            panel: PanelSlot {
                row: 2,
                col: 0,
                span: 2,
            },
        },
    ]
}

impl Config {
    /// Load config from `path`.
    ///
    /// When `explicit` is false (the default file name was used) a missing file
    /// yields the built-in defaults. A file that exists but cannot be read or
    /// parsed is always an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Config, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse a TOML document. Sections left out fall back to the defaults.
    pub fn from_toml(contents: &str) -> Result<Config, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })
    }

    /// Reject configurations the aggregator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(invalid("no variants configured"));
        }
        if self.metrics.is_empty() {
            return Err(invalid("no metrics configured"));
        }

        let mut names = HashSet::new();
        for v in &self.variants {
            if v.name.is_empty() {
                return Err(invalid("variant with empty name"));
            }
            if !names.insert(v.name.as_str()) {
                return Err(invalid(format!("duplicate variant '{}'", v.name)));
            }
        }

        let mut keys = HashSet::new();
        for m in &self.metrics {
            if !keys.insert(m.key.as_str()) {
                return Err(invalid(format!("duplicate metric '{}'", m.key)));
            }
            if m.category.is_empty() {
                return Err(invalid(format!("metric '{}' has no category", m.key)));
            }
            if !m.scale.is_finite() {
                return Err(invalid(format!("metric '{}' has a non-finite scale", m.key)));
            }
            if m.extractor.is_timing() {
                if !m.sub_series.is_empty() {
                    return Err(invalid(format!(
                        "timing metric '{}' cannot have sub-series",
                        m.key
                    )));
                }
                continue;
            }
            if m.sub_series.is_empty() {
                if m.patterns.is_empty() {
                    return Err(invalid(format!("metric '{}' has no patterns", m.key)));
                }
                continue;
            }
            let mut subs = HashSet::new();
            for s in &m.sub_series {
                if !subs.insert(s.name.as_str()) {
                    return Err(invalid(format!(
                        "metric '{}' repeats sub-series '{}'",
                        m.key, s.name
                    )));
                }
                if s.patterns.is_empty() {
                    return Err(invalid(format!(
                        "sub-series '{}' of metric '{}' has no patterns",
                        s.name, m.key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Metrics grouped by category, in order of first appearance.
    pub fn categories(&self) -> Vec<(&str, Vec<&MetricConfig>)> {
        let mut groups: Vec<(&str, Vec<&MetricConfig>)> = Vec::new();
        for m in &self.metrics {
            match groups.iter_mut().find(|(c, _)| *c == m.category) {
                Some((_, ms)) => ms.push(m),
                None => groups.push((m.category.as_str(), vec![m])),
            }
        }
        groups
    }
}

/// Variant name for a root given on the command line without one:
/// the directory name, minus a leading `resultados`.
pub fn variant_name_from_root(root: &Path) -> String {
    let base = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    match base.strip_prefix("resultados") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => base,
    }
}

/// Parse a `--variant` argument: `NAME=PATH` or a bare `PATH`.
pub fn parse_variant_arg(arg: &str) -> Result<VariantConfig, String> {
    match arg.split_once('=') {
        Some((name, root)) => {
            if name.is_empty() || root.is_empty() {
                return Err(format!("expected NAME=PATH, got '{arg}'"));
            }
            Ok(VariantConfig {
                name: name.to_string(),
                root: PathBuf::from(root),
            })
        }
        None if arg.is_empty() => Err("empty variant path".to_string()),
        None => {
            let root = PathBuf::from(arg);
            Ok(VariantConfig {
                name: variant_name_from_root(&root),
                root,
            })
        }
    }
}

fn invalid(detail: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        detail: detail.into(),
    }
}

/// Errors from loading or validating configuration. All are fatal.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        detail: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid { detail } => write!(f, "invalid config: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_metric_table() {
        let cfg = Config::default();
        let keys: Vec<&str> = cfg.metrics.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["tempo_op1", "tempo_op2", "mem", "l2", "flops"]);

        let mem = &cfg.metrics[2];
        assert_eq!(mem.patterns[0], "Memory bandwidth [MBytes/s]");
        assert_eq!(mem.x_scale, AxisScale::Log);
        assert_eq!(mem.y_scale, AxisScale::Linear);

        let flops = &cfg.metrics[4];
        assert_eq!(flops.sub_series.len(), 2);
        assert_eq!(flops.sub_series[0].patterns, vec!["DP MFLOP/s", "MFLOP/s"]);
        assert_eq!(flops.panel.span, 2);
    }

    #[test]
    fn test_categories_group_timing_metrics() {
        let cfg = Config::default();
        let cats = cfg.categories();
        let names: Vec<&str> = cats.iter().map(|(c, _)| *c).collect();
        assert_eq!(names, vec!["tempo", "mem", "l2", "flops"]);
        assert_eq!(cats[0].1.len(), 2);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.variants.len(), 2);
        assert_eq!(cfg.metrics.len(), 5);
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
x_label = "N"

[[variant]]
name = "base"
root = "runs/base"

[[metric]]
key = "throughput"
category = "flops"
title = "Throughput"
y_label = "MFLOP/s"
y_scale = "log"
patterns = ["DP MFLOP/s"]

[[metric]]
key = "t"
category = "tempo"
title = "Time"
y_label = "ms"
extractor = "timing_second"
scale = 1000.0
"#;
        let cfg = Config::from_toml(toml).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.x_label, "N");
        assert_eq!(cfg.variants.len(), 1);
        assert_eq!(cfg.variants[0].root, PathBuf::from("runs/base"));
        let m = &cfg.metrics[0];
        assert_eq!(m.x_scale, AxisScale::Log);
        assert_eq!(m.y_scale, AxisScale::Log);
        assert_eq!(m.extractor, ExtractorKind::Tabular);
        assert!((m.scale - 1.0).abs() < 1e-9);
        assert_eq!(m.panel, PanelSlot::default());
        assert_eq!(cfg.metrics[1].extractor, ExtractorKind::TimingSecond);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let err = Config::from_toml("[[metric]\nkey = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_default_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join(DEFAULT_CONFIG_FILE), false).unwrap();
        assert_eq!(cfg.metrics.len(), 5);
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml"), true).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_load_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "x_label = [").unwrap();
        let err = Config::load(&path, true).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut cfg = Config::default();
        cfg.variants.push(cfg.variants[0].clone());
        assert!(cfg.validate().unwrap_err().to_string().contains("duplicate variant"));

        let mut cfg = Config::default();
        cfg.metrics.push(cfg.metrics[2].clone());
        assert!(cfg.validate().unwrap_err().to_string().contains("duplicate metric"));
    }

    #[test]
    fn test_validate_rejects_missing_patterns() {
        let mut cfg = Config::default();
        cfg.metrics[2].patterns.clear();
        assert!(cfg.validate().unwrap_err().to_string().contains("no patterns"));

        let mut cfg = Config::default();
        cfg.metrics[4].sub_series[1].patterns.clear();
        assert!(cfg.validate().unwrap_err().to_string().contains("AVX"));
    }

    #[test]
    fn test_validate_timing_patterns_optional() {
        let mut cfg = Config::default();
        cfg.metrics[0].patterns.clear();
        cfg.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let mut cfg = Config::default();
        cfg.variants.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.metrics.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_variant_name_from_root() {
        assert_eq!(variant_name_from_root(Path::new("out/resultadosT1")), "T1");
        assert_eq!(variant_name_from_root(Path::new("baseline")), "baseline");
        assert_eq!(variant_name_from_root(Path::new("resultados")), "resultados");
    }

    #[test]
    fn test_parse_variant_arg() {
        let v = parse_variant_arg("opt=runs/optimized").unwrap();
        assert_eq!(v.name, "opt");
        assert_eq!(v.root, PathBuf::from("runs/optimized"));

        let v = parse_variant_arg("resultadosT2").unwrap();
        assert_eq!(v.name, "T2");

        assert!(parse_variant_arg("=x").is_err());
        assert!(parse_variant_arg("").is_err());
    }
}
