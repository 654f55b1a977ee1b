/// Hand-off to the chart renderer.
///
/// The aggregate is exported as JSON (one object per metric with its panel
/// metadata and per-variant series) for an external plotting tool, or printed
/// as a short per-series summary on the terminal.
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::series::{AggregateResult, Series, VariantSeries};

/// Serialize the aggregate as pretty-printed JSON.
pub fn to_json(result: &AggregateResult) -> Result<String, RenderError> {
    serde_json::to_string_pretty(result).map_err(|e| RenderError::Serialize { source: e })
}

/// Atomically write the JSON export to `path`.
///
/// Writes to a temporary file in the same directory, then renames it over
/// `path` so readers never see a partial file.
pub fn write_json(result: &AggregateResult, path: &Path) -> Result<(), RenderError> {
    let json = to_json(result)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RenderError::Write {
        path: dir.to_path_buf(),
        source: e,
    })?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| RenderError::Write {
            path: tmp.path().to_path_buf(),
            source: e,
        })?;
    tmp.persist(path).map_err(|e| RenderError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    tracing::info!(path = %path.display(), "wrote series export");
    Ok(())
}

fn describe(series: &Series) -> String {
    if series.is_empty() {
        return "no data".to_string();
    }
    let mut out = format!("{:>3} points", series.len());
    if let Some((lo, hi)) = series.size_range() {
        let _ = write!(out, "  N={lo}..{hi}");
    }
    if let Some((lo, hi)) = series.value_range() {
        let _ = write!(out, "  y={lo}..{hi}");
    }
    out
}

/// Plain-text overview: one line per (metric, variant[, sub-series]).
pub fn summary(result: &AggregateResult) -> String {
    let mut out = String::new();
    for (key, metric) in &result.metrics {
        let _ = writeln!(out, "{key}: {} [{}]", metric.meta.title, metric.meta.y_label);
        for (variant, vs) in &metric.variants {
            match vs {
                VariantSeries::Single(s) => {
                    let _ = writeln!(out, "  {variant:<12} {}", describe(s));
                }
                VariantSeries::Split(map) => {
                    for (sub, s) in map {
                        let label = format!("{variant} {sub}");
                        let _ = writeln!(out, "  {label:<12} {}", describe(s));
                    }
                }
            }
        }
    }
    if !result.diagnostics.is_empty() {
        let _ = writeln!(out, "{} files or directories skipped:", result.diagnostics.len());
        for d in &result.diagnostics {
            let _ = writeln!(out, "  [{}] {}: {}", d.variant, d.path, d.condition);
        }
    }
    out
}

/// Errors from exporting the aggregate.
#[derive(Debug)]
pub enum RenderError {
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Serialize { source } => write!(f, "failed to serialize series: {source}"),
            RenderError::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Serialize { source } => Some(source),
            RenderError::Write { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::config::{Config, VariantConfig};
    use crate::walker::FsWalker;
    use tempfile::tempdir;

    fn sample(root: &Path) -> AggregateResult {
        let flops = root.join("flops");
        std::fs::create_dir_all(&flops).unwrap();
        std::fs::write(
            flops.join("N_64"),
            "| DP MFLOP/s | 4363.7 |\n| AVX DP MFLOP/s | 10 |\n",
        )
        .unwrap();
        let cfg = Config {
            variants: vec![VariantConfig {
                name: "T1".to_string(),
                root: root.to_path_buf(),
            }],
            ..Config::default()
        };
        Aggregator::new(cfg).unwrap().run(&FsWalker::new()).unwrap()
    }

    #[test]
    fn test_json_layout() {
        let dir = tempdir().unwrap();
        let result = sample(dir.path());
        let json: serde_json::Value = serde_json::from_str(&to_json(&result).unwrap()).unwrap();

        let total = &json["metrics"]["flops"]["variants"]["T1"]["Total"];
        assert_eq!(total[0]["size"], 64);
        assert_eq!(total[0]["value"], 4363.7);
        assert_eq!(json["metrics"]["flops"]["meta"]["x_scale"], "log");
        assert_eq!(json["metrics"]["flops"]["meta"]["y_scale"], "linear");
        // Configured but empty groups are explicit empty arrays.
        assert_eq!(json["metrics"]["mem"]["variants"]["T1"], serde_json::json!([]));
        assert!(json["diagnostics"].as_array().unwrap().len() >= 3);
        assert_eq!(
            json["diagnostics"][0]["condition"],
            serde_json::json!("missing_directory")
        );
    }

    #[test]
    fn test_write_json_replaces_file() {
        let dir = tempdir().unwrap();
        let result = sample(&dir.path().join("run"));
        let out = dir.path().join("series.json");
        std::fs::write(&out, "stale").unwrap();

        write_json(&result, &out).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("4363.7"));
        assert!(!written.contains("stale"));
    }

    #[test]
    fn test_write_json_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        let result = sample(&dir.path().join("run"));
        let err = write_json(&result, &dir.path().join("no/such/dir/out.json")).unwrap_err();
        assert!(err.to_string().contains("failed to write"));
    }

    #[test]
    fn test_describe_ranges() {
        let mut s = Series::new();
        assert_eq!(describe(&s), "no data");
        s.push(512, 3.0);
        s.push(64, 0.5);
        assert_eq!(describe(&s), "  2 points  N=64..512  y=0.5..3");
    }

    #[test]
    fn test_summary_lists_every_group() {
        let dir = tempdir().unwrap();
        let result = sample(dir.path());
        let text = summary(&result);
        assert!(text.contains("flops: Arithmetic performance (FLOPS) [MFLOP/s]"));
        assert!(text.contains("T1 Total"));
        assert!(text.contains("1 points  N=64..64  y=4363.7..4363.7"));
        assert!(text.contains("T1 AVX"));
        assert!(text.contains("no data"));
        assert!(text.contains("skipped"));
    }
}
