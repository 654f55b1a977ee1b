/// Key-pattern extraction from tabular counter reports.
///
/// Reports contain rows such as:
///
/// ```text
/// |      DP MFLOP/s      |   4363.7 |
/// | Memory bandwidth [MBytes/s] | 1.2e4 |
/// ```
///
/// A metric is looked up through an ordered list of candidate labels. The
/// first label with a matching row anywhere in the text wins, even if a later
/// label would also match. Compile the labels once with [`KeyPatterns::new`]
/// and look values up with [`KeyPatterns::find`].
use regex::Regex;

/// Loose numeric run captured after the label cell. Anything it admits that
/// `f64` cannot parse is read as zero.
const VALUE_TOKEN: &str = r"([0-9.eE+\-]+)";

/// Compiled candidate labels for one metric, highest priority first.
#[derive(Debug, Clone)]
pub struct KeyPatterns {
    patterns: Vec<(String, Regex)>,
}

impl KeyPatterns {
    /// Compile `labels` in order. Labels are matched literally.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self, regex::Error> {
        let patterns = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                let re = Regex::new(&format!(
                    r"\|\s*{}\s*\|\s*{VALUE_TOKEN}",
                    regex::escape(label)
                ))?;
                Ok((label.to_string(), re))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(l, _)| l.as_str())
    }

    /// Value of the first label with a matching row, or `None` if no label matches.
    pub fn find(&self, text: &str) -> Option<f64> {
        for (label, re) in &self.patterns {
            if let Some(caps) = re.captures(text) {
                let token = &caps[1];
                tracing::debug!(label = %label, token, "key pattern matched");
                return Some(parse_lenient(label, token));
            }
        }
        None
    }
}

/// Malformed tokens become 0.0. The tabular extractor never drops a matched row.
fn parse_lenient(label: &str, token: &str) -> f64 {
    match token.parse::<f64>() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                label = %label,
                token,
                error = %e,
                "malformed numeric token, reading as 0"
            );
            0.0
        }
    }
}
