//! Run configuration: entry-point parameters, era label and settings file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result, io_error};
use crate::histograms::Quantity;
use crate::selection::{ChannelSelection, ChargeSelection, Selection};

/// Data-taking era label, `era<YYYY>[suffix]` (e.g. `era2016`, `era2017BCDEF`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Era {
    label: String,
    year: u16,
}

impl Era {
    /// Validate and parse an era label.
    pub fn parse(label: &str) -> Result<Self> {
        let bad = || AnalysisError::InvalidEra(label.to_string());
        let rest = label.strip_prefix("era").ok_or_else(bad)?;
        let (digits, suffix) = rest.split_at_checked(4).ok_or_else(bad)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        if !suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(bad());
        }
        let year = digits.parse().map_err(|_| bad())?;
        Ok(Self { label: label.to_string(), year })
    }

    /// Full label as given.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Data-taking year.
    pub fn year(&self) -> u16 {
        self.year
    }
}

impl FromStr for Era {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Binning override for one control histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSetting {
    /// Quantity to rebin.
    pub quantity: Quantity,
    /// Number of uniform bins.
    pub bins: usize,
    /// Lower edge.
    pub lo: f64,
    /// Upper edge.
    pub hi: f64,
}

/// Optional knobs read from a YAML/JSON settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSettings {
    /// Output tree name.
    #[serde(default = "default_tree_name")]
    pub tree_name: String,

    /// Stop after this many input events.
    #[serde(default)]
    pub max_events: Option<u64>,

    /// Rows per output row group.
    #[serde(default = "default_flush_rows")]
    pub flush_rows: usize,

    /// Control-histogram binning overrides.
    #[serde(default)]
    pub histograms: Vec<HistogramSetting>,
}

fn default_tree_name() -> String {
    "data".to_string()
}

fn default_flush_rows() -> usize {
    wbasym_event::tree::DEFAULT_FLUSH_ROWS
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            tree_name: default_tree_name(),
            max_events: None,
            flush_rows: default_flush_rows(),
            histograms: Vec::new(),
        }
    }
}

/// Read settings; `.json` files are parsed as JSON, anything else as YAML.
pub fn read_settings(path: &Path) -> Result<AnalysisSettings> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let settings = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    Ok(settings)
}

/// Parameters of one analysis run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input event table.
    pub input: PathBuf,
    /// Output file.
    pub output: PathBuf,
    /// Lepton-flavour channel.
    pub channel: ChannelSelection,
    /// Lepton charge.
    pub charge: ChargeSelection,
    /// Data-taking era.
    pub era: Era,
    /// Log every event at debug level.
    pub debug: bool,
    /// Optional knobs.
    pub settings: AnalysisSettings,
}

impl RunConfig {
    /// Build from the legacy entry-point parameters (`debug` off).
    pub fn new(
        filename: impl Into<PathBuf>,
        outname: impl Into<PathBuf>,
        channel_selection: i32,
        charge_selection: i32,
        era: &str,
    ) -> Result<Self> {
        Ok(Self {
            input: filename.into(),
            output: outname.into(),
            channel: ChannelSelection::from_code(channel_selection)?,
            charge: ChargeSelection::from_code(charge_selection)?,
            era: Era::parse(era)?,
            debug: false,
            settings: AnalysisSettings::default(),
        })
    }

    /// Enable or disable per-event debug logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: AnalysisSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Channel and charge requirements.
    pub fn selection(&self) -> Selection {
        Selection { channel: self.channel, charge: self.charge }
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.input == self.output {
            return Err(AnalysisError::Config(format!(
                "output would overwrite input {}",
                self.input.display()
            )));
        }
        if self.settings.tree_name.trim().is_empty() {
            return Err(AnalysisError::Config("tree_name must be non-empty".into()));
        }
        if self.settings.flush_rows == 0 {
            return Err(AnalysisError::Config("flush_rows must be positive".into()));
        }
        Ok(())
    }
}
