//! One-dimensional weighted histograms.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

/// A 1D histogram with explicit under/overflow.
///
/// Bins are half-open `[lo, hi)`; a value equal to the last edge is overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histo1D {
    /// Histogram name.
    pub name: String,
    /// Histogram title (axis label).
    #[serde(default)]
    pub title: String,
    /// Bin edges (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Bin contents (sum of weights per bin).
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin. Empty on input means unit-weight fills.
    #[serde(default)]
    pub sumw2: Vec<f64>,
    /// Underflow sum of weights.
    #[serde(default)]
    pub underflow: f64,
    /// Overflow sum of weights.
    #[serde(default)]
    pub overflow: f64,
    /// Number of fills landing in a bin or in the flows.
    #[serde(default)]
    pub entries: u64,
    /// Number of NaN fills (dropped).
    #[serde(default)]
    pub nan_entries: u64,
}

fn validate_edges(name: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(EventError::HistogramBinning(format!(
            "'{name}' needs at least 2 edges, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(EventError::HistogramBinning(format!(
            "'{name}' edges must be finite and strictly increasing"
        )));
    }
    Ok(())
}

impl Histo1D {
    /// Histogram with `n_bins` equal-width bins on `[lo, hi)`.
    pub fn uniform(
        name: impl Into<String>,
        title: impl Into<String>,
        n_bins: usize,
        lo: f64,
        hi: f64,
    ) -> Result<Self> {
        let name = name.into();
        if n_bins == 0 {
            return Err(EventError::HistogramBinning(format!("'{name}' needs at least one bin")));
        }
        let width = (hi - lo) / n_bins as f64;
        let edges = (0..=n_bins).map(|i| lo + width * i as f64).collect();
        Self::with_edges(name, title, edges)
    }

    /// Histogram with explicit (variable-width) bin edges.
    pub fn with_edges(
        name: impl Into<String>,
        title: impl Into<String>,
        bin_edges: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        validate_edges(&name, &bin_edges)?;
        let n_bins = bin_edges.len() - 1;
        Ok(Self {
            name,
            title: title.into(),
            bin_edges,
            bin_content: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            nan_entries: 0,
        })
    }

    /// Number of bins (excluding flows).
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Bin index for `x`, or `None` for under/overflow and NaN.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        let edges = &self.bin_edges;
        if x.is_nan() || x < edges[0] || x >= edges[edges.len() - 1] {
            return None;
        }
        // First edge strictly greater than x, minus one.
        Some(edges.partition_point(|&e| e <= x) - 1)
    }

    /// Add `w` at `x`.
    pub fn fill(&mut self, x: f64, w: f64) {
        if x.is_nan() {
            self.nan_entries += 1;
            return;
        }
        self.entries += 1;
        match self.find_bin(x) {
            Some(b) => {
                self.fill_missing_sumw2();
                self.bin_content[b] += w;
                self.sumw2[b] += w * w;
            }
            None if x < self.bin_edges[0] => self.underflow += w,
            None => self.overflow += w,
        }
    }

    /// Derive `sumw2` from the contents (unit weights) when it was not stored.
    fn fill_missing_sumw2(&mut self) {
        if self.sumw2.is_empty() {
            self.sumw2 = self.bin_content.clone();
        }
    }

    /// Multiply contents and flows by `factor` (sumw2 by `factor²`).
    pub fn scale(&mut self, factor: f64) {
        let f2 = factor * factor;
        for c in &mut self.bin_content {
            *c *= factor;
        }
        for s in &mut self.sumw2 {
            *s *= f2;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Statistical error of bin `b`.
    pub fn bin_error(&self, b: usize) -> f64 {
        self.sumw2.get(b).copied().unwrap_or(0.0).sqrt()
    }

    /// Check edges and array lengths (e.g. after deserialization).
    pub fn validate(&self) -> Result<()> {
        validate_edges(&self.name, &self.bin_edges)?;
        let n = self.bin_edges.len() - 1;
        if self.bin_content.len() != n {
            return Err(EventError::HistogramBinning(format!(
                "'{}' has {} bin contents for {n} bins",
                self.name,
                self.bin_content.len()
            )));
        }
        if !self.sumw2.is_empty() && self.sumw2.len() != n {
            return Err(EventError::HistogramBinning(format!(
                "'{}' has {} sumw2 entries for {n} bins",
                self.name,
                self.sumw2.len()
            )));
        }
        Ok(())
    }

    /// Read and validate a histogram from a JSON file.
    pub fn read_json(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut h: Self = serde_json::from_slice(&bytes)?;
        h.validate()?;
        h.fill_missing_sumw2();
        Ok(h)
    }

    /// Write the histogram as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}
