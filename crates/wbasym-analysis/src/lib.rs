//! # wbasym-analysis
//!
//! Event loop of the W+b charge-asymmetry analysis.
//!
//! [`run_wb_charge_asymmetry`] reads event records from a Parquet table,
//! applies the channel and charge requirements and the normalization, and
//! writes the kept events plus control histograms to a new Parquet tree.
//!
//! ## Example
//!
//! ```no_run
//! use wbasym_analysis::{RunConfig, run_wb_charge_asymmetry};
//!
//! let cfg = RunConfig::new("in.parquet", "out.parquet", 13, 1, "era2016").unwrap();
//! let summary = run_wb_charge_asymmetry(&cfg, None).unwrap();
//! println!("{} of {} events kept", summary.events_written, summary.events_read);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod histograms;
pub mod processor;
pub mod run;
pub mod selection;

pub use config::{AnalysisSettings, Era, HistogramSetting, RunConfig, read_settings};
pub use error::{AnalysisError, Result};
pub use histograms::{CUTFLOW, ControlHistograms, CutflowStep, Quantity};
pub use processor::{EventProcessor, Passthrough};
pub use run::{
    RunSummary, normalization_factor, read_output_histograms, run_wb_charge_asymmetry,
    run_with_processor,
};
pub use selection::{ChannelSelection, ChargeSelection, Selection, SelectionOutcome};
