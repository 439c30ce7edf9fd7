//! # wbasym-event
//!
//! Per-event record of the W+b charge-asymmetry analysis and its columnar
//! persistence.
//!
//! A single [`WbChargeAsymmetryEvent`] is reused for every event: populate it,
//! write a row with [`TreeWriter::fill`], then [`reset`](WbChargeAsymmetryEvent::reset).
//! Trees are stored as Parquet; [`EventTreeReader`] streams them back.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use wbasym_event::{EventTree, TreeWriter, WbChargeAsymmetryEvent};
//!
//! let mut w = TreeWriter::create(Path::new("out.parquet"), EventTree::create("data")).unwrap();
//! let mut ev = WbChargeAsymmetryEvent::new();
//! ev.run = 1;
//! ev.push_weight(1.0).unwrap();
//! w.fill(&ev).unwrap();
//! ev.reset();
//! w.close().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bounded;
pub mod error;
pub mod histogram;
pub mod reader;
pub mod record;
pub mod tree;

pub use bounded::{BoundedVec, CapacityError};
pub use error::{EventError, Result};
pub use histogram::Histo1D;
pub use reader::{EventTreeReader, ReadMode, read_event_tree, read_tree_metadata};
pub use record::{
    GenJet, Lepton, MAX_TRACKS, MAX_WEIGHTS, P4, RecoJet, Track, Tracks, WbChargeAsymmetryEvent,
    Weights,
};
pub use tree::{
    EVENT_TREE_SCHEMA_V1, EventTree, META_KEY_SCHEMA_VERSION, META_KEY_TREE_NAME, TreeWriter,
    column_names, event_schema, write_event_tree,
};
