//! Column binding of [`WbChargeAsymmetryEvent`] and the row-wise tree writer.
//!
//! # Schema: `wb_charge_asymmetry_event_v1`
//!
//! One row per kept event. Scalars map to primitive columns; the weight and
//! track sequences map to `List<_>` columns, with the `nw`/`ntk`/`ngtk` count
//! columns stored alongside for consumers of the flat layout.
//!
//! | Columns                                   | Arrow type       |
//! |-------------------------------------------|------------------|
//! | `run event lumi cat nvtx`                 | `UInt32`         |
//! | `nw ntk ngtk nj ngj l_id gl_id gj_flavor` | `Int32`          |
//! | `weight tk_pt tk_eta tk_phi gtk_*` floats | `List<Float32>`  |
//! | `tk_c tk_id gtk_c gtk_id`                 | `List<Int32>`    |
//! | `reco_sel gen_sel`                        | `Boolean`        |
//! | remaining kinematics                      | `Float32`        |
//!
//! ## Parquet key-value metadata
//!
//! | Key                      | Value                               |
//! |--------------------------|-------------------------------------|
//! | `wbasym.schema_version`  | `"wb_charge_asymmetry_event_v1"`    |
//! | `wbasym.tree_name`       | tree name given to [`EventTree::create`] |

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use arrow::array::{
    ArrayRef, BooleanBuilder, Float32Builder, Int32Builder, ListBuilder, UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::error::Result;
use crate::record::{Track, Tracks, WbChargeAsymmetryEvent};

/// Schema version string embedded in Parquet key-value metadata.
pub const EVENT_TREE_SCHEMA_V1: &str = "wb_charge_asymmetry_event_v1";

/// Metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "wbasym.schema_version";

/// Metadata key for the tree name.
pub const META_KEY_TREE_NAME: &str = "wbasym.tree_name";

/// Default number of rows buffered before a row group is flushed.
pub const DEFAULT_FLUSH_ROWS: usize = 8192;

// ---------------------------------------------------------------------------
// Column binding
// ---------------------------------------------------------------------------

type Ev = WbChargeAsymmetryEvent;

/// Which track sequence a track column refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackSet {
    Reco,
    Gen,
}

impl TrackSet {
    pub(crate) fn get(self, ev: &Ev) -> &Tracks {
        match self {
            TrackSet::Reco => &ev.tracks,
            TrackSet::Gen => &ev.gen_tracks,
        }
    }

    pub(crate) fn get_mut(self, ev: &mut Ev) -> &mut Tracks {
        match self {
            TrackSet::Reco => &mut ev.tracks,
            TrackSet::Gen => &mut ev.gen_tracks,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            TrackSet::Reco => 0,
            TrackSet::Gen => 1,
        }
    }
}

/// Getter/setter pair binding one column to one record field.
#[derive(Clone, Copy)]
pub(crate) enum Accessor {
    U32(fn(&Ev) -> u32, fn(&mut Ev, u32)),
    I32(fn(&Ev) -> i32, fn(&mut Ev, i32)),
    F32(fn(&Ev) -> f32, fn(&mut Ev, f32)),
    Bool(fn(&Ev) -> bool, fn(&mut Ev, bool)),
    /// Length of a bounded sequence; derived on write, checked on read.
    Count(fn(&Ev) -> usize),
    Weights,
    TrackI32(TrackSet, fn(&Track) -> i32, fn(&mut Track, i32)),
    TrackF32(TrackSet, fn(&Track) -> f32, fn(&mut Track, f32)),
}

impl Accessor {
    pub(crate) fn data_type(&self) -> DataType {
        match self {
            Accessor::U32(..) => DataType::UInt32,
            Accessor::I32(..) | Accessor::Count(_) => DataType::Int32,
            Accessor::F32(..) => DataType::Float32,
            Accessor::Bool(..) => DataType::Boolean,
            Accessor::Weights | Accessor::TrackF32(..) => list_of(DataType::Float32),
            Accessor::TrackI32(..) => list_of(DataType::Int32),
        }
    }
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new_list_field(item, true)))
}

/// A named column bound to a record field.
pub(crate) struct Column {
    pub(crate) name: &'static str,
    pub(crate) accessor: Accessor,
}

macro_rules! field {
    ($kind:ident, $($f:ident).+) => {
        Accessor::$kind(|e| e.$($f).+, |e, v| e.$($f).+ = v)
    };
}

macro_rules! track {
    ($kind:ident, $set:ident, $f:ident) => {
        Accessor::$kind(TrackSet::$set, |t| t.$f, |t, v| t.$f = v)
    };
}

/// Column layout, in output order.
pub(crate) static COLUMNS: LazyLock<Vec<Column>> = LazyLock::new(|| {
    let c = |name, accessor| Column { name, accessor };
    vec![
        c("run", field!(U32, run)),
        c("event", field!(U32, event)),
        c("lumi", field!(U32, lumi)),
        c("cat", field!(U32, cat)),
        c("nvtx", field!(U32, nvtx)),
        c("nw", Accessor::Count(|e| e.weights.len())),
        c("weight", Accessor::Weights),
        c("reco_sel", field!(Bool, reco_sel)),
        c("gen_sel", field!(Bool, gen_sel)),
        c("l_id", field!(I32, lepton.id)),
        c("l_pt", field!(F32, lepton.p4.pt)),
        c("l_eta", field!(F32, lepton.p4.eta)),
        c("l_phi", field!(F32, lepton.p4.phi)),
        c("l_m", field!(F32, lepton.p4.m)),
        c("j_pt", field!(F32, jet.p4.pt)),
        c("j_eta", field!(F32, jet.p4.eta)),
        c("j_phi", field!(F32, jet.p4.phi)),
        c("j_m", field!(F32, jet.p4.m)),
        c("j_csv", field!(F32, jet.csv)),
        c("ntk", Accessor::Count(|e| e.tracks.len())),
        c("tk_c", track!(TrackI32, Reco, charge)),
        c("tk_id", track!(TrackI32, Reco, id)),
        c("tk_pt", track!(TrackF32, Reco, pt)),
        c("tk_eta", track!(TrackF32, Reco, eta)),
        c("tk_phi", track!(TrackF32, Reco, phi)),
        c("met_pt", field!(F32, met_pt)),
        c("met_phi", field!(F32, met_phi)),
        c("nj", field!(I32, nj)),
        c("ngj", field!(I32, ngj)),
        c("gl_id", field!(I32, gen_lepton.id)),
        c("gl_pt", field!(F32, gen_lepton.p4.pt)),
        c("gl_eta", field!(F32, gen_lepton.p4.eta)),
        c("gl_phi", field!(F32, gen_lepton.p4.phi)),
        c("gl_m", field!(F32, gen_lepton.p4.m)),
        c("gj_flavor", field!(I32, gen_jet.flavor)),
        c("gj_pt", field!(F32, gen_jet.p4.pt)),
        c("gj_eta", field!(F32, gen_jet.p4.eta)),
        c("gj_phi", field!(F32, gen_jet.p4.phi)),
        c("gj_m", field!(F32, gen_jet.p4.m)),
        c("ngtk", Accessor::Count(|e| e.gen_tracks.len())),
        c("gtk_c", track!(TrackI32, Gen, charge)),
        c("gtk_id", track!(TrackI32, Gen, id)),
        c("gtk_pt", track!(TrackF32, Gen, pt)),
        c("gtk_eta", track!(TrackF32, Gen, eta)),
        c("gtk_phi", track!(TrackF32, Gen, phi)),
    ]
});

/// Names of all event-tree columns, in output order.
pub fn column_names() -> Vec<&'static str> {
    COLUMNS.iter().map(|c| c.name).collect()
}

/// Arrow schema of the event tree (without metadata).
pub fn event_schema() -> Schema {
    Schema::new(
        COLUMNS
            .iter()
            .map(|c| Field::new(c.name, c.accessor.data_type(), false))
            .collect::<Vec<_>>(),
    )
}

// ---------------------------------------------------------------------------
// In-memory tree
// ---------------------------------------------------------------------------

/// Column builder bound to the getter it pulls values from.
enum Slot {
    U32(fn(&Ev) -> u32, UInt32Builder),
    I32(fn(&Ev) -> i32, Int32Builder),
    Count(fn(&Ev) -> usize, Int32Builder),
    F32(fn(&Ev) -> f32, Float32Builder),
    Bool(fn(&Ev) -> bool, BooleanBuilder),
    Weights(ListBuilder<Float32Builder>),
    TrackI32(TrackSet, fn(&Track) -> i32, ListBuilder<Int32Builder>),
    TrackF32(TrackSet, fn(&Track) -> f32, ListBuilder<Float32Builder>),
}

impl Slot {
    fn bind(accessor: Accessor) -> Self {
        match accessor {
            Accessor::U32(get, _) => Slot::U32(get, UInt32Builder::new()),
            Accessor::I32(get, _) => Slot::I32(get, Int32Builder::new()),
            Accessor::Count(get) => Slot::Count(get, Int32Builder::new()),
            Accessor::F32(get, _) => Slot::F32(get, Float32Builder::new()),
            Accessor::Bool(get, _) => Slot::Bool(get, BooleanBuilder::new()),
            Accessor::Weights => Slot::Weights(ListBuilder::new(Float32Builder::new())),
            Accessor::TrackI32(set, get, _) => {
                Slot::TrackI32(set, get, ListBuilder::new(Int32Builder::new()))
            }
            Accessor::TrackF32(set, get, _) => {
                Slot::TrackF32(set, get, ListBuilder::new(Float32Builder::new()))
            }
        }
    }

    fn append(&mut self, ev: &Ev) {
        match self {
            Slot::U32(get, b) => b.append_value(get(ev)),
            Slot::I32(get, b) => b.append_value(get(ev)),
            // Bounded by MAX_WEIGHTS, always fits in i32.
            Slot::Count(get, b) => b.append_value(get(ev) as i32),
            Slot::F32(get, b) => b.append_value(get(ev)),
            Slot::Bool(get, b) => b.append_value(get(ev)),
            Slot::Weights(b) => {
                b.values().append_slice(&ev.weights);
                b.append(true);
            }
            Slot::TrackI32(set, get, b) => {
                for t in set.get(ev) {
                    b.values().append_value(get(t));
                }
                b.append(true);
            }
            Slot::TrackF32(set, get, b) => {
                for t in set.get(ev) {
                    b.values().append_value(get(t));
                }
                b.append(true);
            }
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Slot::U32(_, b) => Arc::new(b.finish()),
            Slot::I32(_, b) | Slot::Count(_, b) => Arc::new(b.finish()),
            Slot::F32(_, b) => Arc::new(b.finish()),
            Slot::Bool(_, b) => Arc::new(b.finish()),
            Slot::Weights(b) | Slot::TrackF32(_, _, b) => Arc::new(b.finish()),
            Slot::TrackI32(_, _, b) => Arc::new(b.finish()),
        }
    }
}

/// Event tree: a schema bound to the record plus the rows filled so far.
///
/// Creating the tree is the one-time column binding; every [`fill`](Self::fill)
/// snapshots the record's current values into a new row.
pub struct EventTree {
    name: String,
    schema: SchemaRef,
    slots: Vec<Slot>,
    pending: usize,
}

impl EventTree {
    /// Bind every record field to its column.
    pub fn create(name: impl Into<String>) -> Self {
        let name = name.into();
        let metadata = std::collections::HashMap::from([
            (META_KEY_SCHEMA_VERSION.to_string(), EVENT_TREE_SCHEMA_V1.to_string()),
            (META_KEY_TREE_NAME.to_string(), name.clone()),
        ]);
        let schema = Arc::new(event_schema().with_metadata(metadata));
        let slots = COLUMNS.iter().map(|c| Slot::bind(c.accessor)).collect();
        Self { name, schema, slots, pending: 0 }
    }

    /// Tree name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound schema (with version/name metadata).
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Rows filled since the last [`finish`](Self::finish).
    pub fn pending_rows(&self) -> usize {
        self.pending
    }

    /// Append one row holding the record's current values.
    pub fn fill(&mut self, ev: &WbChargeAsymmetryEvent) {
        for slot in &mut self.slots {
            slot.append(ev);
        }
        self.pending += 1;
    }

    /// Drain the pending rows into a [`RecordBatch`].
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.slots.iter_mut().map(Slot::finish).collect();
        self.pending = 0;
        Ok(RecordBatch::try_new(self.schema.clone(), arrays)?)
    }
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

fn default_compression() -> Compression {
    #[cfg(feature = "zstd")]
    {
        Compression::ZSTD(Default::default())
    }
    #[cfg(not(feature = "zstd"))]
    {
        Compression::SNAPPY
    }
}

/// Streams an [`EventTree`] to a Parquet file, one row group per flush.
pub struct TreeWriter {
    path: PathBuf,
    tree: EventTree,
    writer: ArrowWriter<File>,
    flush_rows: usize,
    written: u64,
    metadata: BTreeMap<String, String>,
}

impl TreeWriter {
    /// Create `path` and write the tree's schema.
    ///
    /// Uses Zstd if the `zstd` feature is enabled, otherwise Snappy.
    pub fn create(path: &Path, tree: EventTree) -> Result<Self> {
        let file = File::create(path)?;
        let props = WriterProperties::builder().set_compression(default_compression()).build();
        let writer = ArrowWriter::try_new(file, tree.schema(), Some(props))?;
        let metadata = BTreeMap::from([
            (META_KEY_SCHEMA_VERSION.to_string(), EVENT_TREE_SCHEMA_V1.to_string()),
            (META_KEY_TREE_NAME.to_string(), tree.name().to_string()),
        ]);
        tracing::debug!(path = %path.display(), tree = tree.name(), "opened tree writer");
        Ok(Self {
            path: path.to_path_buf(),
            tree,
            writer,
            flush_rows: DEFAULT_FLUSH_ROWS,
            written: 0,
            metadata,
        })
    }

    /// Override the number of rows buffered per row group (minimum 1).
    pub fn with_flush_rows(mut self, rows: usize) -> Self {
        self.flush_rows = rows.max(1);
        self
    }

    /// Append one row; flushes a row group when the buffer is full.
    pub fn fill(&mut self, ev: &WbChargeAsymmetryEvent) -> Result<()> {
        self.tree.fill(ev);
        if self.tree.pending_rows() >= self.flush_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Add a key-value metadata entry written at close time.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Rows filled so far (written or pending).
    pub fn entries(&self) -> u64 {
        self.written + self.tree.pending_rows() as u64
    }

    fn flush(&mut self) -> Result<()> {
        if self.tree.pending_rows() == 0 {
            return Ok(());
        }
        let batch = self.tree.finish()?;
        self.writer.write(&batch)?;
        self.written += batch.num_rows() as u64;
        Ok(())
    }

    /// Flush pending rows, write metadata and close the file.
    ///
    /// Returns the total number of rows.
    pub fn close(mut self) -> Result<u64> {
        self.flush()?;
        for (k, v) in std::mem::take(&mut self.metadata) {
            self.writer.append_key_value_metadata(KeyValue::new(k, v));
        }
        self.writer.close()?;
        tracing::info!(path = %self.path.display(), rows = self.written, "tree written");
        Ok(self.written)
    }
}

/// Write records to a Parquet file in one go.
pub fn write_event_tree(
    path: &Path,
    name: &str,
    events: &[WbChargeAsymmetryEvent],
    metadata: &BTreeMap<String, String>,
) -> Result<u64> {
    let mut w = TreeWriter::create(path, EventTree::create(name))?;
    for ev in events {
        w.fill(ev)?;
    }
    for (k, v) in metadata {
        w.set_metadata(k.clone(), v.clone());
    }
    w.close()
}
