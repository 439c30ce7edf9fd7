//! Streaming reader: Parquet event table → [`WbChargeAsymmetryEvent`].

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, BooleanArray, Float32Array, Int32Array, ListArray, UInt32Array};
use arrow::compute::CastOptions;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::error::{EventError, Result};
use crate::record::WbChargeAsymmetryEvent;
use crate::tree::{
    Accessor, COLUMNS, Column, EVENT_TREE_SCHEMA_V1, META_KEY_SCHEMA_VERSION, META_KEY_TREE_NAME,
    TrackSet,
};

/// How to treat columns missing from the input table.
///
/// Values present in the table are never defaulted: nulls and lossy casts are
/// errors in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Every column of the event schema must be present (count columns excepted).
    Strict,
    /// Missing columns leave the field at its reset default.
    Lenient,
}

enum Decoded {
    U32(UInt32Array),
    I32(Int32Array),
    F32(Float32Array),
    Bool(BooleanArray),
    List(ListArray),
}

fn downcast<T: Array + Clone + 'static>(arr: &ArrayRef, name: &str) -> Result<T> {
    arr.as_any().downcast_ref::<T>().cloned().ok_or_else(|| {
        EventError::SchemaMismatch(format!(
            "column '{name}' has type {:?} after cast",
            arr.data_type()
        ))
    })
}

fn check_present(arr: &dyn Array, row: usize, name: &str, file_row: u64) -> Result<()> {
    if arr.is_null(row) {
        return Err(EventError::NullValue { field: name.to_string(), row: file_row });
    }
    Ok(())
}

/// Float → integer casts truncate; refuse them instead.
fn float_to_integer(from: &DataType, to: &DataType) -> bool {
    match (from, to) {
        (DataType::List(f), DataType::List(t)) | (DataType::LargeList(f), DataType::List(t)) => {
            float_to_integer(f.data_type(), t.data_type())
        }
        _ => from.is_floating() && to.is_integer(),
    }
}

/// One input batch with its columns cast to the event schema.
struct DecodedBatch {
    n_rows: usize,
    columns: Vec<(&'static Column, Decoded)>,
}

impl DecodedBatch {
    fn new(batch: &RecordBatch, mode: ReadMode) -> Result<Self> {
        let mut columns = Vec::with_capacity(COLUMNS.len());
        for col in COLUMNS.iter() {
            let Some(raw) = batch.column_by_name(col.name) else {
                if mode == ReadMode::Strict && !matches!(col.accessor, Accessor::Count(_)) {
                    return Err(EventError::MissingColumn(col.name.to_string()));
                }
                continue;
            };
            let target = col.accessor.data_type();
            let arr = if raw.data_type() == &target {
                raw.clone()
            } else {
                if float_to_integer(raw.data_type(), &target) {
                    return Err(EventError::SchemaMismatch(format!(
                        "column '{}' of type {:?} cannot be read as {target:?} without truncation",
                        col.name,
                        raw.data_type()
                    )));
                }
                // Unsafe cast: out-of-range values fail instead of becoming null.
                let options = CastOptions { safe: false, ..Default::default() };
                arrow::compute::cast_with_options(raw, &target, &options).map_err(|e| {
                    EventError::SchemaMismatch(format!(
                        "column '{}' of type {:?} cannot be read as {target:?}: {e}",
                        col.name,
                        raw.data_type()
                    ))
                })?
            };
            let decoded = match col.accessor {
                Accessor::U32(..) => Decoded::U32(downcast(&arr, col.name)?),
                Accessor::I32(..) | Accessor::Count(_) => Decoded::I32(downcast(&arr, col.name)?),
                Accessor::F32(..) => Decoded::F32(downcast(&arr, col.name)?),
                Accessor::Bool(..) => Decoded::Bool(downcast(&arr, col.name)?),
                Accessor::Weights | Accessor::TrackI32(..) | Accessor::TrackF32(..) => {
                    Decoded::List(downcast(&arr, col.name)?)
                }
            };
            columns.push((col, decoded));
        }
        Ok(Self { n_rows: batch.num_rows(), columns })
    }

    fn decode_row(&self, row: usize, file_row: u64, ev: &mut WbChargeAsymmetryEvent) -> Result<()> {
        let mut declared: Vec<(&'static str, fn(&WbChargeAsymmetryEvent) -> usize, i32)> =
            Vec::new();
        let mut track_len: [Option<usize>; 2] = [None, None];

        for (col, data) in &self.columns {
            match (col.accessor, data) {
                (Accessor::U32(_, set), Decoded::U32(a)) => {
                    check_present(a, row, col.name, file_row)?;
                    set(ev, a.value(row));
                }
                (Accessor::I32(_, set), Decoded::I32(a)) => {
                    check_present(a, row, col.name, file_row)?;
                    set(ev, a.value(row));
                }
                (Accessor::F32(_, set), Decoded::F32(a)) => {
                    check_present(a, row, col.name, file_row)?;
                    set(ev, a.value(row));
                }
                (Accessor::Bool(_, set), Decoded::Bool(a)) => {
                    check_present(a, row, col.name, file_row)?;
                    set(ev, a.value(row));
                }
                (Accessor::Count(get), Decoded::I32(a)) => {
                    check_present(a, row, col.name, file_row)?;
                    declared.push((col.name, get, a.value(row)));
                }
                (Accessor::Weights, Decoded::List(a)) => {
                    let values: Float32Array = list_values(a, row, col.name, file_row)?;
                    ev.weights
                        .extend_from_slice(values.values())
                        .map_err(|e| e.for_field(col.name))?;
                }
                (Accessor::TrackI32(set, _, put), Decoded::List(a)) => {
                    let values: Int32Array = list_values(a, row, col.name, file_row)?;
                    let tracks =
                        prepare_tracks(ev, set, values.len(), &mut track_len, col.name, file_row)?;
                    for (t, &v) in tracks.iter_mut().zip(values.values()) {
                        put(t, v);
                    }
                }
                (Accessor::TrackF32(set, _, put), Decoded::List(a)) => {
                    let values: Float32Array = list_values(a, row, col.name, file_row)?;
                    let tracks =
                        prepare_tracks(ev, set, values.len(), &mut track_len, col.name, file_row)?;
                    for (t, &v) in tracks.iter_mut().zip(values.values()) {
                        put(t, v);
                    }
                }
                _ => {
                    return Err(EventError::SchemaMismatch(format!(
                        "column '{}' decoded with unexpected layout",
                        col.name
                    )));
                }
            }
        }

        for (name, get, count) in declared {
            let list_len = get(ev);
            if usize::try_from(count).ok() != Some(list_len) {
                return Err(EventError::InconsistentCount {
                    field: name.to_string(),
                    row: file_row,
                    expected: count.max(0) as usize,
                    actual: list_len,
                });
            }
        }
        Ok(())
    }
}

fn list_values<T: Array + Clone + 'static>(
    list: &ListArray,
    row: usize,
    name: &str,
    file_row: u64,
) -> Result<T> {
    check_present(list, row, name, file_row)?;
    let values: T = downcast(&list.value(row), name)?;
    if values.null_count() > 0 {
        return Err(EventError::NullValue { field: name.to_string(), row: file_row });
    }
    Ok(values)
}

/// Size the track sequence on the first track column of a row; later columns must agree.
fn prepare_tracks<'a>(
    ev: &'a mut WbChargeAsymmetryEvent,
    set: TrackSet,
    len: usize,
    track_len: &mut [Option<usize>; 2],
    name: &'static str,
    file_row: u64,
) -> Result<&'a mut [crate::record::Track]> {
    match track_len[set.index()] {
        None => {
            set.get_mut(ev).resize_default(len).map_err(|e| e.for_field(name))?;
            track_len[set.index()] = Some(len);
        }
        Some(expected) if expected != len => {
            return Err(EventError::InconsistentCount {
                field: name.to_string(),
                row: file_row,
                expected,
                actual: len,
            });
        }
        Some(_) => {}
    }
    Ok(set.get_mut(ev).as_mut_slice())
}

/// Streams rows of a Parquet event table into one reusable record.
pub struct EventTreeReader {
    reader: ParquetRecordBatchReader,
    mode: ReadMode,
    metadata: BTreeMap<String, String>,
    column_names: Vec<String>,
    entries: u64,
    batch: Option<DecodedBatch>,
    row_in_batch: usize,
    row: u64,
}

impl EventTreeReader {
    /// Open `path` for reading.
    pub fn open(path: &Path, mode: ReadMode) -> Result<Self> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let file_meta = builder.metadata().file_metadata();
        let entries = u64::try_from(file_meta.num_rows()).unwrap_or(0);
        let metadata: BTreeMap<String, String> = file_meta
            .key_value_metadata()
            .map(|kvs| {
                kvs.iter()
                    .filter_map(|kv| kv.value.as_ref().map(|v| (kv.key.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default();

        match metadata.get(META_KEY_SCHEMA_VERSION) {
            Some(v) if v != EVENT_TREE_SCHEMA_V1 => {
                return Err(EventError::SchemaMismatch(format!(
                    "unsupported {META_KEY_SCHEMA_VERSION} '{v}', expected '{EVENT_TREE_SCHEMA_V1}'"
                )));
            }
            Some(_) => {}
            None => tracing::debug!(path = %path.display(), "no schema version metadata"),
        }

        let column_names = builder.schema().fields().iter().map(|f| f.name().clone()).collect();
        let reader = builder.build()?;
        tracing::debug!(path = %path.display(), entries, ?mode, "opened event tree");

        Ok(Self {
            reader,
            mode,
            metadata,
            column_names,
            entries,
            batch: None,
            row_in_batch: 0,
            row: 0,
        })
    }

    /// Total number of rows in the file.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Rows decoded so far.
    pub fn rows_read(&self) -> u64 {
        self.row
    }

    /// File key-value metadata.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Tree name from metadata, if recorded.
    pub fn tree_name(&self) -> Option<&str> {
        self.metadata.get(META_KEY_TREE_NAME).map(String::as_str)
    }

    /// Column names present in the file.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Reset `ev` and decode the next row into it.
    ///
    /// Returns `false` once the input is exhausted.
    pub fn next_into(&mut self, ev: &mut WbChargeAsymmetryEvent) -> Result<bool> {
        ev.reset();
        loop {
            if let Some(batch) = &self.batch
                && self.row_in_batch < batch.n_rows
            {
                let result = batch.decode_row(self.row_in_batch, self.row, ev);
                self.row_in_batch += 1;
                self.row += 1;
                result?;
                return Ok(true);
            }
            match self.reader.next() {
                Some(batch) => {
                    self.batch = Some(DecodedBatch::new(&batch?, self.mode)?);
                    self.row_in_batch = 0;
                }
                None => return Ok(false),
            }
        }
    }
}

/// Read every row of a Parquet event tree (strict mode).
pub fn read_event_tree(path: &Path) -> Result<Vec<WbChargeAsymmetryEvent>> {
    let mut reader = EventTreeReader::open(path, ReadMode::Strict)?;
    let mut out = Vec::with_capacity(reader.entries() as usize);
    let mut ev = WbChargeAsymmetryEvent::new();
    while reader.next_into(&mut ev)? {
        out.push(ev.clone());
    }
    Ok(out)
}

/// Read only the key-value metadata of a Parquet event tree.
pub fn read_tree_metadata(path: &Path) -> Result<BTreeMap<String, String>> {
    Ok(EventTreeReader::open(path, ReadMode::Lenient)?.metadata)
}
