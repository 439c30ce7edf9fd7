//! Integration tests: write event trees to Parquet and read them back.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float32Builder, Float64Array, Int32Array, Int64Array, ListBuilder, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use wbasym_event::{
    EventError, EventTree, EventTreeReader, GenJet, Lepton, P4, ReadMode, RecoJet, Track,
    TreeWriter, WbChargeAsymmetryEvent, read_event_tree, read_tree_metadata, write_event_tree,
};

fn sample_event(i: u32) -> WbChargeAsymmetryEvent {
    let mut ev = WbChargeAsymmetryEvent::new();
    ev.run = 1;
    ev.event = 100 + i;
    ev.lumi = 3;
    ev.cat = i % 2;
    ev.nvtx = 20 + i;
    ev.push_weight(1.0 + i as f32).unwrap();
    ev.push_weight(0.9).unwrap();
    ev.reco_sel = i % 2 == 0;
    ev.gen_sel = true;
    ev.lepton = Lepton { id: if i % 2 == 0 { 13 } else { -11 }, p4: P4 { pt: 25.0 + i as f32, eta: 0.4, phi: -1.1, m: 0.1 } };
    ev.jet = RecoJet { p4: P4 { pt: 50.0, eta: 1.2, phi: 2.5, m: 8.0 }, csv: 0.95 };
    for k in 0..i {
        ev.push_track(Track {
            charge: if k % 2 == 0 { 1 } else { -1 },
            id: 211,
            pt: 1.0 + k as f32,
            eta: 0.1 * k as f32,
            phi: -0.2 * k as f32,
        })
        .unwrap();
    }
    ev.met_pt = 35.5;
    ev.met_phi = 0.7;
    ev.nj = 2;
    ev.ngj = 2;
    ev.gen_lepton = Lepton { id: 13, p4: P4 { pt: 24.0, eta: 0.41, phi: -1.09, m: 0.1 } };
    ev.gen_jet = GenJet { p4: P4 { pt: 52.0, eta: 1.19, phi: 2.51, m: 7.5 }, flavor: 5 };
    ev.push_gen_track(Track { charge: -1, id: -321, pt: 4.0, eta: 0.0, phi: 0.3 }).unwrap();
    ev
}

fn write_raw(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut w = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    w.write(batch).unwrap();
    w.close().unwrap();
}

#[test]
fn roundtrip_preserves_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.parquet");
    let events: Vec<_> = (0..5).map(sample_event).collect();

    let meta = BTreeMap::from([("wbasym.era".to_string(), "era2016".to_string())]);
    let rows = write_event_tree(&path, "data", &events, &meta).unwrap();
    assert_eq!(rows, 5);

    let back = read_event_tree(&path).unwrap();
    assert_eq!(back, events);

    // Track triples keep identity and order.
    for (a, b) in events.iter().zip(&back) {
        assert_eq!(a.ntk(), b.ntk());
        for i in 0..a.ntk() {
            assert_eq!(a.tracks[i], b.tracks[i]);
        }
    }

    let md = read_tree_metadata(&path).unwrap();
    assert_eq!(md.get("wbasym.tree_name").map(String::as_str), Some("data"));
    assert_eq!(md.get("wbasym.era").map(String::as_str), Some("era2016"));
    assert_eq!(
        md.get("wbasym.schema_version").map(String::as_str),
        Some("wb_charge_asymmetry_event_v1")
    );
}

#[test]
fn full_track_capacity_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("full.parquet");
    let mut ev = WbChargeAsymmetryEvent::new();
    for k in 0..100 {
        ev.push_track(Track { charge: 1, id: k, pt: k as f32, eta: 0.0, phi: 0.0 }).unwrap();
    }
    write_event_tree(&path, "data", std::slice::from_ref(&ev), &BTreeMap::new()).unwrap();
    let back = read_event_tree(&path).unwrap();
    assert_eq!(back[0].ntk(), 100);
    assert_eq!(back[0].tracks[99].id, 99);
}

#[test]
fn streaming_writer_flushes_row_groups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.parquet");
    let mut w = TreeWriter::create(&path, EventTree::create("data")).unwrap().with_flush_rows(3);
    let mut ev = WbChargeAsymmetryEvent::new();
    for i in 0..10 {
        ev.reset();
        ev.event = i;
        w.fill(&ev).unwrap();
    }
    assert_eq!(w.entries(), 10);
    assert_eq!(w.close().unwrap(), 10);

    let mut reader = EventTreeReader::open(&path, ReadMode::Strict).unwrap();
    assert_eq!(reader.entries(), 10);
    assert_eq!(reader.tree_name(), Some("data"));
    let mut seen = Vec::new();
    while reader.next_into(&mut ev).unwrap() {
        seen.push(ev.event);
    }
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
    assert_eq!(reader.rows_read(), 10);
}

#[test]
fn next_into_resets_stale_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reset.parquet");
    write_event_tree(&path, "data", &[WbChargeAsymmetryEvent::new()], &BTreeMap::new()).unwrap();

    let mut ev = sample_event(4);
    let mut reader = EventTreeReader::open(&path, ReadMode::Strict).unwrap();
    assert!(reader.next_into(&mut ev).unwrap());
    assert_eq!(ev, WbChargeAsymmetryEvent::default());
    assert!(!reader.next_into(&mut ev).unwrap());
}

fn minimal_batch(with_event: bool) -> RecordBatch {
    let mut fields = vec![Field::new("run", DataType::UInt32, false)];
    let mut cols: Vec<ArrayRef> = vec![Arc::new(UInt32Array::from(vec![5, 6]))];
    if with_event {
        fields.push(Field::new("event", DataType::UInt32, false));
        cols.push(Arc::new(UInt32Array::from(vec![1, 2])));
    }
    // Float64 on input: read back as Float32.
    fields.push(Field::new("l_pt", DataType::Float64, false));
    cols.push(Arc::new(Float64Array::from(vec![30.5, 40.25])));
    RecordBatch::try_new(Arc::new(Schema::new(fields)), cols).unwrap()
}

#[test]
fn strict_mode_requires_all_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.parquet");
    write_raw(&path, &minimal_batch(true));

    let mut reader = EventTreeReader::open(&path, ReadMode::Strict).unwrap();
    let mut ev = WbChargeAsymmetryEvent::new();
    match reader.next_into(&mut ev) {
        Err(EventError::MissingColumn(c)) => assert_eq!(c, "lumi"),
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn lenient_mode_defaults_and_casts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.parquet");
    write_raw(&path, &minimal_batch(false));

    let mut reader = EventTreeReader::open(&path, ReadMode::Lenient).unwrap();
    assert_eq!(reader.tree_name(), None);
    let mut ev = WbChargeAsymmetryEvent::new();
    assert!(reader.next_into(&mut ev).unwrap());
    assert_eq!(ev.run, 5);
    assert_eq!(ev.event, 0);
    assert_eq!(ev.lepton.p4.pt, 30.5);
    assert!(reader.next_into(&mut ev).unwrap());
    assert_eq!(ev.run, 6);
    assert_eq!(ev.lepton.p4.pt, 40.25);
    assert!(!reader.next_into(&mut ev).unwrap());
}

fn track_pt_list(lens: &[usize]) -> ArrayRef {
    let mut b = ListBuilder::new(Float32Builder::new());
    for &n in lens {
        for k in 0..n {
            b.values().append_value(k as f32);
        }
        b.append(true);
    }
    Arc::new(b.finish())
}

fn track_batch(ntk: Vec<i32>, pt_lens: &[usize], eta_lens: &[usize]) -> RecordBatch {
    let list_f32 = DataType::List(Arc::new(Field::new_list_field(DataType::Float32, true)));
    let schema = Schema::new(vec![
        Field::new("ntk", DataType::Int32, false),
        Field::new("tk_pt", list_f32.clone(), false),
        Field::new("tk_eta", list_f32, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int32Array::from(ntk)),
            track_pt_list(pt_lens),
            track_pt_list(eta_lens),
        ],
    )
    .unwrap()
}

#[test]
fn count_column_must_match_list_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.parquet");
    write_raw(&path, &track_batch(vec![2, 5], &[2, 3], &[2, 3]));

    let mut reader = EventTreeReader::open(&path, ReadMode::Lenient).unwrap();
    let mut ev = WbChargeAsymmetryEvent::new();
    assert!(reader.next_into(&mut ev).unwrap());
    assert_eq!(ev.ntk(), 2);
    match reader.next_into(&mut ev) {
        Err(EventError::InconsistentCount { field, row, expected, actual }) => {
            assert_eq!(field, "ntk");
            assert_eq!(row, 1);
            // Declared count, then list length.
            assert_eq!(expected, 5);
            assert_eq!(actual, 3);
        }
        other => panic!("expected InconsistentCount, got {other:?}"),
    }
}

#[test]
fn parallel_track_lists_must_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parallel.parquet");
    write_raw(&path, &track_batch(vec![2], &[2], &[1]));

    let mut reader = EventTreeReader::open(&path, ReadMode::Lenient).unwrap();
    let mut ev = WbChargeAsymmetryEvent::new();
    assert!(matches!(
        reader.next_into(&mut ev),
        Err(EventError::InconsistentCount { ref field, .. }) if field == "tk_eta"
    ));
}

#[test]
fn oversized_track_list_is_capacity_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overflow.parquet");
    write_raw(&path, &track_batch(vec![101], &[101], &[101]));

    let mut reader = EventTreeReader::open(&path, ReadMode::Lenient).unwrap();
    let mut ev = WbChargeAsymmetryEvent::new();
    match reader.next_into(&mut ev) {
        Err(EventError::CapacityExceeded { field, capacity, requested }) => {
            assert_eq!(field, "tk_pt");
            assert_eq!(capacity, 100);
            assert_eq!(requested, 101);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

#[test]
fn foreign_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v2.parquet");
    let mut w = TreeWriter::create(&path, EventTree::create("data")).unwrap();
    w.set_metadata("wbasym.schema_version", "wb_charge_asymmetry_event_v2");
    w.close().unwrap();
    assert!(matches!(
        EventTreeReader::open(&path, ReadMode::Lenient),
        Err(EventError::SchemaMismatch(_))
    ));
}

fn single_column(name: &str, array: ArrayRef) -> RecordBatch {
    let schema = Schema::new(vec![Field::new(name, array.data_type().clone(), true)]);
    RecordBatch::try_new(Arc::new(schema), vec![array]).unwrap()
}

fn first_row_error(batch: &RecordBatch) -> EventError {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.parquet");
    write_raw(&path, batch);
    let mut ev = WbChargeAsymmetryEvent::new();
    let result = EventTreeReader::open(&path, ReadMode::Lenient)
        .and_then(|mut reader| reader.next_into(&mut ev));
    match result {
        Err(e) => e,
        Ok(more) => panic!("expected an error, got Ok({more}) with run={} nvtx={}", ev.run, ev.nvtx),
    }
}

#[test]
fn out_of_range_run_number_is_rejected() {
    let batch = single_column("run", Arc::new(Int64Array::from(vec![5_000_000_000])));
    assert!(matches!(first_row_error(&batch), EventError::SchemaMismatch(_)));
}

#[test]
fn negative_vertex_count_is_rejected() {
    let batch = single_column("nvtx", Arc::new(Int64Array::from(vec![-1])));
    assert!(matches!(first_row_error(&batch), EventError::SchemaMismatch(_)));
}

#[test]
fn fractional_lepton_id_is_rejected() {
    let batch = single_column("l_id", Arc::new(Float64Array::from(vec![13.7])));
    match first_row_error(&batch) {
        EventError::SchemaMismatch(msg) => assert!(msg.contains("l_id"), "{msg}"),
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn in_range_integer_widening_still_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("int64.parquet");
    write_raw(&path, &single_column("run", Arc::new(Int64Array::from(vec![4_000_000_000]))));
    let mut reader = EventTreeReader::open(&path, ReadMode::Lenient).unwrap();
    let mut ev = WbChargeAsymmetryEvent::new();
    assert!(reader.next_into(&mut ev).unwrap());
    assert_eq!(ev.run, 4_000_000_000);
}

#[test]
fn null_scalar_is_rejected() {
    let batch = single_column("lumi", Arc::new(UInt32Array::from(vec![None, Some(3)])));
    match first_row_error(&batch) {
        EventError::NullValue { field, row } => {
            assert_eq!(field, "lumi");
            assert_eq!(row, 0);
        }
        other => panic!("expected NullValue, got {other:?}"),
    }
}

#[test]
fn null_track_element_is_rejected() {
    let mut b = ListBuilder::new(Float32Builder::new());
    b.values().append_value(1.0);
    b.values().append_null();
    b.append(true);
    let batch = single_column("tk_pt", Arc::new(b.finish()));
    assert!(matches!(
        first_row_error(&batch),
        EventError::NullValue { ref field, row: 0 } if field == "tk_pt"
    ));
}
