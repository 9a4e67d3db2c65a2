//! End-to-end conversion over an in-memory container: tree build,
//! polymorphic resolution, and all four output representations driven
//! through the record-source adapter.

use rowcast_walker::{
    Address, BufferSink, DictionaryProvider, FieldCursor, FieldDescriptor, MemoryImage,
    MemorySource, RecordStream, TypeDescriptor, WalkError,
};
use serde_json::json;

fn event_dictionary() -> DictionaryProvider {
    let mut dict = DictionaryProvider::new();
    dict.add_type(
        TypeDescriptor::new("Event", 120)
            .with_field(FieldDescriptor::new("trigger", 8, "unsigned int"))
            .with_field(FieldDescriptor::new("energy", 16, "double"))
            .with_field(FieldDescriptor::new("label", 24, "char").with_dims(&[12]))
            .with_field(FieldDescriptor::new("pos", 40, "Point"))
            .with_field(FieldDescriptor::new("tracks", 64, "ObjectArray"))
            .with_field(FieldDescriptor::new("samples", 80, "vector<float>"))
            .with_field(FieldDescriptor::new("parent", 96, "Event*"))
            .with_field(FieldDescriptor::new("note", 104, "WeakRef"))
            .with_field(FieldDescriptor::new("streamer", -1, "int")),
    );
    dict.add_type(
        TypeDescriptor::new("Point", 24)
            .with_field(FieldDescriptor::new("x", 8, "double"))
            .with_field(FieldDescriptor::new("y", 16, "double")),
    );
    dict.add_type(
        TypeDescriptor::new("Track", 24)
            .with_field(FieldDescriptor::new("id", 8, "int"))
            .with_field(FieldDescriptor::new("pt", 12, "float"))
            .with_field(FieldDescriptor::new("flags", 16, "unsigned short")),
    );
    dict
}

fn write_track(mem: &mut MemoryImage, id: i32, pt: f32, flags: u16) -> Address {
    let addr = mem.alloc_zeroed(24);
    mem.write(addr + 8, &id.to_le_bytes()).unwrap();
    mem.write(addr + 12, &pt.to_le_bytes()).unwrap();
    mem.write(addr + 16, &flags.to_le_bytes()).unwrap();
    mem.tag_class(addr, "Track");
    addr
}

#[allow(clippy::too_many_arguments)]
fn write_event(
    mem: &mut MemoryImage,
    trigger: u32,
    energy: f64,
    label: &str,
    pos: (f64, f64),
    tracks: &[Address],
    samples: &[f32],
    parent: Address,
) -> Address {
    let track_data = if tracks.is_empty() {
        0
    } else {
        let mut table = Vec::new();
        for t in tracks {
            table.extend_from_slice(&t.to_le_bytes());
        }
        mem.alloc(&table)
    };
    let sample_data = if samples.is_empty() {
        0
    } else {
        let mut raw = Vec::new();
        for s in samples {
            raw.extend_from_slice(&s.to_le_bytes());
        }
        mem.alloc(&raw)
    };

    let addr = mem.alloc_zeroed(120);
    mem.write(addr + 8, &trigger.to_le_bytes()).unwrap();
    mem.write(addr + 16, &energy.to_le_bytes()).unwrap();
    mem.write(addr + 24, label.as_bytes()).unwrap();
    mem.write(addr + 48, &pos.0.to_le_bytes()).unwrap();
    mem.write(addr + 56, &pos.1.to_le_bytes()).unwrap();
    mem.write(addr + 64, &track_data.to_le_bytes()).unwrap();
    mem.write(addr + 72, &(tracks.len() as u64).to_le_bytes())
        .unwrap();
    mem.write(addr + 80, &sample_data.to_le_bytes()).unwrap();
    mem.write(addr + 88, &((samples.len() * 4) as u64).to_le_bytes())
        .unwrap();
    mem.write(addr + 96, &parent.to_le_bytes()).unwrap();
    mem.tag_class(addr, "Event");
    addr
}

/// Container with one empty-collection record followed by a full one.
fn event_source() -> MemorySource {
    let mut mem = MemoryImage::new();
    let first = write_event(&mut mem, 1, 0.5, "empty\0", (0.0, 0.0), &[], &[], 0);
    let t1 = write_track(&mut mem, 1, 0.5, 3);
    let t2 = write_track(&mut mem, 2, 1.25, 7);
    let second = write_event(
        &mut mem,
        4_000_000_000,
        13.25,
        "muon\0",
        (1.5, -2.5),
        &[t1, t2],
        &[0.25, 0.75],
        first,
    );

    let mut source = MemorySource::new("Event", mem);
    source.push_record(first);
    source.push_record(second);
    source
}

#[test]
fn resolves_from_first_nonempty_record_then_converts() {
    let dict = event_dictionary();
    let mut stream = RecordStream::open(&dict, event_source()).unwrap();

    // The first record's collection is empty; resolution must keep
    // scanning until the second record fixes the element class.
    assert!(!stream.tree().resolved());
    stream.resolve_all().unwrap();
    assert!(stream.tree().resolved());

    stream.seek(1).unwrap();
    let text = stream.emit_text().unwrap();
    assert_eq!(text["trigger"].as_i64(), Some(4_000_000_000));
    assert_eq!(text["energy"].as_f64(), Some(13.25));
    assert_eq!(text["label"], json!("muon"));
    assert_eq!(text["pos"], json!({"x": 1.5, "y": -2.5}));
    assert_eq!(text["samples"], json!([0.25, 0.75]));
    assert_eq!(text["tracks"][0]["id"].as_i64(), Some(1));
    assert_eq!(text["tracks"][1]["flags"].as_i64(), Some(7));

    // The weak reference is absent from the text encoding entirely
    assert!(text.get("note").is_none());

    // The parent pointer wraps the nested record in its concrete type
    assert_eq!(text["parent"]["Event"]["label"], json!("empty"));
    assert_eq!(text["parent"]["Event"]["parent"], serde_json::Value::Null);
}

#[test]
fn schema_document_matches_resolved_tree() {
    let dict = event_dictionary();
    let mut stream = RecordStream::open(&dict, event_source()).unwrap();
    stream.resolve_all().unwrap();

    let schema = stream.tree().emit_schema().unwrap();
    assert_eq!(schema["type"], json!("record"));
    assert_eq!(schema["name"], json!("Event"));

    let fields = schema["fields"].as_array().unwrap();
    let names: Vec<&str> = fields
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    // Declaration order, weak reference and synthetic entries absent
    assert_eq!(
        names,
        vec!["trigger", "energy", "label", "pos", "tracks", "samples", "parent"]
    );

    assert_eq!(fields[0]["type"], json!("long"));
    assert_eq!(fields[4]["type"]["items"]["name"], json!("Track"));
    // The self-referential pointer refers to the already-declared record
    assert_eq!(fields[6]["type"], json!(["null", "Event"]));
}

#[test]
fn binary_encoding_follows_field_order() {
    let dict = event_dictionary();
    let mut stream = RecordStream::open(&dict, event_source()).unwrap();
    stream.resolve_all().unwrap();
    stream.seek(1).unwrap();

    let mut sink = BufferSink::new();
    stream.emit_binary(&mut sink).unwrap();
    assert!(!sink.is_empty());
    // First field is the promoted unsigned trigger on the 64-bit carrier
    assert_eq!(sink.bytes[0], 0x03);
    assert_eq!(&sink.bytes[1..9], &4_000_000_000i64.to_le_bytes());
}

#[test]
fn raw_buffer_copy_reports_typed_overflow() {
    let dict = event_dictionary();
    let mut stream = RecordStream::open(&dict, event_source()).unwrap();
    stream.resolve_all().unwrap();

    stream.seek(0).unwrap();
    // trigger(4) energy(8) label(12) pos(16) tracks(8) samples(8) parent(1)
    let mut buf = vec![0u8; 57];
    assert_eq!(stream.copy_to_buffer(&mut buf).unwrap(), 57);

    let mut short = vec![0u8; 16];
    match stream.copy_to_buffer(&mut short).unwrap_err() {
        WalkError::BufferTooSmall { available, .. } => assert_eq!(available, 16),
        other => panic!("expected BufferTooSmall, got {other:?}"),
    }
}

#[test]
fn mixed_element_classes_fail_per_record() {
    let dict = event_dictionary();

    let mut mem = MemoryImage::new();
    let t1 = write_track(&mut mem, 1, 0.5, 3);
    let stray = mem.alloc_zeroed(24);
    mem.tag_class(stray, "Point");
    let good = write_event(&mut mem, 1, 1.0, "good\0", (0.0, 0.0), &[t1], &[], 0);
    let t2 = write_track(&mut mem, 2, 1.5, 0);
    let bad = write_event(&mut mem, 2, 2.0, "bad\0", (0.0, 0.0), &[t2, stray], &[], 0);

    let mut source = MemorySource::new("Event", mem);
    source.push_record(good);
    source.push_record(bad);

    let mut stream = RecordStream::open(&dict, source).unwrap();
    stream.resolve_all().unwrap();

    stream.seek(0).unwrap();
    assert!(stream.emit_text().is_ok());

    stream.seek(1).unwrap();
    match stream.emit_text().unwrap_err() {
        WalkError::InconsistentElementClass {
            field,
            expected,
            found,
        } => {
            assert_eq!(field, "tracks");
            assert_eq!(expected, "Track");
            assert_eq!(found, "Point");
        }
        other => panic!("expected InconsistentElementClass, got {other:?}"),
    }

    // The failure is per record: the good one still converts
    stream.seek(0).unwrap();
    assert!(stream.emit_text().is_ok());
}

#[test]
fn exhausted_container_cannot_resolve() {
    let dict = event_dictionary();
    let mut mem = MemoryImage::new();
    let only = write_event(&mut mem, 1, 1.0, "lonely\0", (0.0, 0.0), &[], &[], 0);
    let mut source = MemorySource::new("Event", mem);
    source.push_record(only);

    let mut stream = RecordStream::open(&dict, source).unwrap();
    match stream.resolve_all().unwrap_err() {
        WalkError::UnresolvedPolymorphicType { field } => assert_eq!(field, "tracks"),
        other => panic!("expected UnresolvedPolymorphicType, got {other:?}"),
    }
}

#[test]
fn jagged_leaf_rebinds_counters_per_record() {
    let mut dict = DictionaryProvider::new();
    dict.add_type(
        TypeDescriptor::new("Sample", 16)
            .with_field(FieldDescriptor::new("n", 8, "int"))
            .with_field(FieldDescriptor::new("x", 12, "float").with_shape("x[n][4]")),
    );

    let mut mem = MemoryImage::new();
    let mut records = Vec::new();
    for n in [3usize, 1] {
        let mut raw = Vec::new();
        for i in 0..n * 4 {
            raw.extend_from_slice(&(i as f32).to_le_bytes());
        }
        let data = mem.alloc(&raw);
        let record = mem.alloc_zeroed(16);
        mem.write(record + 8, &(n as i32).to_le_bytes()).unwrap();
        records.push((record, data, n * 16));
    }

    let mut source = MemorySource::new("Sample", mem);
    for (record, data, byte_len) in records {
        let mut cursors = rowcast_walker::CursorMap::new();
        cursors.insert(
            "x".to_string(),
            FieldCursor {
                addr: data,
                byte_len,
            },
        );
        source.push_record_with_cursors(record, cursors);
    }

    let mut stream = RecordStream::open(&dict, source).unwrap();

    assert!(stream.advance().unwrap());
    let first = stream.emit_text().unwrap();
    assert_eq!(first["n"].as_i64(), Some(3));
    assert_eq!(first["x"].as_array().unwrap().len(), 3);
    assert_eq!(first["x"][0], json!([0.0, 1.0, 2.0, 3.0]));
    assert_eq!(first["x"][2], json!([8.0, 9.0, 10.0, 11.0]));

    // The counter cursor re-binds on advance; a stale binding would
    // still claim three rows here
    assert!(stream.advance().unwrap());
    let second = stream.emit_text().unwrap();
    assert_eq!(second["x"].as_array().unwrap().len(), 1);
    assert_eq!(second["x"][0], json!([0.0, 1.0, 2.0, 3.0]));
}
