#![cfg(feature = "io-csv")]

use anyhow::Result;
use sigcodec::io::csv::{Caster, ColumnKind, DELIMITERS};
use sigcodec::*;
use std::fs;
use std::io::Cursor;


fn read(text: &str, options: CsvReaderOptions) -> Result<CsvReader> {
    Ok(CsvReader::from_reader(Cursor::new(text.to_string()), options)?)
}

const MIXED: &str = "ints;reals;broken;names\n1;1;1;a\n2;2.5;x;b\n3;3;3;c\n";

#[test]
fn auto_typing_per_column() -> Result<()> {
    let mut r = read(MIXED, CsvReaderOptions::default())?;
    assert_eq!(r.signal_names(), ["ints", "reals", "broken", "names"]);
    assert_eq!(r.len(), 4);
    assert_eq!(r.signal_length(None)?, 3);

    assert_eq!(r.column_kind("ints")?, Some(ColumnKind::Integer));
    assert_eq!(r.signal("ints")?.data().as_i64(), Some(&[1i64, 2, 3][..]));

    assert_eq!(r.column_kind("reals")?, Some(ColumnKind::Real));
    assert_eq!(r.signal("reals")?.data().as_f64(), Some(&[1.0, 2.5, 3.0][..]));

    // A non-numeric cell reads as NaN and the column is typed real.
    assert_eq!(r.column_kind("broken")?, Some(ColumnKind::Real));
    let broken = r.signal("broken")?;
    let v = broken.data().as_f64().expect("real column");
    assert_eq!(v[0], 1.0);
    assert!(v[1].is_nan());
    assert_eq!(v[2], 3.0);

    assert_eq!(r.column_kind("names")?, Some(ColumnKind::Real));
    assert!(r.signal("names")?.data().as_f64().expect("real column").iter().all(|x| x.is_nan()));
    Ok(())
}

#[test]
fn prefetch_and_no_prefetch_agree() -> Result<()> {
    let mut eager = read(MIXED, CsvReaderOptions::default().with_scan(ScanStrategy::Prefetch))?;
    let mut lazy = read(MIXED, CsvReaderOptions::default().with_scan(ScanStrategy::NoPrefetch))?;

    assert!(eager.is_cached("reals")?);
    assert!(!lazy.is_cached("reals")?);
    assert_eq!(lazy.column_kind("reals")?, None);

    // "names" is all NaN, which never compares equal.
    for name in ["ints", "reals"] {
        assert_eq!(eager.signal(name)?, lazy.signal(name)?, "column {name}");
        assert!(lazy.is_cached(name)?);
        assert_eq!(eager.column_kind(name)?, lazy.column_kind(name)?);
    }
    // Cached access returns the same values again.
    assert_eq!(lazy.signal_window("ints", 1, None)?.data().as_i64(), Some(&[2i64, 3][..]));
    assert!(!lazy.is_cached("broken")?);
    Ok(())
}

#[test]
fn skips_preamble_and_leading_rows() -> Result<()> {
    let text = "exported by logger\nunits: s;m/s\nTime;Speed\n0;9.9\n1;0.5\n2;1.5\n3;2.5\n";
    let mut r = read(
        text,
        CsvReaderOptions::default().with_skip_lines(2).with_skip_data_lines(1),
    )?;
    assert_eq!(r.signal_names(), ["Time", "Speed"]);
    assert_eq!(r.signal("Time")?.data().as_i64(), Some(&[1i64, 2, 3][..]));
    let speed = r.signal("Speed")?;
    assert_all_approx_eq!(speed.data().as_f64().expect("reals"), &[0.5, 1.5, 2.5]);
    Ok(())
}

#[test]
fn supported_delimiters() -> Result<()> {
    for d in DELIMITERS {
        let text = format!("a{d}b\n1{d}2.5\n3{d}4.5\n");
        let mut r = read(&text, CsvReaderOptions::default().with_delimiter(d))?;
        assert_eq!(r.signal_names(), ["a", "b"], "delimiter {d:?}");
        assert_eq!(r.signal("b")?.data().as_f64(), Some(&[2.5, 4.5][..]));
    }
    Ok(())
}

#[test]
fn unsupported_delimiter_falls_back_to_semicolon() -> Result<()> {
    let r = read("a;b\n1;2\n", CsvReaderOptions::default().with_delimiter(':'))?;
    assert_eq!(r.signal_names(), ["a", "b"]);
    Ok(())
}

#[test]
fn trailing_delimiter_and_infinity_tokens() -> Result<()> {
    let mut r = read("a;b;\n1.#INF;-inf;\n2;Infinity;\n", CsvReaderOptions::default())?;
    assert_eq!(r.signal_names(), ["a", "b"]);
    assert_eq!(r.signal("a")?.data().as_f64(), Some(&[f64::INFINITY, 2.0][..]));
    assert_eq!(r.signal("b")?.data().as_f64(), Some(&[f64::NEG_INFINITY, f64::INFINITY][..]));
    Ok(())
}

#[test]
fn windows_and_lookup_errors() -> Result<()> {
    let mut r = read("n\n10\n11\n12\n13\n", CsvReaderOptions::default())?;
    assert_eq!(r.signal_window("n", -2, None)?.data().as_i64(), Some(&[12i64, 13][..]));
    assert_eq!(r.signal_window(0usize, 1, Some(2))?.data().as_i64(), Some(&[11i64, 12][..]));

    assert_eq!(r.signal_window("n", 2, Some(3)).map_err(|e| e.kind()).err(), Some(ErrorKind::Range));
    assert_eq!(r.signal("m").map_err(|e| e.kind()).err(), Some(ErrorKind::NotFound));
    assert_eq!(r.signal(1usize).map_err(|e| e.kind()).err(), Some(ErrorKind::NotFound));
    Ok(())
}

#[test]
fn header_only_file_reads_empty_reals() -> Result<()> {
    let mut r = read("a;b\n", CsvReaderOptions::default())?;
    assert_eq!(r.signal_length(Some("a".into()))?, 0);
    assert_eq!(r.column_kind("a")?, None);
    let a = r.signal("a")?;
    assert!(a.is_empty());
    assert_eq!(a.type_code(), Some(TypeCode::F64));
    Ok(())
}

#[test]
fn duplicate_header_is_format_error() {
    let err = read("a;a\n1;2\n", CsvReaderOptions::default()).expect_err("duplicate names");
    let err = err.downcast::<SignalError>().expect("codec error");
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn raw_and_caster_policies() -> Result<()> {
    let text = "v\n1,5\n2,25\n";
    let mut raw = read(text, CsvReaderOptions::default().with_delimiter(';').with_policy(ScanPolicy::Raw))?;
    assert_eq!(raw.column_kind("v")?, Some(ColumnKind::Text));
    assert_eq!(
        raw.signal("v")?.data().as_text(),
        Some(&["1,5".to_string(), "2,25".to_string()][..])
    );

    let comma = Caster::new(|s| s.replace(',', ".").parse().ok());
    let mut cast = read(text, CsvReaderOptions::default().with_policy(ScanPolicy::Caster(comma)))?;
    assert_eq!(cast.signal("v")?.data().as_f64(), Some(&[1.5, 2.25][..]));
    Ok(())
}

#[test]
fn iteration_yields_every_column() -> Result<()> {
    let mut r = read("a;b\n1;x\n2;y\n", CsvReaderOptions::default().with_policy(ScanPolicy::Raw))?;
    let names: Vec<String> = r.iter().map(|item| item.map(|(n, _)| n)).collect::<sigcodec::Result<_>>()?;
    assert_eq!(names, ["a", "b"]);
    assert_eq!(r.iter().count(), 2);
    r.close()?;
    Ok(())
}

#[test]
fn writer_emits_header_then_rows() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("out/signals.csv");

    let mut w = CsvWriter::create(&path, CsvWriterOptions::default())?;
    w.append("Time", &SignalArray::from(vec![0u32, 1, 2]))?;
    w.append("Value", &SignalArray::from(vec![0.5f64, 1.0, -2.25]))?;
    w.close()?;

    assert_eq!(fs::read_to_string(&path)?, "Time;Value\n0;0.5\n1;1.0\n2;-2.25\n");

    let mut r = CsvReader::open(&path, CsvReaderOptions::default())?;
    assert_eq!(r.signal("Time")?.data().as_i64(), Some(&[0i64, 1, 2][..]));
    assert_eq!(r.signal("Value")?.data().as_f64(), Some(&[0.5, 1.0, -2.25][..]));
    Ok(())
}

#[test]
fn writer_with_comma_delimiter() -> Result<()> {
    let mut w = CsvWriter::from_writer(Vec::new(), CsvWriterOptions::default().with_delimiter(','));
    w.append("x", &SignalArray::from(vec![1i16, -1]))?;
    w.append("label", &SignalArray::from(vec!["a,b".to_string(), "c".to_string()]))?;
    let out = String::from_utf8(w.into_inner()?)?;
    assert_eq!(out, "x,label\n1,\"a,b\"\n-1,c\n");
    Ok(())
}

#[test]
fn writer_rejects_misaligned_and_array_columns() -> Result<()> {
    let mut w = CsvWriter::from_writer(Vec::new(), CsvWriterOptions::default());
    w.append("a", &SignalArray::from(vec![1u8, 2, 3]))?;

    let short = w.append("b", &SignalArray::from(vec![1u8, 2]));
    assert_eq!(short.map_err(|e| e.kind()).err(), Some(ErrorKind::Format));

    let rows = SignalArray::from_rows(&[vec![1.0f64, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])?;
    assert_eq!(w.append("c", &rows).map_err(|e| e.kind()).err(), Some(ErrorKind::Format));

    let dup = w.append("a", &SignalArray::from(vec![4u8, 5, 6]));
    assert_eq!(dup.map_err(|e| e.kind()).err(), Some(ErrorKind::InvalidArgument));

    assert_eq!(w.signal_names(), ["a"]);
    assert_eq!(String::from_utf8(w.into_inner()?)?, "a\n1\n2\n3\n");
    Ok(())
}
