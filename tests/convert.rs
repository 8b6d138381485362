#![cfg(feature = "io-csv")]

use anyhow::Result;
use sigcodec::testing::*;
use sigcodec::*;
use std::fs;

#[test]
fn binary_to_text_and_back() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("in.bsig");
    let csv = tmp.path().join("mid.csv");
    let back = tmp.path().join("out.bsig");

    let signals = vec![
        ("Time".to_string(), SignalArray::from(ramp::<i64>(50))),
        (
            "Value".to_string(),
            SignalArray::from((0..50).map(|i| i as f64 / 8.0).collect::<Vec<f64>>()),
        ),
    ];
    write_fixture_bsig(&src, &signals, BsigWriterOptions::default())?;

    assert_eq!(convert_file(&src, &csv)?, 2);
    let text = fs::read_to_string(&csv)?;
    assert!(text.starts_with("Time;Value\n0;0.0\n1;0.125\n"), "{text}");

    assert_eq!(convert_file(&csv, &back)?, 2);
    let mut r = open_signals(&back)?;
    assert_eq!(r.format(), ContainerFormat::Binary);
    for (name, want) in &signals {
        assert_bit_exact(&r.signal(name)?, want);
    }
    Ok(())
}

#[test]
fn copy_selected_signals_between_streams() -> Result<()> {
    let bytes = bsig_bytes(&sample_signals(), BsigWriterOptions::default())?;
    let mut reader = SignalReader::from_reader(std::io::Cursor::new(bytes), SignalReaderOptions::default())?;

    let mut out = std::io::Cursor::new(Vec::new());
    let mut writer = SignalWriter::from_writer(
        &mut out,
        SignalWriterOptions::default().with_bsig(BsigWriterOptions::default().with_version(FormatVersion::V2)),
    )?;
    let copied = copy_signals(&mut reader, &mut writer, Some(&["Position", "Time"][..]))?;
    assert_eq!(copied, 2);
    writer.close()?;

    let mut r = BsigReader::from_reader(std::io::Cursor::new(out.into_inner()), BsigReaderOptions::default())?;
    assert_eq!(r.version(), FormatVersion::V2);
    assert_eq!(r.signal_names(), ["Position", "Time"]);
    assert_eq!(r.signal("Position")?.width(), 3);
    Ok(())
}

#[test]
fn uneven_lengths_cannot_become_text() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("uneven.bsig");
    let signals = vec![
        ("Time".to_string(), SignalArray::from(ramp::<u32>(8))),
        ("Value".to_string(), SignalArray::from(vec![0.1f64, 0.2, 0.3, 0.4])),
    ];
    write_fixture_bsig(&src, &signals, BsigWriterOptions::default())?;

    let err = convert_file(&src, tmp.path().join("uneven.csv")).expect_err("length mismatch");
    let chain = format!("{err:#}");
    assert!(chain.contains("\"Value\""), "{chain}");
    assert_eq!(
        err.downcast_ref::<SignalError>().map(SignalError::kind),
        Some(ErrorKind::Format)
    );
    Ok(())
}
