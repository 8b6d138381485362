//! Copy signals between files of either format.
//!
//! Binary containers allow signals of different lengths and multi-column
//! rows; delimited text does not. Converting such a container to text fails on
//! the first signal the text writer rejects, naming it in the error.

use crate::io::signal::{SignalReader, SignalReaderOptions, SignalWriter, SignalWriterOptions};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Copy every signal (or only `names`, in that order) from `reader` to
/// `writer`. Returns the number of signals copied. The writer is not closed.
pub fn copy_signals(
    reader: &mut SignalReader<'_>,
    writer: &mut SignalWriter<'_>,
    names: Option<&[&str]>,
) -> Result<usize> {
    let selected: Vec<String> = match names {
        Some(names) => names.iter().map(|n| n.to_string()).collect(),
        None => reader.signal_names(),
    };
    for name in &selected {
        let values = reader
            .signal(name)
            .with_context(|| format!("read signal {name:?}"))?;
        writer
            .append(name, values)
            .with_context(|| format!("write signal {name:?}"))?;
    }
    debug!(signals = selected.len(), "copied signals");
    Ok(selected.len())
}

/// Convert `src` into `dst`, picking both formats from their extensions.
pub fn convert_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<usize> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    let mut reader = SignalReader::open(src, SignalReaderOptions::default())?;
    let mut writer = SignalWriter::create(dst, SignalWriterOptions::default())?;
    let n = copy_signals(&mut reader, &mut writer, None)
        .with_context(|| format!("convert {} to {}", src.display(), dst.display()))?;
    writer.close()?;
    reader.close()?;
    Ok(n)
}
