//! Cell classification and column typing for delimited-text signals.
//!
//! [`classify_cell`] is a pure function over one cell. [`scan_column`] folds
//! it over a column, tracking the column's [`ColumnKind`].
//!
//! The kind only moves up the ladder `Integer < Real < Text` as cells are
//! seen, with one exception: under [`ScanPolicy::Auto`] a cell that is neither
//! an integer nor a real number sets the kind to `Real` outright and is stored
//! as NaN. A column such as `["1", "x", "3"]` therefore reads back as the
//! reals `[1.0, NaN, 3.0]` instead of failing.

use crate::types::SignalData;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::warn;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("valid regex"));
static REAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").expect("valid regex")
});
static POS_INF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\+?(inf|infinity|1\.#inf)$").expect("valid regex"));
static NEG_INF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^-(inf|infinity|1\.#inf)$").expect("valid regex"));

/// Recorded type of a text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    /// The wider of two kinds.
    pub fn promote(self, seen: ColumnKind) -> ColumnKind {
        self.max(seen)
    }
}

/// Result of classifying one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Integer(i64),
    Real(f64),
    /// Not a number under the auto-scan rules.
    Invalid,
}

/// Classify a cell by pattern: integer, real number, or one of the infinity
/// tokens (`inf`, `infinity`, `1.#INF`, optionally signed, any case).
pub fn classify_cell(cell: &str) -> Cell {
    let s = cell.trim();
    if INTEGER.is_match(s) {
        // Out-of-range integers fall through to the real parse.
        if let Ok(v) = s.parse::<i64>() {
            return Cell::Integer(v);
        }
    }
    if REAL.is_match(s) {
        return match s.parse::<f64>() {
            Ok(v) => Cell::Real(v),
            Err(_) => Cell::Invalid,
        };
    }
    if POS_INF.is_match(s) {
        return Cell::Real(f64::INFINITY);
    }
    if NEG_INF.is_match(s) {
        return Cell::Real(f64::NEG_INFINITY);
    }
    Cell::Invalid
}

/// User-supplied scalar conversion. `None` marks an unparsable cell.
#[derive(Clone)]
pub struct Caster(pub Arc<dyn Fn(&str) -> Option<f64> + Send + Sync>);

impl Caster {
    pub fn new(f: impl Fn(&str) -> Option<f64> + Send + Sync + 'static) -> Self {
        Caster(Arc::new(f))
    }
}

impl fmt::Debug for Caster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Caster(..)")
    }
}

/// How cell text becomes values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Keep cells as strings.
    Raw,
    /// Classify each cell with [`classify_cell`].
    #[default]
    Auto,
    /// Convert every cell with a caller-supplied function.
    #[serde(skip)]
    Caster(Caster),
}

/// A typed column. `kind` is `None` when no cell was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedColumn {
    pub kind: Option<ColumnKind>,
    pub data: SignalData,
}

/// Type and convert one column's cells under `policy`.
pub fn scan_column<'c>(
    name: &str,
    cells: impl Iterator<Item = &'c str>,
    policy: &ScanPolicy,
) -> ScannedColumn {
    match policy {
        ScanPolicy::Raw => {
            let text: Vec<String> = cells.map(str::to_string).collect();
            let kind = (!text.is_empty()).then_some(ColumnKind::Text);
            ScannedColumn { kind, data: SignalData::Text(text) }
        }
        ScanPolicy::Caster(cast) => {
            let reals: Vec<f64> = cells.map(|c| (cast.0)(c).unwrap_or(f64::NAN)).collect();
            let kind = (!reals.is_empty()).then_some(ColumnKind::Real);
            ScannedColumn { kind, data: SignalData::F64(reals) }
        }
        ScanPolicy::Auto => scan_auto(name, cells),
    }
}

fn scan_auto<'c>(name: &str, cells: impl Iterator<Item = &'c str>) -> ScannedColumn {
    let mut kind: Option<ColumnKind> = None;
    let mut parsed = Vec::new();
    let mut invalid = 0usize;
    for c in cells {
        let cell = classify_cell(c);
        kind = Some(match (kind, cell) {
            (_, Cell::Invalid) => {
                invalid += 1;
                ColumnKind::Real
            }
            (None, Cell::Integer(_)) => ColumnKind::Integer,
            (None, Cell::Real(_)) => ColumnKind::Real,
            (Some(k), Cell::Integer(_)) => k.promote(ColumnKind::Integer),
            (Some(k), Cell::Real(_)) => k.promote(ColumnKind::Real),
        });
        parsed.push(cell);
    }
    if invalid > 0 {
        warn!(column = name, invalid, "non-numeric cells read as NaN; column typed as real");
    }

    let data = match kind {
        Some(ColumnKind::Integer) => SignalData::I64(
            parsed
                .iter()
                .map(|c| match c {
                    Cell::Integer(v) => *v,
                    _ => 0,
                })
                .collect(),
        ),
        _ => SignalData::F64(
            parsed
                .iter()
                .map(|c| match c {
                    Cell::Integer(v) => *v as f64,
                    Cell::Real(v) => *v,
                    Cell::Invalid => f64::NAN,
                })
                .collect(),
        ),
    };
    ScannedColumn { kind, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto(cells: &[&str]) -> ScannedColumn {
        scan_column("c", cells.iter().copied(), &ScanPolicy::Auto)
    }

    #[test]
    fn classify_patterns() {
        assert_eq!(classify_cell("42"), Cell::Integer(42));
        assert_eq!(classify_cell(" -7 "), Cell::Integer(-7));
        assert_eq!(classify_cell("2.5"), Cell::Real(2.5));
        assert_eq!(classify_cell(".5e1"), Cell::Real(5.0));
        assert_eq!(classify_cell("3."), Cell::Real(3.0));
        assert_eq!(classify_cell("1.#INF"), Cell::Real(f64::INFINITY));
        assert_eq!(classify_cell("Infinity"), Cell::Real(f64::INFINITY));
        assert_eq!(classify_cell("-inf"), Cell::Real(f64::NEG_INFINITY));
        assert_eq!(classify_cell("x"), Cell::Invalid);
        assert_eq!(classify_cell(""), Cell::Invalid);
        assert_eq!(classify_cell("nan"), Cell::Invalid);
    }

    #[test]
    fn huge_integer_becomes_real() {
        assert_eq!(classify_cell("99999999999999999999"), Cell::Real(1e20));
    }

    #[test]
    fn integer_column() {
        let col = auto(&["1", "2", "3"]);
        assert_eq!(col.kind, Some(ColumnKind::Integer));
        assert_eq!(col.data, SignalData::I64(vec![1, 2, 3]));
    }

    #[test]
    fn real_promotes_integer_column() {
        let col = auto(&["1", "2.5", "3"]);
        assert_eq!(col.kind, Some(ColumnKind::Real));
        assert_eq!(col.data, SignalData::F64(vec![1.0, 2.5, 3.0]));
    }

    #[test]
    fn bad_cell_downgrades_to_real() {
        let col = auto(&["1", "x", "3"]);
        assert_eq!(col.kind, Some(ColumnKind::Real));
        let v = col.data.as_f64().unwrap();
        assert_eq!(v[0], 1.0);
        assert!(v[1].is_nan());
        assert_eq!(v[2], 3.0);
    }

    #[test]
    fn raw_and_caster() {
        let raw = scan_column("c", ["a", "1"].into_iter(), &ScanPolicy::Raw);
        assert_eq!(raw.kind, Some(ColumnKind::Text));
        assert_eq!(raw.data, SignalData::Text(vec!["a".into(), "1".into()]));

        let comma = Caster::new(|s| s.replace(',', ".").parse().ok());
        let cast = scan_column("c", ["1,5", "?"].into_iter(), &ScanPolicy::Caster(comma));
        assert_eq!(cast.kind, Some(ColumnKind::Real));
        let v = cast.data.as_f64().unwrap();
        assert_eq!(v[0], 1.5);
        assert!(v[1].is_nan());
    }

    #[test]
    fn empty_column_has_no_kind() {
        assert_eq!(auto(&[]).kind, None);
        assert_eq!(ColumnKind::Integer.promote(ColumnKind::Text), ColumnKind::Text);
        assert_eq!(ColumnKind::Real.promote(ColumnKind::Integer), ColumnKind::Real);
    }
}
