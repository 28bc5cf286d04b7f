//! Shared regex-based SQL table scanner (§4.3 `[AMBIENT]`). Used by both the
//! SSIS and COBOL `EXEC SQL` extractors so "best-effort lineage" extraction
//! is tested once instead of twice.
//!
//! This is explicitly a heuristic, not a SQL parser: CTEs, subqueries,
//! dynamic SQL, and quoted identifiers containing keywords will under-report
//! or occasionally mis-scan. Every entity/dependency produced here carries a
//! reduced `confidence` (see `CONFIDENCE`) rather than asserting
//! completeness (§9 open question).

use once_cell::sync::Lazy;
use regex::Regex;

/// Confidence assigned to regex-extracted SQL lineage (§9).
pub const CONFIDENCE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlVerb {
    From,
    Join,
    Into,
    Update,
    InsertInto,
    DeleteFrom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlReference {
    pub verb: SqlVerb,
    pub table: String,
}

static FROM_JOIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(FROM|JOIN)\s+([A-Za-z_][A-Za-z0-9_\.]*)").unwrap()
});
static INTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINTO\s+([A-Za-z_][A-Za-z0-9_\.]*)").unwrap());
static INSERT_INTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINSERT\s+INTO\s+([A-Za-z_][A-Za-z0-9_\.]*)").unwrap());
static UPDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bUPDATE\s+([A-Za-z_][A-Za-z0-9_\.]*)").unwrap());
static DELETE_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDELETE\s+FROM\s+([A-Za-z_][A-Za-z0-9_\.]*)").unwrap());

/// Scan a SQL fragment for table references (§4.3: `FROM`/`JOIN`/`INTO`/
/// `UPDATE`/`INSERT INTO`/`DELETE FROM`). `INSERT INTO`/`DELETE FROM` are
/// checked before the generic `INTO`/`FROM`/`JOIN` patterns so they aren't
/// double-counted under the wrong verb.
pub fn scan(sql: &str) -> Vec<SqlReference> {
    let mut refs = Vec::new();
    let mut consumed: Vec<(usize, usize)> = Vec::new();

    for m in INSERT_INTO.captures_iter(sql) {
        let whole = m.get(0).unwrap();
        consumed.push((whole.start(), whole.end()));
        refs.push(SqlReference { verb: SqlVerb::InsertInto, table: m[1].to_string() });
    }
    for m in DELETE_FROM.captures_iter(sql) {
        let whole = m.get(0).unwrap();
        consumed.push((whole.start(), whole.end()));
        refs.push(SqlReference { verb: SqlVerb::DeleteFrom, table: m[1].to_string() });
    }
    for m in UPDATE.captures_iter(sql) {
        let whole = m.get(0).unwrap();
        if overlaps(&consumed, whole.start(), whole.end()) {
            continue;
        }
        refs.push(SqlReference { verb: SqlVerb::Update, table: m[1].to_string() });
    }
    for m in INTO.captures_iter(sql) {
        let whole = m.get(0).unwrap();
        if overlaps(&consumed, whole.start(), whole.end()) {
            continue;
        }
        refs.push(SqlReference { verb: SqlVerb::Into, table: m[1].to_string() });
    }
    for cap in FROM_JOIN.captures_iter(sql) {
        let whole = cap.get(0).unwrap();
        if overlaps(&consumed, whole.start(), whole.end()) {
            continue;
        }
        let verb = if cap[1].eq_ignore_ascii_case("FROM") { SqlVerb::From } else { SqlVerb::Join };
        refs.push(SqlReference { verb, table: cap[2].to_string() });
    }

    refs
}

fn overlaps(consumed: &[(usize, usize)], start: usize, end: usize) -> bool {
    consumed.iter().any(|&(s, e)| start < e && end > s)
}

/// `true` if `verb` represents the statement reading data (vs. writing it).
pub fn is_read(verb: SqlVerb) -> bool {
    matches!(verb, SqlVerb::From | SqlVerb::Join)
}
