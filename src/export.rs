//! Result export: CSV (UTF-8 with BOM), JSON and a plain text table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Value, json};

use crate::error::FinderError;
use crate::finder::{CallInfo, MethodRef, SearchReport};

const BOM: &str = "\u{FEFF}";
const CSV_HEADER: [&str; 4] = ["origin", "direct_caller", "line", "arguments"];

// ─── CSV ─────────────────────────────────────────────────────────────

/// Quote one CSV field, doubling inner quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn csv_row(fields: &[&str]) -> String {
    fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",")
}

/// Write rows as CSV: BOM, header, one quoted row per result, `\n` line endings.
pub fn write_csv<W: Write>(out: &mut W, rows: &[CallInfo]) -> std::io::Result<()> {
    out.write_all(BOM.as_bytes())?;
    writeln!(out, "{}", csv_row(&CSV_HEADER))?;
    for row in rows {
        let line = row.line.map(|l| l.to_string()).unwrap_or_default();
        writeln!(
            out,
            "{}",
            csv_row(&[
                &row.original_caller.display_name(),
                &row.direct_caller.display_name(),
                &line,
                &row.arguments_display(),
            ])
        )?;
    }
    Ok(())
}

pub fn export_csv(path: &Path, rows: &[CallInfo]) -> Result<(), FinderError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_csv(&mut out, rows)?;
    out.flush()?;
    Ok(())
}

// ─── JSON ────────────────────────────────────────────────────────────

pub fn to_json(target: &MethodRef, report: &SearchReport) -> Value {
    let results: Vec<Value> = report.results.iter().map(|row| json!({
        "origin": row.original_caller.display_name(),
        "originalCaller": row.original_caller,
        "directCaller": row.direct_caller,
        "line": row.line,
        "arguments": row.arguments,
    })).collect();
    json!({
        "target": target,
        "results": results,
        "summary": {
            "directCalls": report.direct_calls,
            "rows": report.results.len(),
            "methodsSearched": report.methods_searched,
            "edges": report.edges,
            "searchTimeMs": report.elapsed.as_secs_f64() * 1000.0,
        }
    })
}

pub fn write_json<W: Write>(out: &mut W, target: &MethodRef, report: &SearchReport) -> Result<(), FinderError> {
    serde_json::to_writer_pretty(&mut *out, &to_json(target, report))?;
    writeln!(out)?;
    Ok(())
}

// ─── Text ────────────────────────────────────────────────────────────

/// One aligned line per row: `origin <- direct_caller (Lnn) [args]`.
pub fn write_text<W: Write>(out: &mut W, rows: &[CallInfo]) -> std::io::Result<()> {
    let origins: Vec<String> = rows.iter().map(|r| r.original_caller.display_name()).collect();
    let width = origins.iter().map(|o| o.chars().count()).max().unwrap_or(0);
    for (row, origin) in rows.iter().zip(&origins) {
        let line = row.line.map(|l| format!("L{}", l)).unwrap_or_else(|| "N/A".to_string());
        let args = if row.arguments.is_empty() { "(none)".to_string() } else { row.arguments_display() };
        writeln!(
            out,
            "{:<width$} <- {} ({}) [{}]",
            origin,
            row.direct_caller.display_name(),
            line,
            args,
            width = width
        )?;
    }
    Ok(())
}
