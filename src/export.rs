use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::FIELD_COUNT;
use crate::reading::{ReadingTable, RowPolicy, column_titles};

pub const DEFAULT_FILENAME: &str = "tpg_data.csv";

/// Prefixes the file name of `path` with the local time, e.g.
/// `./tpg_data.csv` -> `./2025-01-31-14-05-09_tpg_data.csv`.
pub fn timestamped(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    path.with_file_name(format!(
        "{}_{}",
        chrono::Local::now().format("%Y-%m-%d-%H-%M-%S"),
        name
    ))
}

pub fn write_to<W: Write>(mut out: W, table: &ReadingTable, policy: RowPolicy) -> Result<()> {
    writeln!(out, "{}", column_titles().join(","))?;

    for row in table.rows(policy) {
        writeln!(
            out,
            "{}",
            row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        )?;
    }

    out.flush()?;
    Ok(())
}

/// Writes the table to `path`, replacing any existing file.
pub fn write_csv(path: &Path, table: &ReadingTable, policy: RowPolicy) -> Result<()> {
    let csv = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    write_to(BufWriter::new(csv), table, policy)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Reads back a file produced by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Vec<[f64; FIELD_COUNT]>> {
    let csv = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(csv).lines();

    let header = lines
        .next()
        .transpose()?
        .with_context(|| format!("{} is empty", path.display()))?;
    let expected = column_titles().join(",");
    if header.trim() != expected {
        bail!("Unexpected header {header:?}, expected {expected:?}");
    }

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let values = line
            .split(',')
            .map(|f| f.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Bad number on row {}", n + 1))?;

        let row: [f64; FIELD_COUNT] = values.as_slice().try_into().with_context(|| {
            format!(
                "Row {} has {} fields, expected {FIELD_COUNT}",
                n + 1,
                values.len()
            )
        })?;
        rows.push(row);
    }

    Ok(rows)
}
