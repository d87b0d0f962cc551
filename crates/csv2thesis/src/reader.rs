use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// One non-empty data row, keyed by trimmed header. `index` counts from 2:
/// line 1 is the header, so data row N sits on source line N + 1, which is
/// also the value `--start-from` takes.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub index: usize,
    pub fields: BTreeMap<String, String>,
}

pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let delimiter = sniff_delimiter(content.lines().next().unwrap_or(""));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read CSV header of {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let index = i + 2;
        let record =
            record.with_context(|| format!("failed to parse CSV record on line {index}"))?;
        let mut fields = BTreeMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            let value = value.trim();
            if header.is_empty() || value.is_empty() {
                continue;
            }
            fields.insert(header.clone(), value.to_string());
        }
        if fields.is_empty() {
            continue;
        }
        rows.push(RawRow { index, fields });
    }
    Ok(rows)
}

/// Pick the delimiter that occurs most often in the header line. Handcrafted
/// exports are as likely to use semicolons or tabs as commas.
fn sniff_delimiter(header_line: &str) -> u8 {
    let candidates = [b';', b'\t', b','];
    candidates
        .into_iter()
        .map(|delim| (header_line.bytes().filter(|b| *b == delim).count(), delim))
        .filter(|(count, _)| *count > 0)
        .max_by_key(|(count, _)| *count)
        .map(|(_, delim)| delim)
        .unwrap_or(b',')
}
