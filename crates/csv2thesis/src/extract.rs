use std::path::Path;

use anyhow::{anyhow, Context, Result};

use csv2thesis_extract::Extractor;

use crate::config::ImportConfig;
use crate::logging;
use crate::reader;

/// Parse a CSV file and print every extracted draft without touching the
/// Thesis Manager. Useful for checking a messy export before an import.
pub fn run(csv_file: String) -> Result<()> {
    let config = ImportConfig::from_env()?;
    let path = Path::new(&csv_file);
    let rows = reader::read_rows(path)?;
    if rows.is_empty() {
        return Err(anyhow!("no data rows found in {}", path.display()));
    }
    logging::info(format!(
        "extracting {} row(s) with provider {}",
        rows.len(),
        config.provider.as_str()
    ));
    let extractor = Extractor::new(config.provider, config.model.clone())
        .context("failed to initialize the extractor")?;
    let mut failures = 0usize;
    for row in &rows {
        println!("---- row {} ----", row.index);
        match extractor.extract(&row.fields, row.index) {
            Ok(draft) => println!("{draft}"),
            Err(err) => {
                failures += 1;
                println!("error: {err}");
            }
        }
    }
    logging::info(format!(
        "extracted {} row(s), {} failure(s)",
        rows.len() - failures,
        failures
    ));
    Ok(())
}
