use std::path::Path;

use tracing::{info, instrument};

use crate::constants::{IATA_CODE, IATA_CODE_LEN, REFERENCE_NAME};
use crate::domain::{normalize_text, ReferenceAirport};
use crate::error::Result;

use super::extract::{read_as_utf8, ColumnIndex};

/// Load the IATA reference list, keeping rows with a 3-character code and a
/// non-blank name. Names are normalized; file order is preserved.
#[instrument(skip_all, fields(file = %path.display()))]
pub fn load_reference(path: &Path) -> Result<Vec<ReferenceAirport>> {
    let (content, _) = read_as_utf8(path)?;
    let reference = parse_reference(&content, path)?;
    info!("📚 Loaded {} reference airports", reference.len());
    Ok(reference)
}

pub fn parse_reference(content: &str, path: &Path) -> Result<Vec<ReferenceAirport>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let columns = ColumnIndex::new(reader.headers()?);
    columns.require(&[REFERENCE_NAME, IATA_CODE], path)?;

    let mut reference = Vec::new();
    for result in reader.records() {
        let row = result?;
        let code = columns.cell(&row, IATA_CODE).unwrap_or("");
        let name = normalize_text(columns.cell(&row, REFERENCE_NAME).unwrap_or(""));
        if code.chars().count() != IATA_CODE_LEN || name.is_empty() {
            continue;
        }
        reference.push(ReferenceAirport {
            name,
            iata_code: code.to_string(),
        });
    }
    Ok(reference)
}
