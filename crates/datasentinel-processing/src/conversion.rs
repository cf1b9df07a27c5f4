use crate::codec::{read_dataset, write_dataset};
use crate::error::ProcessingResult;
use crate::format::FileFormat;

pub const CONVERTED_PREFIX: &str = "converted/";

/// Re-encode a tabular file from `source` to `target` format.
pub fn convert(bytes: &[u8], source: FileFormat, target: FileFormat) -> ProcessingResult<Vec<u8>> {
    let dataset = read_dataset(bytes, source)?;
    let output = write_dataset(&dataset, target)?;

    tracing::info!(
        source = %source,
        target = %target,
        rows = dataset.n_rows(),
        input_bytes = bytes.len(),
        output_bytes = output.len(),
        "Dataset converted"
    );

    Ok(output)
}

/// `converted/{base}_converted.{ext}` for a source key such as `raw/sales.csv`.
pub fn converted_key(filename: &str, target: FileFormat) -> String {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    let base = name.rsplit_once('.').map(|(base, _)| base).unwrap_or(name);
    format!(
        "{}{}_converted.{}",
        CONVERTED_PREFIX,
        base,
        target.extension()
    )
}
