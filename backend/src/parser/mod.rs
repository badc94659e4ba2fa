//! CSV ingestion with encoding and delimiter auto-detection.
//!
//! Turns a CSV file into the analysis input contract (headers + sample
//! rows). No validation happens here: ragged rows are passed through as-is
//! so the input validator can classify them.

use serde_json::{Number, Value};
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::AnalysisInput;

/// Default number of sample rows kept from a file.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Parsed sample with detection metadata.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub input: AnalysisInput,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Data rows in the file, including those beyond the sample
    pub total_rows: usize,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string, lossily for unknown encodings.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding {
        "iso-8859-1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => {
            let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
            text.into_owned()
        }
    }
}

/// Pick the delimiter that occurs most often on the header line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    [',', ';', '\t', '|']
        .into_iter()
        .map(|sep| (sep, first_line.matches(sep).count()))
        .fold((',', 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .0
}

/// Type a raw cell: empty → null, numeric literal → number, else string.
pub fn cell_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(trimmed.to_string())
}

/// Parse CSV text with an explicit delimiter, keeping at most `max_rows`.
pub fn parse_str(content: &str, delimiter: char, max_rows: usize) -> CsvResult<(AnalysisInput, usize)> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut sample_data = Vec::new();
    let mut total_rows = 0;
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        total_rows += 1;
        if sample_data.len() < max_rows {
            sample_data.push(record.iter().map(cell_value).collect());
        }
    }

    Ok((AnalysisInput { headers, sample_data }, total_rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], max_rows: usize) -> CsvResult<ParsedCsv> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(content);

    let (input, total_rows) = parse_str(content, delimiter, max_rows)?;

    Ok(ParsedCsv {
        input,
        encoding,
        delimiter,
        total_rows,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, max_rows: usize) -> CsvResult<ParsedCsv> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, max_rows)
}
