//! CSV table reader with encoding and delimiter auto-detection.
//!
//! Produces headers plus string rows. No wallet-specific logic here;
//! column meaning is resolved by [`crate::normalize`].

use serde::Serialize;
use std::path::Path;

use crate::error::{CsvError, CsvResult};

const UTF8_BOM: char = '\u{feff}';

/// A decoded table with detection metadata
#[derive(Debug, Clone, Serialize)]
pub struct ParsedTable {
    /// Column headers, as written in the file
    pub headers: Vec<String>,
    /// Data rows, each padded or cut to `headers.len()` cells
    pub rows: Vec<Vec<String>>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Latin-1 is read as Windows-1252, its superset. Unknown encodings fall
/// back to lossy UTF-8. A leading byte order mark is removed.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when the header has a single column.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse already-decoded CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char, encoding: impl Into<String>) -> CsvResult<ParsedTable> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(&e, 1))?
        .iter()
        .map(|h| h.trim_start_matches(UTF8_BOM).to_string())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| malformed(&e, idx as u64 + 2))?;
        let row: Vec<String> = (0..headers.len())
            .map(|i| record.get(i).unwrap_or("").to_string())
            .collect();
        rows.push(row);
    }

    Ok(ParsedTable {
        headers,
        rows,
        encoding: encoding.into(),
        delimiter,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParsedTable> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    parse_str(&content, delimiter, encoding)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParsedTable> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

fn malformed(err: &csv::Error, fallback_line: u64) -> CsvError {
    let line = err
        .position()
        .map(|p| p.line())
        .unwrap_or(fallback_line);
    CsvError::Malformed {
        line,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let csv = "Wallet Name,Wallet Address\nCold A,0xAAA\nHot B,0xBBB";
        let table = parse_str(csv, ',', "utf-8").unwrap();

        assert_eq!(table.headers, vec!["Wallet Name", "Wallet Address"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Cold A", "0xAAA"]);
        assert_eq!(table.rows[1], vec!["Hot B", "0xBBB"]);
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let csv = "name,note\n\"Vault, main\",\"said \"\"hi\"\"\"";
        let table = parse_str(csv, ',', "utf-8").unwrap();

        assert_eq!(table.rows[0][0], "Vault, main");
        assert_eq!(table.rows[0][1], "said \"hi\"");
    }

    #[test]
    fn test_short_rows_padded_long_rows_cut() {
        let csv = "a;b;c\n1\n1;2;3;4";
        let table = parse_str(csv, ';', "utf-8").unwrap();

        assert_eq!(table.rows[0], vec!["1", "", ""]);
        assert_eq!(table.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a,b\n1,2\n\n3,4\n";
        let table = parse_str(csv, ',', "utf-8").unwrap();

        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_bytes_auto(b""), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_str("  \n", ',', "utf-8"), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse_semicolon() {
        let csv = "Wallet Name;Wallet Address\nLedger;bc1qxyz";
        let table = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(table.delimiter, ';');
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.headers, vec!["Wallet Name", "Wallet Address"]);
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Wallet Name,Wallet Address\nA,0x1");
        let table = parse_bytes_auto(&bytes).unwrap();

        assert_eq!(table.headers[0], "Wallet Name");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }
}
