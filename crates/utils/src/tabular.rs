use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use models::RowOutcome;

const BOM: char = '\u{feff}';

/// A per-format row normalizer. Column positions are resolved once when the
/// normalizer is built from the header row; `normalize` only indexes.
pub trait RowNormalizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn normalize(&self, rec: &StringRecord) -> RowOutcome;
}

/// A delimited text source split into its header row and data records.
#[derive(Debug, Clone)]
pub struct Table {
    /// Header names as they appear in the file, BOM removed.
    pub headers: Vec<String>,
    pub records: Vec<StringRecord>,
}

impl Table {
    /// Parses CSV text. The first row is the header row; quoted fields, doubled-quote
    /// escapes and both `\r\n` and `\n` line endings are accepted.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix(BOM).unwrap_or(text);
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .context("Missing CSV headers")?
            .iter()
            .map(|h| h.trim_start_matches(BOM).trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(anyhow!("CSV header row is empty"));
        }

        let mut records = Vec::new();
        for (row_idx, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("CSV read error at row {}", row_idx + 2))?;
            if rec.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            records.push(rec);
        }

        Ok(Self { headers, records })
    }
}

pub fn normalize_header(h: &str) -> String {
    h.trim_start_matches(BOM).trim().to_lowercase()
}

/// Index of a required column, matched case-insensitively.
pub fn find_col(headers: &[String], name: &str) -> Result<usize> {
    find_optional_col(headers, name).ok_or_else(|| anyhow!("Missing required column '{}'", name))
}

pub fn find_optional_col(headers: &[String], name: &str) -> Option<usize> {
    let wanted = normalize_header(name);
    headers.iter().position(|h| normalize_header(h) == wanted)
}

/// Trimmed field value; missing trailing fields read as empty.
pub fn field<'a>(rec: &'a StringRecord, idx: usize) -> &'a str {
    rec.get(idx).unwrap_or("").trim()
}

pub fn optional_field<'a>(rec: &'a StringRecord, idx: Option<usize>) -> &'a str {
    idx.map(|i| field(rec, i)).unwrap_or("")
}
