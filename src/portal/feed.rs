//! Parsing of the portal's consumption CSV export.
//!
//! The export is an uncontrolled format: the delimiter, the column order, the
//! column names, and the number formatting have all changed over time. Parsing
//! is therefore defensive end to end: the delimiter is sniffed, columns are
//! located by header keywords with fixed fallbacks, numeric fields are cleaned
//! before conversion, and a row that cannot be understood is skipped rather
//! than failing the whole feed.

use crate::error::FeedError;
use crate::model::{ColumnMapping, Reading};
use chrono::NaiveDate;

const SNIFF_SAMPLE_CHARS: usize = 1024;
const FALLBACK_DELIMITER: u8 = b';';
const DELIMITER_CANDIDATES: [u8; 4] = [b';', b',', b'\t', b'|'];
// day-first French dates first, ISO second; first successful format wins
const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];
const MARKUP_TOKENS: [&str; 3] = ["<html", "<!doctype", "<body"];

/// Parses a decoded export body into the resolved column mapping and the
/// ordered reading sequence.
pub fn parse_feed(raw: &str) -> Result<(ColumnMapping, Vec<Reading>), FeedError> {
    let sample: String = raw.chars().take(SNIFF_SAMPLE_CHARS).collect();
    if looks_like_markup(&sample) {
        return Err(FeedError::NotTabular);
    }

    let delimiter = sniff_delimiter(&sample);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let mut records: Vec<csv::StringRecord> = Vec::new();
    for record in reader.records() {
        match record {
            Ok(r) if r.iter().all(|field| field.trim().is_empty()) => {}
            Ok(r) => records.push(r),
            Err(e) => tracing::debug!("skipping malformed export row: {}", e),
        }
    }

    if records.len() < 2 {
        return Err(FeedError::TooShort {
            rows: records.len(),
        });
    }

    let mapping = resolve_columns(&records[0]);
    let readings: Vec<Reading> = records[1..]
        .iter()
        .filter_map(|record| {
            let reading = reading_from_record(record, &mapping);
            if reading.is_none() {
                tracing::debug!(row = ?record, "skipping row with unparsable date");
            }
            reading
        })
        .collect();

    if readings.is_empty() {
        return Err(FeedError::NoUsableRows);
    }
    Ok((mapping, readings))
}

/// Picks the delimiter by counting candidates on the first non-empty line of
/// the sample; semicolon wins ties and is the fallback when nothing matches.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let first_line = sample
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    let mut best = (FALLBACK_DELIMITER, 0usize);
    for candidate in DELIMITER_CANDIDATES {
        let count = first_line.matches(candidate as char).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Locates the date, index, and volume columns by case-folded keyword search
/// over the header row, falling back to the historical positions.
pub fn resolve_columns(header: &csv::StringRecord) -> ColumnMapping {
    let lowered: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
    let position = |keywords: &[&str], fallback: usize| {
        lowered
            .iter()
            .position(|h| keywords.iter().any(|k| h.contains(k)))
            .unwrap_or(fallback)
    };

    let fallback = ColumnMapping::default();
    ColumnMapping {
        date: position(&["date"], fallback.date),
        index: position(&["index", "relev"], fallback.index),
        volume: position(&["volume", "consommation"], fallback.volume),
    }
}

fn reading_from_record(record: &csv::StringRecord, mapping: &ColumnMapping) -> Option<Reading> {
    let date = parse_reading_date(record.get(mapping.date)?)?;
    Some(Reading {
        date,
        index: record.get(mapping.index).and_then(clean_index),
        volume: record.get(mapping.volume).and_then(clean_volume),
    })
}

/// Tries each known date format in order; `None` when none matches.
pub fn parse_reading_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Extracts a cumulative index from a raw field.
///
/// The field may carry thousands separators and a unit suffix ("1 234 m3").
/// Everything from the first letter on is dropped before retaining digits, so
/// the digit inside a unit like "m3" cannot leak into the value. An empty
/// result is a missing value, not zero.
pub fn clean_index(text: &str) -> Option<u64> {
    let numeric_part = text
        .split(|c: char| c.is_alphabetic())
        .next()
        .unwrap_or_default();
    let digits: String = numeric_part
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Extracts a daily volume from a raw field.
///
/// Comma is accepted as the decimal separator; whitespace and stray symbols
/// are dropped. An empty result is a missing value, not zero.
pub fn clean_volume(text: &str) -> Option<f64> {
    let numeric_part = text
        .split(|c: char| c.is_alphabetic())
        .next()
        .unwrap_or_default();
    let cleaned: String = numeric_part
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn looks_like_markup(sample: &str) -> bool {
    let lowered = sample.to_lowercase();
    MARKUP_TOKENS.iter().any(|token| lowered.contains(token))
}
