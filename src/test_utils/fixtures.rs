//! Canned portal payloads and snapshots used across test modules.

use crate::model::Snapshot;
use crate::portal::feed;
use chrono::{Local, TimeZone};

/// A well-formed two-day export: volume in column 1, index in column 3.
pub const TWO_ROW_CSV: &str = "Date;Consommation journalière (L);Etat;Index (m3)\n\
                               01/06/2024;12,0;0;1000\n\
                               02/06/2024;15,5;0;1015\n";

/// An export with a header but no data rows.
pub const HEADER_ONLY_CSV: &str = "Date;Consommation journalière (L);Etat;Index (m3)\n";

/// What the portal serves when the session is not accepted.
pub const HTML_ERROR_PAGE: &str = "<!DOCTYPE html>\n\
    <html><body><h1>Identifiants incorrects</h1></body></html>\n";

/// Snapshot of [`TWO_ROW_CSV`] fetched the morning after the last reading,
/// so cumulative gap-fill has nothing to bridge.
pub fn sample_snapshot() -> Snapshot {
    let (mapping, readings) = feed::parse_feed(TWO_ROW_CSV).expect("fixture CSV must parse");
    let fetched_at = Local.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
    Snapshot::from_history(fetched_at, mapping, readings).expect("fixture has readings")
}
