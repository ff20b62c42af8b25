//! Streams and validates rows out of the uploaded XLSX workbook.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::NaiveDate;
use res_store::{Reservation, ReservationStatus, RowError};
use std::collections::HashSet;
use std::io::Cursor;
use std::str::FromStr;

pub struct ParsedWorkbook {
    pub reservations: Vec<Reservation>,
    pub errors: Vec<RowError>,
}

const COL_RESERVATION_ID: usize = 0;
const COL_GUEST_NAME: usize = 1;
const COL_CHECK_IN: usize = 2;
const COL_CHECK_OUT: usize = 3;
const COL_STATUS: usize = 4;

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn cell_string(row: &[Data], col: usize) -> Option<String> {
    row.get(col).and_then(|cell| match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.format("%Y-%m-%d").to_string()),
        _ => None,
    })
}

/// Parses the first sheet and validates every row per the ingestion
/// algorithm's field/duplicate/date/status checks. Rows are 1-indexed
/// from the header, so the first data row is reported as row 2.
pub fn parse(bytes: Vec<u8>) -> Result<ParsedWorkbook, String> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor).map_err(|e| format!("failed to open workbook: {e}"))?;

    let sheet_name = workbook.sheet_names().first().cloned().ok_or_else(|| "workbook has no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("failed to read sheet {sheet_name}: {e}"))?;

    let mut rows = range.rows();
    rows.next(); // header

    Ok(validate_rows(rows))
}

/// Row-by-row validation, split out from the sheet-opening plumbing so it
/// can be exercised directly against hand-built `Data` rows in tests.
fn validate_rows<'a>(rows: impl Iterator<Item = &'a [Data]>) -> ParsedWorkbook {
    let mut reservations = Vec::new();
    let mut errors = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut row_number: u64 = 1;
    let mut saw_any_row = false;

    for row in rows {
        row_number += 1;
        saw_any_row = true;

        let reservation_id = cell_string(row, COL_RESERVATION_ID);
        let guest_name = cell_string(row, COL_GUEST_NAME);
        let check_in_raw = cell_string(row, COL_CHECK_IN);
        let check_out_raw = cell_string(row, COL_CHECK_OUT);
        let status_raw = cell_string(row, COL_STATUS);

        let (reservation_id, guest_name, check_in_raw, check_out_raw, status_raw) =
            match (reservation_id, guest_name, check_in_raw, check_out_raw, status_raw) {
                (Some(a), Some(b), Some(c), Some(d), Some(e)) => (a, b, c, d, e),
                _ => {
                    errors.push(RowError { row: Some(row_number), error: "missing required field".to_string() });
                    continue;
                }
            };

        if !seen_ids.insert(reservation_id.clone()) {
            errors.push(RowError { row: Some(row_number), error: format!("duplicate reservation_id {reservation_id}") });
            continue;
        }

        let check_in = match parse_date(&check_in_raw) {
            Some(d) => d,
            None => {
                errors.push(RowError { row: Some(row_number), error: format!("unparseable check_in_date {check_in_raw:?}") });
                continue;
            }
        };
        let check_out = match parse_date(&check_out_raw) {
            Some(d) => d,
            None => {
                errors.push(RowError { row: Some(row_number), error: format!("unparseable check_out_date {check_out_raw:?}") });
                continue;
            }
        };

        if check_out <= check_in {
            errors.push(RowError { row: Some(row_number), error: "check_out_date must be after check_in_date".to_string() });
            continue;
        }

        let status = match ReservationStatus::from_str(&status_raw) {
            Ok(s) => s,
            Err(_) => {
                errors.push(RowError { row: Some(row_number), error: format!("unknown status {status_raw:?}") });
                continue;
            }
        };

        reservations.push(Reservation {
            id: None,
            reservation_id,
            guest_name,
            status,
            check_in_date: check_in.format("%Y-%m-%d").to_string(),
            check_out_date: check_out.format("%Y-%m-%d").to_string(),
        });
    }

    if !saw_any_row {
        errors.push(RowError { row: None, error: "workbook has zero data rows".to_string() });
    }

    ParsedWorkbook { reservations, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Data> {
        cells.iter().map(|c| Data::String(c.to_string())).collect()
    }

    #[test]
    fn accepts_a_valid_row() {
        let rows = vec![row(&["R-1", "Ada Lovelace", "2026-08-01", "2026-08-05", "PENDING"])];
        let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.reservations.len(), 1);
        assert_eq!(parsed.reservations[0].reservation_id, "R-1");
    }

    #[test]
    fn rejects_duplicate_reservation_ids() {
        let rows = vec![
            row(&["R-1", "Ada Lovelace", "2026-08-01", "2026-08-05", "PENDING"]),
            row(&["R-1", "Grace Hopper", "2026-09-01", "2026-09-03", "PENDING"]),
        ];
        let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
        assert_eq!(parsed.reservations.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].error.contains("duplicate reservation_id R-1"));
        assert_eq!(parsed.errors[0].row, Some(3));
    }

    #[test]
    fn rejects_check_out_before_check_in() {
        let rows = vec![row(&["R-2", "Grace Hopper", "2026-08-05", "2026-08-01", "PENDING"])];
        let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
        assert!(parsed.reservations.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].error.contains("must be after"));
    }

    #[test]
    fn rejects_missing_fields() {
        let rows = vec![row(&["R-3", "", "2026-08-01", "2026-08-05", "PENDING"])];
        let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
        assert!(parsed.reservations.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].error.contains("missing required field"));
    }

    #[test]
    fn rejects_unknown_status() {
        let rows = vec![row(&["R-4", "Grace Hopper", "2026-08-01", "2026-08-05", "not-a-status"])];
        let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
        assert!(parsed.reservations.is_empty());
        assert!(parsed.errors[0].error.contains("unknown status"));
    }

    #[test]
    fn flags_an_empty_workbook() {
        let rows: Vec<Vec<Data>> = Vec::new();
        let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
        assert!(parsed.reservations.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].error, "workbook has zero data rows");
    }

    proptest::proptest! {
        #[test]
        fn validator_never_panics_and_every_row_is_errored_or_kept(
            a in ".*", b in ".*", c in ".*", d in ".*", e in ".*",
        ) {
            let rows = vec![row(&[&a, &b, &c, &d, &e])];
            let parsed = validate_rows(rows.iter().map(|r| r.as_slice()));
            proptest::prop_assert!(parsed.reservations.len() + parsed.errors.len() >= 1);
        }
    }
}
