//! CSV export of a day's history.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{Category, DayBucket, FlightEntry};
use crate::views::{COLUMNS, raw_row};

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row to any writer.
pub fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Header plus one row per flight, stored values only.
pub fn write_history<W: Write>(mut w: W, flights: &[FlightEntry]) -> io::Result<()> {
    let headers: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    write_row(&mut w, &headers)?;
    for flight in flights {
        write_row(&mut w, &raw_row(flight))?;
    }
    Ok(())
}

/// `YYYY-MM-DD_<category>.csv`
pub fn file_name(day: DayBucket, category: Category) -> String {
    format!("{}_{}.csv", day.key(), category)
}

/// Write the export into `dir` and return its path.
pub fn write_file(
    dir: &Path,
    day: DayBucket,
    category: Category,
    flights: &[FlightEntry],
) -> Result<PathBuf> {
    let path = dir.join(file_name(day, category));
    let mut buf = Vec::new();
    write_history(&mut buf, flights)?;
    std::fs::write(&path, buf)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightRecord;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_quoting() {
        let mut out = Vec::new();
        write_row(
            &mut out,
            &["QF1".to_string(), "Sydney, NSW".to_string(), "say \"hi\"".to_string()],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "QF1,\"Sydney, NSW\",\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_write_file_name_and_content() {
        let tmp = TempDir::new().unwrap();
        let day = DayBucket::from_date(NaiveDate::from_ymd_opt(2024, 5, 29).unwrap());
        let mut flight = FlightEntry::from_record(&FlightRecord::new("QF1", "Landed"), day);
        flight.status_changed_at = Some(1_716_962_400);

        let path = write_file(tmp.path(), day, Category::Arrivals, &[flight]).unwrap();
        assert_eq!(path.file_name().unwrap(), "2024-05-29_arrivals.csv");

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "QF1,,,,,,Landed,2024-05-29,1716962400,"
        );
        assert!(lines.next().is_none());
    }
}
