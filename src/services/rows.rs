// src/services/rows.rs

//! Flight board row parsing.
//!
//! Turns a rendered board page into [`FlightRecord`]s using the configured
//! selectors. Each field selector picks the `index`-th match inside a row;
//! a field with no match is read as empty.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{FieldSelector, FlightRecord, SelectorsConfig};

/// A compiled field selector.
#[derive(Debug, Clone)]
struct Field {
    selector: Selector,
    index: usize,
}

impl Field {
    fn compile(field: &FieldSelector) -> Result<Self> {
        Ok(Self {
            selector: parse_selector(&field.css)?,
            index: field.index,
        })
    }

    fn read(&self, row: &ElementRef) -> String {
        row.select(&self.selector)
            .nth(self.index)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }
}

/// Parses flight rows out of a board page.
#[derive(Debug, Clone)]
pub struct RowParser {
    row: Selector,
    flight_number: Field,
    origin: Field,
    destination: Field,
    departure_time: Field,
    arrival_time: Field,
    gate: Field,
    status: Field,
}

impl RowParser {
    /// Compile every selector; fails on the first invalid one.
    pub fn new(selectors: &SelectorsConfig) -> Result<Self> {
        Ok(Self {
            row: parse_selector(&selectors.row)?,
            flight_number: Field::compile(&selectors.flight_number)?,
            origin: Field::compile(&selectors.origin)?,
            destination: Field::compile(&selectors.destination)?,
            departure_time: Field::compile(&selectors.departure_time)?,
            arrival_time: Field::compile(&selectors.arrival_time)?,
            gate: Field::compile(&selectors.gate)?,
            status: Field::compile(&selectors.status)?,
        })
    }

    /// Extract every row in document order.
    pub fn parse(&self, html: &str) -> Vec<FlightRecord> {
        let document = Html::parse_document(html);
        document
            .select(&self.row)
            .map(|row| self.parse_row(&row))
            .collect()
    }

    fn parse_row(&self, row: &ElementRef) -> FlightRecord {
        let record = FlightRecord {
            flight_number: self.flight_number.read(row),
            origin: self.origin.read(row),
            destination: self.destination.read(row),
            departure_time: self.departure_time.read(row),
            arrival_time: self.arrival_time.read(row),
            gate: self.gate.read(row),
            status: self.status.read(row),
        };
        log::debug!("Parsed row: {:?}", record);
        record
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r#"
    <html><body>
      <div class="SearchResultFlightListRow">
        <div class="flightNumberLogo"><div class="resultRow"><p>QF 680</p></div></div>
        <div class="col-dest"><div class="resultRow"><p>Adelaide</p><p>Melbourne</p></div></div>
        <div class="col-sched"><div class="resultRow"><p>10:05</p><p>11:50</p></div></div>
        <div class="col-xs-4 col-sm-3 col-lg-3"><div class="resultRow"><p>14</p><p>Final Call</p></div></div>
      </div>
      <div class="SearchResultFlightListRow">
        <div class="flightNumberLogo"><div class="resultRow"><p> JQ 771 </p></div></div>
        <div class="col-dest"><div class="resultRow"><p>Adelaide</p><p>Sydney</p></div></div>
        <div class="col-sched"><div class="resultRow"><p>10:30</p><p>12:40</p></div></div>
        <div class="col-xs-4 col-sm-3 col-lg-3"><div class="resultRow"><p>3</p><p></p></div></div>
      </div>
      <div class="SearchResultFlightListRow">
        <div class="col-dest"><div class="resultRow"><p>Adelaide</p></div></div>
      </div>
    </body></html>
    "#;

    #[test]
    fn test_parse_board() {
        let parser = RowParser::new(&SelectorsConfig::default()).unwrap();
        let rows = parser.parse(BOARD);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            FlightRecord {
                flight_number: "QF 680".into(),
                origin: "Adelaide".into(),
                destination: "Melbourne".into(),
                departure_time: "10:05".into(),
                arrival_time: "11:50".into(),
                gate: "14".into(),
                status: "Final Call".into(),
            }
        );
        assert_eq!(rows[1].flight_number, "JQ 771");
        assert_eq!(rows[1].status, "");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let parser = RowParser::new(&SelectorsConfig::default()).unwrap();
        let rows = parser.parse(BOARD);

        assert_eq!(rows[2].flight_number, "");
        assert_eq!(rows[2].destination, "");
        assert!(rows[2].identifier().is_none());
    }

    #[test]
    fn test_page_without_rows() {
        let parser = RowParser::new(&SelectorsConfig::default()).unwrap();
        assert!(parser.parse("<html><body><p>No flights</p></body></html>").is_empty());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let mut selectors = SelectorsConfig::default();
        selectors.gate = FieldSelector::new("[[invalid", 0);
        assert!(matches!(
            RowParser::new(&selectors),
            Err(AppError::Selector { .. })
        ));
    }
}
