//! Grid text tables.

use crate::models::{FlightEntry, Summary};
use crate::views::{display_headers, display_row};

/// Render rows as a boxed grid with a double rule under the header.
pub fn render_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().take(columns).enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let rule = |fill: char| -> String {
        let mut line = String::from("+");
        for w in &widths {
            line.extend(std::iter::repeat_n(fill, w + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };
    let line = |cells: &[String]| -> String {
        let mut out = String::from("|");
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let pad = w - cell.chars().count();
            out.push(' ');
            out.push_str(cell);
            out.extend(std::iter::repeat_n(' ', pad + 1));
            out.push('|');
        }
        out.push('\n');
        out
    };

    let mut out = rule('-');
    out.push_str(&line(headers));
    out.push_str(&rule('='));
    for row in rows {
        out.push_str(&line(row));
        out.push_str(&rule('-'));
    }
    out
}

/// Today's history as a grid.
pub fn render_history(flights: &[FlightEntry], now: i64) -> String {
    let rows: Vec<_> = flights.iter().map(|f| display_row(f, now)).collect();
    render_grid(&display_headers(), &rows)
}

/// Counts, then any flagged flights.
pub fn render_summary(summary: &Summary) -> String {
    let headers = vec![summary.category.to_string(), "Count".to_string()];
    let rows: Vec<_> = summary
        .count_rows()
        .into_iter()
        .map(|(label, count)| vec![label, count.to_string()])
        .collect();
    let mut out = render_grid(&headers, &rows);

    if summary.has_alerts() {
        let headers = vec![
            "Flight Number".to_string(),
            "Minutes Since Update".to_string(),
            "Status".to_string(),
        ];
        let rows: Vec<_> = summary
            .flagged
            .iter()
            .map(|f| {
                vec![
                    f.flight_number.clone(),
                    f.minutes_since_update.to_string(),
                    f.status.clone(),
                ]
            })
            .collect();
        out.push_str(&render_grid(&headers, &rows));
    }
    out
}
