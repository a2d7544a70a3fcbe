//! HTML renderings for the `/dump` page and the status widget.

use crate::models::{Category, FlightEntry, Summary};
use crate::views::{display_headers, display_row};

const TABLE_STYLE: &str = "<style> table { border-collapse: collapse; } \
th, td { border: 1px solid #ddd; padding: 8px; } \
tr:nth-child(even) { background-color: #f2f2f2; } </style>";

/// Seconds between widget reloads.
pub const WIDGET_REFRESH_SECS: u64 = 30;

/// Escape text for element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table>\n<thead>\n<tr>");
    for h in headers {
        out.push_str(&format!("<th>{}</th>", escape(h)));
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", escape(cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// One category: heading, count table, then the day's history.
pub fn render_category(summary: &Summary, flights: &[FlightEntry], now: i64) -> String {
    let counts: Vec<_> = summary
        .count_rows()
        .into_iter()
        .map(|(label, count)| vec![label, count.to_string()])
        .collect();
    let history: Vec<_> = flights.iter().map(|f| display_row(f, now)).collect();

    format!(
        "<h2>Flight Information ({category}) - {day}</h2>\n\
         <p>Flight history for {category}:</p>\n\
         {style}\n\
         {summary}<br>\n\
         {history}",
        category = summary.category,
        day = summary.day,
        style = TABLE_STYLE,
        summary = render_table(&[summary.category.to_string(), "Count".to_string()], &counts),
        history = render_table(&display_headers(), &history),
    )
}

/// Full page for `/dump`.
pub fn render_dump(sections: &[(Summary, Vec<FlightEntry>)], now: i64) -> String {
    let mut html = String::from(
        "<html><head><title>Flight Information</title></head><body>\n<h1>Flight Information</h1>\n",
    );
    for (summary, flights) in sections {
        html.push_str(&render_category(summary, flights, now));
    }
    html.push_str("</body></html>\n");
    html
}

fn widget_section(summary: &Summary) -> String {
    let title = match summary.category {
        Category::Arrivals => "Arrivals",
        Category::Departures => "Departures",
    };
    let mut values = String::new();
    for (label, count) in summary.count_rows() {
        values.push_str(&format!(
            "    <div class=\"value\">{}: {}</div>\n",
            escape(&label),
            count
        ));
    }
    if summary.has_alerts() {
        values.push_str(&format!(
            "    <div class=\"value alert\">Stale: {}</div>\n",
            summary.flagged.len()
        ));
    }
    format!("  <div class=\"section\">\n    <div class=\"title\">{title}</div>\n{values}  </div>\n")
}

/// Compact auto-refreshing counts page for `/`.
pub fn render_widget(summaries: &[Summary]) -> String {
    let sections: String = summaries.iter().map(widget_section).collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Flight Status Summary</title>
  <style>
    body {{ font-family: sans-serif; margin: 0; padding: 0; width: 400px; height: 300px; display: flex; }}
    .section {{ display: flex; flex-direction: column; align-items: center; margin: 10px; flex: 1; }}
    .title {{ font-weight: bold; font-size: 22px; }}
    .value {{ font-size: 20px; margin-top: 5px; }}
    .alert {{ color: #c00; }}
  </style>
</head>
<body>
{sections}  <script>
    setTimeout(function() {{ window.location.reload(); }}, {refresh_ms});
  </script>
</body>
</html>
"#,
        refresh_ms = WIDGET_REFRESH_SECS * 1000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayBucket, FlaggedFlight, FlightRecord};

    fn summary(category: Category) -> Summary {
        let mut s = Summary::empty(category, DayBucket::from_timestamp(1_716_962_400));
        s.completed = 3;
        s.scheduled = 7;
        s
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"A&B\"</b>"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_category_has_both_tables() {
        let s = summary(Category::Arrivals);
        let flight = FlightEntry::from_record(&FlightRecord::new("QF<1>", "Open"), s.day);
        let html = render_category(&s, &[flight], 1_716_962_400);

        assert_eq!(html.matches("<table>").count(), 2);
        assert!(html.contains("<td>Landed</td><td>3</td>"));
        assert!(html.contains("<th>Time Delta (min)</th>"));
        assert!(html.contains("QF&lt;1&gt;"));
        assert!(html.contains("border-collapse"));
    }

    #[test]
    fn test_widget_counts_and_refresh() {
        let mut departures = summary(Category::Departures);
        departures.flagged.push(FlaggedFlight {
            flight_number: "VA7".into(),
            minutes_since_update: 80,
            status: "Boarding".into(),
        });
        let html = render_widget(&[departures, summary(Category::Arrivals)]);

        assert!(html.contains("Departed: 3"));
        assert!(html.contains("Landed: 3"));
        assert!(html.contains("Scheduled: 7"));
        assert!(html.contains("Stale: 1"));
        assert!(html.contains("30000"));
    }
}
