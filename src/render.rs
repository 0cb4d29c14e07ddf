//! Server-side HTML for the dashboard page.

use serde_json::Value;

use crate::charts::ChartSpec;
use crate::pipeline::{DashboardData, HazardFilter};
use crate::table::Table;

pub const CSV_FILENAME: &str = "combined_asteroid_data.csv";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON safe to inline in a `<script>` element.
fn script_json(value: &Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

pub fn render_table(table: &Table) -> String {
    let mut html = String::from("<table class=\"data\">\n<thead><tr>");
    for col in &table.columns {
        html.push_str(&format!("<th>{}</th>", escape_html(col)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", escape_html(&cell.to_string())));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

fn render_filter_select(selected: HazardFilter) -> String {
    let options: Vec<String> = HazardFilter::OPTIONS
        .iter()
        .map(|f| {
            format!(
                r#"<option value="{v}"{sel}>{v}</option>"#,
                v = f.as_str(),
                sel = if *f == selected { " selected" } else { "" },
            )
        })
        .collect();
    format!(
        r#"<form method="get" action="/">
  <label for="hazardous">Show only hazardous asteroids?</label>
  <select id="hazardous" name="hazardous" onchange="this.form.submit()">
    {}
  </select>
</form>"#,
        options.join("\n    ")
    )
}

pub fn render_page(data: &DashboardData, charts: &[ChartSpec]) -> String {
    let banner = match &data.live_warning {
        Some(msg) => format!(r#"<div class="warning" role="alert">{}</div>"#, escape_html(msg)),
        None => String::new(),
    };
    let chart_divs: Vec<String> = charts
        .iter()
        .map(|c| format!(r#"<div class="chart" id="chart-{}"></div>"#, c.id))
        .collect();
    let figures = Value::Array(
        charts
            .iter()
            .map(|c| serde_json::json!({"id": format!("chart-{}", c.id), "figure": c.to_plotly()}))
            .collect(),
    );

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Asteroid Data Dashboard</title>
<script src="https://cdn.plot.ly/plotly-2.35.2.min.js"></script>
<style>
  body {{ font-family: -apple-system, BlinkMacSystemFont, sans-serif; margin: 0; display: flex; }}
  aside {{ width: 260px; padding: 1.5rem; background: #f1f5f9; min-height: 100vh; }}
  main {{ flex: 1; padding: 1.5rem; overflow-x: auto; }}
  .warning {{ background: #fef3c7; border: 1px solid #f59e0b; padding: .75rem 1rem; margin-bottom: 1rem; }}
  .chart {{ width: 100%; height: 450px; }}
  table.data {{ border-collapse: collapse; font-size: .85rem; }}
  table.data th, table.data td {{ border: 1px solid #e2e8f0; padding: .25rem .5rem; text-align: left; }}
  .meta {{ color: #64748b; font-size: .85rem; }}
</style>
</head>
<body>
<aside>
<h2>Filter Options</h2>
{select}
</aside>
<main>
<h1>Asteroid Insights Dashboard</h1>
<p>Static + Real-Time NASA Asteroid Data Visualized</p>
{banner}
<p class="meta">{static_rows} static rows, {live_rows} live rows for {date}; showing {shown} ({filter})</p>
<h3>Visualizations</h3>
{charts}
<h3>Combined Asteroid Data</h3>
{table}
<p><a href="/download?hazardous={filter}" download="{filename}">Download CSV</a></p>
</main>
<script type="application/json" id="figures">{figures}</script>
<script>
  JSON.parse(document.getElementById('figures').textContent).forEach(function (f) {{
    Plotly.newPlot(f.id, f.figure.data, f.figure.layout, {{responsive: true}});
  }});
</script>
</body>
</html>
"##,
        select = render_filter_select(data.filter),
        banner = banner,
        static_rows = data.static_rows,
        live_rows = data.live_rows,
        date = data.date,
        shown = data.table.len(),
        filter = data.filter.as_str(),
        charts = chart_divs.join("\n"),
        table = render_table(&data.table),
        filename = CSV_FILENAME,
        figures = script_json(&figures),
    )
}
