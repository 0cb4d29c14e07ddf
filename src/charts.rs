//! Chart specifications over the filtered table.
//!
//! Every chart is a direct projection of the rows it is given and serializes
//! to Plotly's `{data, layout}` shape so the page can draw it as-is.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::record::{COL_DIAMETER_MAX, COL_HAZARDOUS, COL_MISS_DISTANCE, COL_NAME, COL_ORBITING_BODY, COL_VELOCITY};
use crate::table::{Cell, Table};

pub const HISTOGRAM_BINS: usize = 40;

const LABEL_DIAMETER: &str = "Max Estimated Diameter (km)";
const LABEL_VELOCITY: &str = "Relative Velocity (km/h)";
const LABEL_MISS: &str = "Miss Distance (km)";
const LEGEND_HAZARD: &str = "Hazardous?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Scatter,
    Bar,
    Histogram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<Value>,
    pub y: Vec<f64>,
    /// Hover labels, one per point; empty for aggregated traces.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub kind: ChartKind,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub legend_title: Option<&'static str>,
    pub traces: Vec<Trace>,
}

impl ChartSpec {
    pub fn point_count(&self) -> usize {
        self.traces.iter().map(|t| t.y.len()).sum()
    }

    /// Plotly figure: `{"data": [...], "layout": {...}}`.
    pub fn to_plotly(&self) -> Value {
        let data: Vec<Value> = self
            .traces
            .iter()
            .map(|t| {
                let mut trace = match self.kind {
                    ChartKind::Scatter => json!({"type": "scatter", "mode": "markers"}),
                    ChartKind::Bar | ChartKind::Histogram => json!({"type": "bar"}),
                };
                trace["name"] = json!(t.name);
                trace["x"] = json!(t.x);
                trace["y"] = json!(t.y);
                if !t.text.is_empty() {
                    trace["text"] = json!(t.text);
                }
                trace
            })
            .collect();

        let mut layout = json!({
            "title": {"text": self.title},
            "xaxis": {"title": {"text": self.x_label}},
            "yaxis": {"title": {"text": self.y_label}},
        });
        if let Some(legend) = self.legend_title {
            layout["legend"] = json!({"title": {"text": legend}});
        }
        if self.kind == ChartKind::Histogram {
            layout["barmode"] = json!("stack");
            layout["bargap"] = json!(0);
        }
        json!({"data": data, "layout": layout})
    }
}

/// Legend label of a hazard cell.
pub fn hazard_group(cell: &Cell) -> &'static str {
    match cell.as_bool() {
        Some(true) => "True",
        Some(false) => "False",
        None => "Unknown",
    }
}

fn hazard_order(group: &str) -> u8 {
    match group {
        "False" => 0,
        "True" => 1,
        _ => 2,
    }
}

fn scatter(
    table: &Table,
    id: &'static str,
    title: &'static str,
    (x_col, x_label): (&str, &'static str),
    (y_col, y_label): (&str, &'static str),
) -> ChartSpec {
    let mut groups: BTreeMap<(u8, &'static str), Trace> = BTreeMap::new();
    let xi = table.column_index(x_col);
    let yi = table.column_index(y_col);
    let hi = table.column_index(COL_HAZARDOUS);
    let ni = table.column_index(COL_NAME);

    if let (Some(xi), Some(yi)) = (xi, yi) {
        for row in &table.rows {
            let (Some(x), Some(y)) = (row[xi].as_f64(), row[yi].as_f64()) else {
                continue;
            };
            let group = hi.map(|i| hazard_group(&row[i])).unwrap_or("Unknown");
            let trace = groups.entry((hazard_order(group), group)).or_insert_with(|| Trace {
                name: group.to_string(),
                x: Vec::new(),
                y: Vec::new(),
                text: Vec::new(),
            });
            trace.x.push(json!(x));
            trace.y.push(y);
            trace.text.push(ni.map(|i| row[i].to_string()).unwrap_or_default());
        }
    }

    ChartSpec {
        id,
        title,
        kind: ChartKind::Scatter,
        x_label,
        y_label,
        legend_title: Some(LEGEND_HAZARD),
        traces: groups.into_values().collect(),
    }
}

pub fn diameter_vs_velocity(table: &Table) -> ChartSpec {
    scatter(
        table,
        "diameter-velocity",
        "Estimated Diameter vs Relative Velocity",
        (COL_DIAMETER_MAX, LABEL_DIAMETER),
        (COL_VELOCITY, LABEL_VELOCITY),
    )
}

pub fn miss_distance_vs_velocity(table: &Table) -> ChartSpec {
    scatter(
        table,
        "miss-velocity",
        "Miss Distance vs Velocity",
        (COL_MISS_DISTANCE, LABEL_MISS),
        (COL_VELOCITY, LABEL_VELOCITY),
    )
}

/// Row counts per orbiting body, descending by count then name.
pub fn orbiting_body_counts(table: &Table) -> Vec<(String, u64)> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for cell in table.column(COL_ORBITING_BODY) {
        if cell.is_missing() {
            continue;
        }
        *counts.entry(cell.to_string()).or_default() += 1;
    }
    let mut out: Vec<(String, u64)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

pub fn count_by_orbiting_body(table: &Table) -> ChartSpec {
    // One trace per body so each bar gets its own colour.
    let traces = orbiting_body_counts(table)
        .into_iter()
        .map(|(body, n)| Trace {
            name: body.clone(),
            x: vec![json!(body)],
            y: vec![n as f64],
            text: Vec::new(),
        })
        .collect();
    ChartSpec {
        id: "orbiting-body",
        title: "Asteroid Count by Orbiting Body",
        kind: ChartKind::Bar,
        x_label: "Orbiting Body",
        y_label: "Asteroid Count",
        legend_title: Some("Orbiting Body"),
        traces,
    }
}

/// Fixed-width binning into exactly `HISTOGRAM_BINS` bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins {
    pub start: f64,
    pub width: f64,
}

impl Bins {
    /// Range of the given values; one distinct value is widened by 0.5 each
    /// side and no values fall back to [0, 1].
    pub fn covering(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if values.is_empty() {
            (0.0, 1.0)
        } else if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        Self {
            start: lo,
            width: (hi - lo) / HISTOGRAM_BINS as f64,
        }
    }

    /// Bin index; the range maximum lands in the last bin.
    pub fn index(&self, v: f64) -> usize {
        let i = ((v - self.start) / self.width).floor();
        if i <= 0.0 {
            0
        } else {
            (i as usize).min(HISTOGRAM_BINS - 1)
        }
    }

    pub fn centers(&self) -> Vec<f64> {
        (0..HISTOGRAM_BINS)
            .map(|i| self.start + self.width * (i as f64 + 0.5))
            .collect()
    }
}

pub fn diameter_histogram(table: &Table) -> ChartSpec {
    let di = table.column_index(COL_DIAMETER_MAX);
    let hi = table.column_index(COL_HAZARDOUS);

    let points: Vec<(f64, &'static str)> = match di {
        Some(di) => table
            .rows
            .iter()
            .filter_map(|row| {
                row[di]
                    .as_f64()
                    .map(|v| (v, hi.map(|i| hazard_group(&row[i])).unwrap_or("Unknown")))
            })
            .collect(),
        None => Vec::new(),
    };
    let values: Vec<f64> = points.iter().map(|(v, _)| *v).collect();
    let bins = Bins::covering(&values);
    let centers: Vec<Value> = bins.centers().into_iter().map(|c| json!(c)).collect();

    let mut groups: BTreeMap<(u8, &'static str), Vec<f64>> = BTreeMap::new();
    for (v, group) in points {
        let counts = groups
            .entry((hazard_order(group), group))
            .or_insert_with(|| vec![0.0; HISTOGRAM_BINS]);
        counts[bins.index(v)] += 1.0;
    }

    let traces = if groups.is_empty() {
        vec![Trace {
            name: "count".to_string(),
            x: centers,
            y: vec![0.0; HISTOGRAM_BINS],
            text: Vec::new(),
        }]
    } else {
        groups
            .into_iter()
            .map(|((_, group), counts)| Trace {
                name: group.to_string(),
                x: centers.clone(),
                y: counts,
                text: Vec::new(),
            })
            .collect()
    };

    ChartSpec {
        id: "diameter-histogram",
        title: "Distribution of Max Estimated Diameter (km)",
        kind: ChartKind::Histogram,
        x_label: LABEL_DIAMETER,
        y_label: "count",
        legend_title: Some(LEGEND_HAZARD),
        traces,
    }
}

/// The four dashboard charts in page order.
pub fn build_charts(table: &Table) -> Vec<ChartSpec> {
    vec![
        diameter_vs_velocity(table),
        count_by_orbiting_body(table),
        diameter_histogram(table),
        miss_distance_vs_velocity(table),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ObservationRecord;

    fn rec(id: &str, dmax: Option<f64>, vel: Option<f64>, hazard: Option<bool>, body: &str) -> ObservationRecord {
        ObservationRecord {
            id: id.to_string(),
            name: format!("({})", id),
            absolute_magnitude_h: None,
            estimated_diameter_min_km: dmax.map(|d| d / 2.0),
            estimated_diameter_max_km: dmax,
            is_potentially_hazardous_asteroid: hazard,
            close_approach_date: "2024-01-01".to_string(),
            relative_velocity_kmph: vel,
            miss_distance_km: Some(1000.0),
            orbiting_body: body.to_string(),
        }
    }

    #[test]
    fn histogram_has_forty_bins_for_empty_table() {
        let chart = diameter_histogram(&Table::with_schema());
        assert_eq!(chart.traces.len(), 1);
        assert_eq!(chart.traces[0].x.len(), HISTOGRAM_BINS);
        assert!(chart.traces[0].y.iter().all(|c| *c == 0.0));
    }

    #[test]
    fn histogram_stacks_by_hazard_and_counts_every_value() {
        let t = Table::from_records(&[
            rec("a", Some(0.1), None, Some(true), "Earth"),
            rec("b", Some(0.5), None, Some(false), "Earth"),
            rec("c", Some(1.0), None, Some(false), "Earth"),
            rec("d", None, None, Some(false), "Earth"),
        ]);
        let chart = diameter_histogram(&t);
        assert_eq!(chart.traces.len(), 2);
        assert_eq!(chart.traces[0].name, "False");
        for trace in &chart.traces {
            assert_eq!(trace.y.len(), HISTOGRAM_BINS);
        }
        let total: f64 = chart.traces.iter().flat_map(|t| t.y.iter()).sum();
        assert_eq!(total, 3.0);
        assert_eq!(chart.traces[0].y[HISTOGRAM_BINS - 1], 1.0);
        assert_eq!(chart.traces[1].y[0], 1.0);
    }

    #[test]
    fn single_value_gets_a_unit_range() {
        let bins = Bins::covering(&[2.0, 2.0]);
        assert_eq!(bins.start, 1.5);
        assert_eq!(bins.index(1.5), 0);
        assert_eq!(bins.index(2.5), HISTOGRAM_BINS - 1);
    }

    #[test]
    fn scatter_skips_missing_coordinates() {
        let t = Table::from_records(&[
            rec("a", Some(0.1), Some(100.0), Some(true), "Earth"),
            rec("b", Some(0.2), None, Some(true), "Earth"),
            rec("c", Some(0.3), Some(300.0), None, "Earth"),
        ]);
        let chart = diameter_vs_velocity(&t);
        assert_eq!(chart.point_count(), 2);
        let names: Vec<&str> = chart.traces.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["True", "Unknown"]);
        assert_eq!(chart.traces[0].text, vec!["(a)".to_string()]);
    }

    #[test]
    fn bar_counts_descend_then_by_name() {
        let t = Table::from_records(&[
            rec("a", None, None, None, "Mars"),
            rec("b", None, None, None, "Earth"),
            rec("c", None, None, None, "Venus"),
            rec("d", None, None, None, "Earth"),
        ]);
        let counts = orbiting_body_counts(&t);
        assert_eq!(
            counts,
            vec![("Earth".to_string(), 2), ("Mars".to_string(), 1), ("Venus".to_string(), 1)]
        );
        assert_eq!(count_by_orbiting_body(&t).traces.len(), 3);
    }

    #[test]
    fn plotly_histogram_is_stacked() {
        let fig = diameter_histogram(&Table::with_schema()).to_plotly();
        assert_eq!(fig["layout"]["barmode"], "stack");
        assert_eq!(fig["data"][0]["type"], "bar");
        assert_eq!(build_charts(&Table::with_schema()).len(), 4);
    }
}
