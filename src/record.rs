use serde::{Deserialize, Serialize};

use crate::table::Cell;

pub const COL_ID: &str = "id";
pub const COL_NAME: &str = "name";
pub const COL_MAGNITUDE: &str = "absolute_magnitude_h";
pub const COL_DIAMETER_MIN: &str = "estimated_diameter_min_km";
pub const COL_DIAMETER_MAX: &str = "estimated_diameter_max_km";
pub const COL_HAZARDOUS: &str = "is_potentially_hazardous_asteroid";
pub const COL_APPROACH_DATE: &str = "close_approach_date";
pub const COL_VELOCITY: &str = "relative_velocity_kmph";
pub const COL_MISS_DISTANCE: &str = "miss_distance_km";
pub const COL_ORBITING_BODY: &str = "orbiting_body";

/// Canonical column order of an observation row.
pub const SCHEMA: [&str; 10] = [
    COL_ID,
    COL_NAME,
    COL_MAGNITUDE,
    COL_DIAMETER_MIN,
    COL_DIAMETER_MAX,
    COL_HAZARDOUS,
    COL_APPROACH_DATE,
    COL_VELOCITY,
    COL_MISS_DISTANCE,
    COL_ORBITING_BODY,
];

/// Columns coerced to numbers on load; bad text becomes a missing value.
pub const NUMERIC_COLUMNS: [&str; 4] = [
    COL_VELOCITY,
    COL_MISS_DISTANCE,
    COL_DIAMETER_MIN,
    COL_DIAMETER_MAX,
];

/// Columns kept as text even when they look numeric.
pub const TEXT_COLUMNS: [&str; 4] = [COL_ID, COL_NAME, COL_APPROACH_DATE, COL_ORBITING_BODY];

/// One near-Earth object pass, flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: String,
    pub name: String,
    pub absolute_magnitude_h: Option<f64>,
    pub estimated_diameter_min_km: Option<f64>,
    pub estimated_diameter_max_km: Option<f64>,
    pub is_potentially_hazardous_asteroid: Option<bool>,
    pub close_approach_date: String,
    pub relative_velocity_kmph: Option<f64>,
    pub miss_distance_km: Option<f64>,
    pub orbiting_body: String,
}

impl ObservationRecord {
    /// Cells in `SCHEMA` order.
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.id.clone()),
            Cell::Text(self.name.clone()),
            Cell::from_opt_num(self.absolute_magnitude_h),
            Cell::from_opt_num(self.estimated_diameter_min_km),
            Cell::from_opt_num(self.estimated_diameter_max_km),
            self.is_potentially_hazardous_asteroid
                .map(Cell::Bool)
                .unwrap_or(Cell::Missing),
            Cell::Text(self.close_approach_date.clone()),
            Cell::from_opt_num(self.relative_velocity_kmph),
            Cell::from_opt_num(self.miss_distance_km),
            Cell::Text(self.orbiting_body.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_follows_schema_order() {
        let rec = ObservationRecord {
            id: "3542519".to_string(),
            name: "(2010 PK9)".to_string(),
            absolute_magnitude_h: Some(21.9),
            estimated_diameter_min_km: Some(0.1),
            estimated_diameter_max_km: Some(0.25),
            is_potentially_hazardous_asteroid: None,
            close_approach_date: "2024-01-01".to_string(),
            relative_velocity_kmph: Some(48_000.5),
            miss_distance_km: None,
            orbiting_body: "Earth".to_string(),
        };
        let row = rec.to_row();
        assert_eq!(row.len(), SCHEMA.len());
        assert_eq!(row[0], Cell::Text("3542519".to_string()));
        assert_eq!(row[4], Cell::Number(0.25));
        assert_eq!(row[5], Cell::Missing);
        assert_eq!(row[8], Cell::Missing);
        assert_eq!(row[9], Cell::Text("Earth".to_string()));
    }
}
