use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::data::parse_number;
use crate::record::ObservationRecord;

pub mod neows;

pub use neows::NeoWsClient;

/// Source of one day's near-Earth objects.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<FeedBatch>;
}

/// Flattened records plus the objects that could not be mapped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    pub records: Vec<ObservationRecord>,
    pub skipped: Vec<SkipReason>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The object carried no close-approach entries.
    NoCloseApproach { id: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCloseApproach { id } => write!(f, "no close approach data for {}", id),
        }
    }
}

// NeoWs feed response types

#[derive(Deserialize, Debug, Clone)]
pub struct FeedResponse {
    /// Keyed by calendar date; BTreeMap keeps dates ascending.
    pub near_earth_objects: BTreeMap<String, Vec<RawNeo>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawNeo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub absolute_magnitude_h: Option<f64>,
    pub estimated_diameter: RawDiameters,
    pub is_potentially_hazardous_asteroid: bool,
    #[serde(default)]
    pub close_approach_data: Vec<RawApproach>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawDiameters {
    pub kilometers: RawDiameterRange,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawDiameterRange {
    pub estimated_diameter_min: f64,
    pub estimated_diameter_max: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawApproach {
    pub close_approach_date: String,
    pub relative_velocity: RawVelocity,
    pub miss_distance: RawMissDistance,
    pub orbiting_body: String,
}

// Upstream sends these as decimal strings.
#[derive(Deserialize, Debug, Clone)]
pub struct RawVelocity {
    pub kilometers_per_hour: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawMissDistance {
    pub kilometers: String,
}

impl RawNeo {
    /// Maps one object using its first close approach only.
    pub fn to_record(&self) -> Result<ObservationRecord, SkipReason> {
        let approach = self
            .close_approach_data
            .first()
            .ok_or_else(|| SkipReason::NoCloseApproach {
                id: self.id.clone(),
            })?;
        let km = &self.estimated_diameter.kilometers;
        Ok(ObservationRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            absolute_magnitude_h: self.absolute_magnitude_h,
            estimated_diameter_min_km: Some(km.estimated_diameter_min),
            estimated_diameter_max_km: Some(km.estimated_diameter_max),
            is_potentially_hazardous_asteroid: Some(self.is_potentially_hazardous_asteroid),
            close_approach_date: approach.close_approach_date.clone(),
            relative_velocity_kmph: parse_number(&approach.relative_velocity.kilometers_per_hour),
            miss_distance_km: parse_number(&approach.miss_distance.kilometers),
            orbiting_body: approach.orbiting_body.clone(),
        })
    }
}

impl FeedResponse {
    /// One record per object, dates ascending, objects in response order.
    pub fn flatten(&self) -> FeedBatch {
        let mut batch = FeedBatch::default();
        for neo in self.near_earth_objects.values().flatten() {
            match neo.to_record() {
                Ok(rec) => batch.records.push(rec),
                Err(skip) => batch.skipped.push(skip),
            }
        }
        batch
    }
}
