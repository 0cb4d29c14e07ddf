//! Load, combine and filter.
//!
//! Each render pulls both sources through their caches, concatenates them and
//! applies the caller's hazard selection. A failed live fetch degrades to the
//! static table plus a warning; a failed static load fails the render.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::data::load_static;
use crate::feed::FeedSource;
use crate::logging::{log_filter, obj, v_str, warn, Domain, ProfileScope};
use crate::record::COL_HAZARDOUS;
use crate::table::Table;

/// Tri-state selection over the hazard flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HazardFilter {
    #[default]
    All,
    Yes,
    No,
}

impl HazardFilter {
    pub const OPTIONS: [HazardFilter; 3] = [HazardFilter::All, HazardFilter::Yes, HazardFilter::No];

    pub fn as_str(&self) -> &'static str {
        match self {
            HazardFilter::All => "All",
            HazardFilter::Yes => "Yes",
            HazardFilter::No => "No",
        }
    }

    /// Rows with a missing flag match neither `Yes` nor `No`.
    pub fn keeps(&self, hazardous: Option<bool>) -> bool {
        match self {
            HazardFilter::All => true,
            HazardFilter::Yes => hazardous == Some(true),
            HazardFilter::No => hazardous == Some(false),
        }
    }
}

impl fmt::Display for HazardFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HazardFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "All" | "all" => Ok(HazardFilter::All),
            "Yes" | "yes" => Ok(HazardFilter::Yes),
            "No" | "no" => Ok(HazardFilter::No),
            other => Err(anyhow!("unknown hazard filter {:?} (expected All, Yes or No)", other)),
        }
    }
}

pub fn combine(static_table: &Table, live: &Table) -> Table {
    static_table.concat(live)
}

pub fn apply_filter(table: &Table, filter: HazardFilter) -> Table {
    if filter == HazardFilter::All {
        return table.clone();
    }
    let Some(idx) = table.column_index(COL_HAZARDOUS) else {
        return table.filter_rows(|_| false);
    };
    table.filter_rows(|row| filter.keeps(row[idx].as_bool()))
}

/// Output of one render: the filtered table and how the sources fared.
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub filter: HazardFilter,
    pub table: Table,
    pub static_rows: usize,
    pub live_rows: usize,
    pub date: NaiveDate,
    /// Set when the live feed failed and the static table is shown alone.
    pub live_warning: Option<String>,
}

pub struct Pipeline {
    static_path: PathBuf,
    feed: Arc<dyn FeedSource>,
    static_cache: TtlCache<Arc<Table>>,
    live_cache: TtlCache<Arc<Table>>,
}

impl Pipeline {
    pub fn new(cfg: &Config, feed: Arc<dyn FeedSource>) -> Self {
        Self {
            static_path: PathBuf::from(&cfg.static_csv),
            feed,
            static_cache: TtlCache::new("static", cfg.cache_ttl()),
            live_cache: TtlCache::new("live", cfg.cache_ttl()).with_failure_ttl(cfg.feed_retry()),
        }
    }

    pub fn static_path(&self) -> &PathBuf {
        &self.static_path
    }

    pub async fn static_table(&self) -> Result<Arc<Table>> {
        let key = self.static_path.display().to_string();
        let path = self.static_path.clone();
        let (table, _) = self
            .static_cache
            .get_or_refresh(&key, || async move {
                let table = tokio::task::spawn_blocking(move || load_static(&path))
                    .await
                    .context("static load task")??;
                Ok(Arc::new(table))
            })
            .await?;
        Ok(table)
    }

    /// Live table for `date`; the date is the cache key so a new day refetches.
    pub async fn live_table(&self, date: NaiveDate) -> Result<Arc<Table>> {
        let key = date.to_string();
        let (table, _) = self
            .live_cache
            .get_or_refresh(&key, || async {
                let batch = self.feed.fetch(date).await?;
                Ok(Arc::new(Table::from_records(&batch.records)))
            })
            .await?;
        Ok(table)
    }

    pub async fn render(&self, filter: HazardFilter, date: NaiveDate) -> Result<DashboardData> {
        let _profile =
            ProfileScope::with_context(Domain::Filter, "render", &[("filter", v_str(filter.as_str()))]);
        let static_table = self.static_table().await?;

        let (live, live_warning) = match self.live_table(date).await {
            Ok(t) => (t, None),
            Err(err) => {
                let message = format!("Live feed unavailable, showing static data only: {:#}", err);
                warn(
                    Domain::Feed,
                    "feed_failed",
                    obj(&[("source", v_str("neows")), ("error", v_str(&format!("{:#}", err)))]),
                );
                (Arc::new(Table::with_schema()), Some(message))
            }
        };

        let combined = combine(&static_table, &live);
        let table = apply_filter(&combined, filter);
        log_filter(filter.as_str(), combined.len(), table.len());

        Ok(DashboardData {
            filter,
            table,
            static_rows: static_table.len(),
            live_rows: live.len(),
            date,
            live_warning,
        })
    }

    /// Drops both cached sources so the next render reloads them.
    pub async fn refresh(&self) {
        self.static_cache.invalidate().await;
        self.live_cache.invalidate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn flagged(flags: &[Option<bool>]) -> Table {
        let mut t = Table::new(vec!["id".to_string(), COL_HAZARDOUS.to_string()]);
        for (i, f) in flags.iter().enumerate() {
            t.push_row(vec![
                Cell::Text(i.to_string()),
                f.map(Cell::Bool).unwrap_or(Cell::Missing),
            ]);
        }
        t
    }

    #[test]
    fn all_is_a_no_op() {
        let t = flagged(&[Some(true), None, Some(false)]);
        assert_eq!(apply_filter(&t, HazardFilter::All), t);
    }

    #[test]
    fn yes_and_no_drop_missing_flags() {
        let t = flagged(&[Some(true), None, Some(false), Some(true)]);
        let yes = apply_filter(&t, HazardFilter::Yes);
        let no = apply_filter(&t, HazardFilter::No);
        assert_eq!(yes.len(), 2);
        assert_eq!(no.len(), 1);
        assert_eq!(no.rows[0][0], Cell::Text("2".to_string()));
    }

    #[test]
    fn yes_is_idempotent() {
        let t = flagged(&[Some(true), Some(false), None, Some(true)]);
        let once = apply_filter(&t, HazardFilter::Yes);
        let twice = apply_filter(&once, HazardFilter::Yes);
        assert_eq!(once, twice);
    }

    #[test]
    fn filter_keeps_values_and_never_grows() {
        let t = flagged(&[Some(false), Some(true), Some(false)]);
        for f in HazardFilter::OPTIONS {
            let out = apply_filter(&t, f);
            assert!(out.len() <= t.len());
            for row in &out.rows {
                assert!(t.rows.contains(row));
            }
        }
    }

    #[test]
    fn missing_hazard_column_keeps_nothing_for_yes() {
        let t = Table::new(vec!["id".to_string()]);
        assert!(apply_filter(&t, HazardFilter::Yes).is_empty());
    }

    #[test]
    fn parse_filter_options() {
        assert_eq!("Yes".parse::<HazardFilter>().unwrap(), HazardFilter::Yes);
        assert_eq!("no".parse::<HazardFilter>().unwrap(), HazardFilter::No);
        assert!("maybe".parse::<HazardFilter>().is_err());
        assert_eq!(HazardFilter::default(), HazardFilter::All);
    }
}
