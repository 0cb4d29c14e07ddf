//! Near-Earth asteroid dashboard: a static CSV dataset merged with the NASA
//! NeoWs daily feed, filtered by hazard flag and served as charts, a table
//! and a CSV download.

pub mod cache;
pub mod charts;
pub mod config;
pub mod data;
pub mod feed;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod server;
pub mod table;
