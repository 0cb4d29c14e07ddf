use neowatch::data::{analyze_static, default_manifest_path, validate_schema};
use neowatch::record::SCHEMA;
use serde_json::json;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var("NEO_STATIC_CSV").ok())
        .unwrap_or_else(|| "static_asteroids_data.csv".to_string());
    let path = PathBuf::from(path);

    let now_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let schema = match validate_schema(&path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("schema check failed: {:#}", err);
            std::process::exit(1);
        }
    };

    if !schema.ok {
        eprintln!("{}", schema.message);
        eprintln!("expected columns: {:?}", SCHEMA);
        std::process::exit(2);
    }

    let (manifest, report) = match analyze_static(&path, now_ts) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {:#}", err);
            std::process::exit(3);
        }
    };

    let out_path = default_manifest_path(&path);
    let payload = json!({
        "manifest": manifest,
        "report": report
    });
    let body = match serde_json::to_string_pretty(&payload) {
        Ok(b) => b,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(4);
        }
    };
    if let Err(err) = fs::write(&out_path, body) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!(
        "wrote manifest {} ({} rows, {} coerced cells)",
        out_path.display(),
        report.rows,
        report.coerced_cells
    );
}
