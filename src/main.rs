use anyhow::Result;
use std::sync::Arc;

use neowatch::config::Config;
use neowatch::feed::NeoWsClient;
use neowatch::logging::{info, obj, v_bool, v_num, v_str, Domain};
use neowatch::pipeline::Pipeline;
use neowatch::server::{run_server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    info(
        Domain::System,
        "config",
        obj(&[
            ("static_csv", v_str(&cfg.static_csv)),
            ("feed_url", v_str(&cfg.feed_url)),
            ("api_key_set", v_bool(!cfg.api_key.is_empty())),
            ("cache_ttl_secs", v_num(cfg.cache_ttl_secs as f64)),
            ("http_timeout_secs", v_num(cfg.http_timeout_secs as f64)),
            ("feed_retry_secs", v_num(cfg.feed_retry_secs as f64)),
        ]),
    );

    let feed = Arc::new(NeoWsClient::new(&cfg)?);
    let pipeline = Arc::new(Pipeline::new(&cfg, feed));
    run_server(cfg, AppState::new(pipeline)).await
}
