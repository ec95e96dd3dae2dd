//! Test helpers for rma-auto integration tests
//!
//! - MockServer: scripted stand-in for the playout server
//! - Response builders for listings and layer status documents
//! - Catalog and worker-context setup on a temporary database

#![allow(dead_code)]

pub mod mock_server;

use std::sync::Arc;

use rma_auto::catalog::CatalogStore;
use rma_auto::workers::WorkerContext;
use rma_auto::SharedState;
use rma_common::AutomationConfig;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub use mock_server::MockServer;

/// `CLS` reply wrapping `lines`
pub fn listing_response(lines: &[String]) -> String {
    let mut response = String::from("200 CLS OK\r\n");
    for line in lines {
        response.push_str(line);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    response
}

/// One movie line at 25 fps
pub fn movie_line(path: &str, frames: u64) -> String {
    format!("\"{}\" MOVIE 1048576 20240115093000 {} 25/1", path, frames)
}

pub fn still_line(path: &str) -> String {
    format!("\"{}\" STILL 2048 20240115093000 0 0/1", path)
}

/// `INFO` reply; `None` means nothing loaded on the layer
pub fn info_response(layer: u16, file: Option<(&str, f64, f64)>) -> String {
    let foreground = match file {
        Some((path, current, total)) => format!(
            "<foreground><file><clip>0</clip><clip>{total}</clip><path>{path}</path>\
             <time>{current}</time><time>{total}</time></file><paused>false</paused></foreground>"
        ),
        None => "<foreground><producer>empty</producer></foreground>".to_string(),
    };
    format!(
        "201 INFO OK\r\n<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <channel><framerate>25</framerate><stage><layer><layer_{layer}>{foreground}</layer_{layer}></layer></stage></channel>\r\n"
    )
}

/// Config pointed at a mock server, with short timeouts
pub fn test_config(port: u16) -> AutomationConfig {
    let mut config = AutomationConfig::default();
    config.amcp.port = port;
    config.amcp.io_timeout_secs = 2;
    config.amcp.reconnect_delay_secs = 1;
    config.playback.stinger_hold_secs = 0;
    config.scheduler.empty_retry_secs = 1;
    config.refresher.retry_delay_secs = 0;
    config
}

pub async fn temp_store() -> (TempDir, CatalogStore) {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("db").join("media_cache.db"))
        .await
        .unwrap();
    (dir, store)
}

pub fn context(config: AutomationConfig, store: CatalogStore) -> WorkerContext {
    WorkerContext::new(
        Arc::new(config),
        store,
        Arc::new(SharedState::default()),
        CancellationToken::new(),
    )
}
