pub mod config;
pub mod logging;

// Job data and persistence
pub mod cache;
pub mod model;
pub mod storage;
pub mod store;
pub mod url_model;

// Fetching
pub mod fetch;
pub mod http;
pub mod retry;
pub mod scraper;

// Output
pub mod packaging;
pub mod placement;

// Orchestration
pub mod control;
pub mod runner;
pub mod settings;
pub mod status_bus;
pub mod supervisor;
#[cfg(unix)]
pub mod remote;

pub mod proxy_check;
