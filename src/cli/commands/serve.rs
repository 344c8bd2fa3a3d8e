//! Serve Command
//!
//! Usage:
//!   repodiagram serve [--bind 0.0.0.0:8000]

use crate::config::Config;
use crate::server;
use crate::types::Result;

pub async fn run(config: &Config, bind: Option<&str>) -> Result<()> {
    server::serve(config, bind).await
}
