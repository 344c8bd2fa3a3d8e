//! Cost Command
//!
//! Usage:
//!   repodiagram cost <owner/repo> [--github-pat TOKEN]

use crate::cli::parse_repository;
use crate::cli::ui::Output;
use crate::config::Config;
use crate::server::build_pipeline;
use crate::types::{Credential, Result};

pub async fn run(config: &Config, target: &str, github_pat: Option<String>) -> Result<()> {
    let (owner, repo) = parse_repository(target)?;
    let pipeline = build_pipeline(config)?;
    let credential = Credential::from_optional(github_pat);

    let estimate = pipeline
        .estimate_cost(&owner, &repo, credential.as_ref())
        .await?;

    let output = Output::new();
    output.section(&format!("{}/{}", owner, repo));
    println!("  File tree tokens: {}", estimate.file_tree_tokens);
    println!("  README tokens:    {}", estimate.readme_tokens);
    output.success(&format!("Estimated cost: {}", estimate.formatted()));
    Ok(())
}
