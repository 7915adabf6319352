//! Pre-built binary packages from the CI.
//!
//! The GitLab API gives the latest successful pipeline; its artifacts are
//! unpacked into `<root>/cache` by the `get-cache-from-ci.sh` helper.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CiConfig;
use crate::exec::CommandSpec;
use crate::Toolkit;

#[derive(Debug, Deserialize)]
struct Pipeline {
    id: u64,
}

pub fn pipelines_url(ci: &CiConfig) -> String {
    format!(
        "{}/api/v4/projects/{}/pipelines?scope=finished&status=success",
        ci.url.trim_end_matches('/'),
        ci.project_id
    )
}

/// Id of the first pipeline in a GitLab pipelines listing.
pub fn parse_latest_pipeline_id(body: &str) -> Result<u64> {
    let pipelines: Vec<Pipeline> =
        serde_json::from_str(body).context("parsing pipeline list from the GitLab API")?;
    match pipelines.first() {
        Some(pipeline) if pipeline.id != 0 => Ok(pipeline.id),
        _ => bail!("Could not find the latest successful pipeline"),
    }
}

pub fn latest_successful_pipeline(ci: &CiConfig) -> Result<u64> {
    if ci.url.is_empty() || ci.project_id.is_empty() {
        bail!("'ci.url' and 'ci.project_id' must be set in config.toml");
    }
    let url = pipelines_url(ci);
    debug!("Requesting pipeline status from {url}");
    let body = reqwest::blocking::get(&url)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .with_context(|| format!("requesting pipeline status from '{url}'"))?;
    debug!("Received: {body}");
    parse_latest_pipeline_id(&body)
}

pub fn cache_helper(repo_root: &Path) -> PathBuf {
    repo_root.join("toolkit/helpers/get-cache-from-ci.sh")
}

/// Download the CI binary package cache into an absent `<root>/cache`.
pub fn fetch_cache(toolkit: &Toolkit) -> Result<()> {
    let repo_root = toolkit.repo_root();
    let cache = repo_root.join("cache");
    if cache
        .try_exists()
        .with_context(|| format!("checking '{}'", cache.display()))?
    {
        bail!("Remove the '{}' folder before proceeding", cache.display());
    }

    let ci = &toolkit.config().ci;
    if ci.artifacts.is_empty() {
        bail!("'ci.artifacts' must be set in config.toml");
    }
    let pipeline = latest_successful_pipeline(ci)?;
    info!("Retrieving binary packages from pipeline {pipeline}");

    let helper = cache_helper(repo_root);
    let spec = CommandSpec::new(helper.display().to_string())
        .arg(format!("{}/{pipeline}", ci.artifacts.trim_end_matches('/')))
        .current_dir(repo_root);
    toolkit
        .executor()
        .execute_checked(&spec)
        .with_context(|| format!("running '{}'", helper.display()))
}
