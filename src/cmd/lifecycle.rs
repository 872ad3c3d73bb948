//! Lifecycle commands: `plan`, `create`, `read`, `update`, `delete`, `data`.

use anyhow::{Context, Result};
use script_bridge::config::{ResolvedScript, ScriptToml};
use script_bridge::resource::{ScriptDataSource, ScriptResource};
use script_bridge::script::Lifecycle;
use serde_json::json;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::super::Cli;
use super::state::{display_json, load_state, print_json, remove_state, require_state, save_state};

/// Load, validate and resolve the configuration for this OS.
pub fn load_config(path: &Path) -> Result<ResolvedScript> {
    let toml = ScriptToml::load(path)?;
    for warning in toml.validate() {
        tracing::warn!("{}", warning);
    }
    toml.resolve()
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

pub async fn cmd_lifecycle(cli: &Cli, phase: Lifecycle, cancel: &CancellationToken) -> Result<()> {
    let resource = ScriptResource::new(load_config(&cli.config)?);
    let prior = load_state(&cli.state)?;
    tracing::info!(phase = %phase, state = %cli.state.display(), "running");

    match phase {
        Lifecycle::Plan => {
            let plan = resource
                .plan(prior.as_ref(), cancel)
                .await
                .context("Plan failed")?;
            print_json(&json!({
                "requires_change": plan.requires_change,
                "planned": display_json(&plan.planned)?,
            }))?;
        }
        Lifecycle::Create => {
            if prior.is_some() {
                tracing::warn!(
                    "State file {} already exists and will be replaced",
                    cli.state.display()
                );
            }
            let output = resource.create(cancel).await.context("Create failed")?;
            save_state(&cli.state, &output)?;
            print_json(&display_json(&output)?)?;
        }
        Lifecycle::Read => {
            let prior = require_state(prior, &cli.state)?;
            let outcome = resource.read(&prior, cancel).await.context("Read failed")?;
            if outcome.drift_detected {
                tracing::warn!("Resource has drifted from recorded state; state refreshed");
            }
            save_state(&cli.state, &outcome.output)?;
            print_json(&display_json(&outcome.output)?)?;
        }
        Lifecycle::Update => {
            let prior = require_state(prior, &cli.state)?;
            let output = resource.update(&prior, cancel).await.context("Update failed")?;
            save_state(&cli.state, &output)?;
            print_json(&display_json(&output)?)?;
        }
        Lifecycle::Delete => {
            let prior = require_state(prior, &cli.state)?;
            resource.delete(&prior, cancel).await.context("Delete failed")?;
            remove_state(&cli.state)?;
            tracing::info!("Resource deleted");
        }
    }

    Ok(())
}

pub async fn cmd_data(cli: &Cli, cancel: &CancellationToken) -> Result<()> {
    let source = ScriptDataSource::new(load_config(&cli.config)?);
    let output = source.read(cancel).await.context("Data source read failed")?;
    print_json(&display_json(&output)?)
}
