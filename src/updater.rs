//! Per-app upgrade decisions.
//!
//! Nothing in here fails the run: an app that can't be parsed, encoded or
//! upgraded is logged and left alone.

use reqwest::Method;

use crate::client::ControlPlane;
use crate::error::{DeployError, Result};
use crate::types::{App, ExternalId, Project, UpgradeRequest};

/// The new desired state for one app.
#[derive(Debug, Clone)]
pub struct UpdateIntent<'a> {
    pub app: &'a App,
    pub current_version: String,
    pub target_tag: String,
    pub request: UpgradeRequest,
}

#[derive(Debug)]
pub enum Decision<'a> {
    /// `rancher.autoUpdate` is absent or not `"true"`.
    NotOptedIn,
    InvalidExternalId(DeployError),
    /// Deployed from some other catalog or chart.
    OtherChart(ExternalId),
    Upgrade(UpdateIntent<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Upgraded,
    DryRun,
    Failed,
}

pub struct Updater<'a> {
    api: &'a dyn ControlPlane,
    catalog: &'a str,
    chart: &'a str,
    tag: &'a str,
    dry_run: bool,
}

impl<'a> Updater<'a> {
    pub fn new(api: &'a dyn ControlPlane, catalog: &'a str, chart: &'a str, tag: &'a str, dry_run: bool) -> Self {
        Self {
            api,
            catalog,
            chart,
            tag,
            dry_run,
        }
    }

    pub fn decide<'app>(&self, app: &'app App) -> Decision<'app> {
        if !app.auto_update() {
            return Decision::NotOptedIn;
        }

        let external_id = match ExternalId::parse(&app.external_id) {
            Ok(id) => id,
            Err(e) => return Decision::InvalidExternalId(e),
        };

        if external_id.catalog != self.catalog || external_id.template != self.chart {
            return Decision::OtherChart(external_id);
        }

        Decision::Upgrade(UpdateIntent {
            app,
            current_version: external_id.version.clone(),
            target_tag: self.tag.to_string(),
            request: UpgradeRequest {
                external_id: external_id.with_version(self.tag).to_string(),
                answers: app.answers.clone(),
            },
        })
    }

    /// Decides what to do with `app` and, unless this is a dry run, submits
    /// the upgrade.
    pub async fn apply(&self, project: &Project, app: &App) -> Outcome {
        tracing::debug!(app = %app.id, "Examining app");

        let intent = match self.decide(app) {
            Decision::Upgrade(intent) => intent,
            Decision::InvalidExternalId(e) => {
                tracing::warn!(app = %app.id, error = %e, "Skipping app");
                return Outcome::Ignored;
            }
            Decision::NotOptedIn | Decision::OtherChart(_) => return Outcome::Ignored,
        };

        tracing::info!("Found catalog app to update: {}/{}", project.name, app.name);
        tracing::info!("Upgrade version: {} -> {}", intent.current_version, intent.target_tag);

        if self.dry_run {
            tracing::info!(external_id = %intent.request.external_id, "Dry-run: skipping upgrade");
            return Outcome::DryRun;
        }

        match self.submit(&intent).await {
            Ok(()) => {
                tracing::info!("Upgrade successful: {}/{}", project.name, app.name);
                Outcome::Upgraded
            }
            Err(e) => {
                tracing::error!(app = %app.id, error = %e, "Failed to upgrade app");
                Outcome::Failed
            }
        }
    }

    async fn submit(&self, intent: &UpdateIntent<'_>) -> Result<()> {
        let Some(upgrade_url) = intent.app.actions.get("upgrade") else {
            return Err(DeployError::MissingAction {
                app: intent.app.id.clone(),
                action: "upgrade",
            });
        };

        let body = serde_json::to_vec(&intent.request).map_err(DeployError::Encode)?;
        tracing::debug!(body = %String::from_utf8_lossy(&body), "Upgrade body");

        self.api.send(Method::POST, upgrade_url, Some(body)).await?;
        Ok(())
    }
}
