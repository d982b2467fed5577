use crate::catalog::CatalogRefresher;
use crate::client::{ControlPlane, RancherClient};
use crate::config::Config;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::tags::select_tag;
use crate::updater::{Outcome, Updater};

/// Counts from one pass over the inventory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub projects: usize,
    pub apps: usize,
    pub upgraded: usize,
    pub dry_run_skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Apps that matched the catalog and chart.
    pub fn eligible(&self) -> usize {
        self.upgraded + self.dry_run_skipped + self.failed
    }

    fn record(&mut self, outcome: Outcome) {
        self.apps += 1;
        match outcome {
            Outcome::Upgraded => self.upgraded += 1,
            Outcome::DryRun => self.dry_run_skipped += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Ignored => {}
        }
    }
}

/// Runs one deploy pass: pick the tag, refresh the catalog, then walk every
/// project's apps and upgrade the ones that match.
pub struct Deployer<C = RancherClient> {
    config: Config,
    api: C,
}

impl Deployer<RancherClient> {
    pub fn new(config: Config) -> Result<Self> {
        let api = RancherClient::new(&config.rancher_api_token, config.request_timeout)?;
        Ok(Self { config, api })
    }
}

impl<C: ControlPlane> Deployer<C> {
    pub fn with_client(config: Config, api: C) -> Self {
        Self { config, api }
    }

    /// Tag selection, catalog refresh and listing errors abort the pass.
    /// Failed upgrades only show up in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        let tag = select_tag(config.chart_tags.as_slice())?;
        tracing::info!(tag = %tag, chart = %config.chart_name, "Selected chart tag");

        CatalogRefresher::new(&self.api, &config.rancher_url, &config.catalog_name, config.sync_wait)
            .refresh()
            .await?;

        let inventory = Inventory::new(&self.api, &config.rancher_url);
        let updater = Updater::new(&self.api, &config.catalog_name, &config.chart_name, &tag, config.dry_run);

        let mut summary = RunSummary::default();
        for project in inventory.projects().await? {
            summary.projects += 1;
            for app in inventory.apps(&project).await? {
                let outcome = updater.apply(&project, &app).await;
                summary.record(outcome);
            }
        }

        Ok(summary)
    }
}
