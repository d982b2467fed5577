use chrono::Utc;
use chrono_humanize::{Accuracy, HumanTime, Tense};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Method;
use std::time::Duration;

use crate::client::{get_json, ControlPlane};
use crate::error::{DeployError, Result};
use crate::types::CatalogSync;

/// How long to wait between sync checks, and for how long overall.
#[derive(Debug, Clone, Copy)]
pub struct SyncWait {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for SyncWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: None,
        }
    }
}

/// Triggers a refresh of one catalog and waits for Rancher to finish syncing it.
pub struct CatalogRefresher<'a> {
    api: &'a dyn ControlPlane,
    base_url: &'a str,
    catalog: &'a str,
    wait: SyncWait,
}

impl<'a> CatalogRefresher<'a> {
    pub fn new(api: &'a dyn ControlPlane, base_url: &'a str, catalog: &'a str, wait: SyncWait) -> Self {
        Self {
            api,
            base_url,
            catalog,
            wait,
        }
    }

    fn catalog_url(&self) -> String {
        format!("{}/v3/catalogs/{}", self.base_url, self.catalog)
    }

    /// Runs the refresh action once, then polls until the catalog stops
    /// transitioning. Request failures end the wait immediately.
    pub async fn refresh(&self) -> Result<CatalogSync> {
        tracing::info!(catalog = self.catalog, "Refreshing catalog");
        let refresh_url = format!("{}?action=refresh", self.catalog_url());
        self.api.send(Method::POST, &refresh_url, None).await?;

        tracing::info!("Waiting for catalog to sync");
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {prefix:.bold.dim} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_prefix(self.catalog.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self.poll(&spinner).await;
        spinner.finish_and_clear();
        result
    }

    async fn poll(&self, spinner: &ProgressBar) -> Result<CatalogSync> {
        let catalog_url = self.catalog_url();
        let started = Utc::now();

        loop {
            let sync: CatalogSync = get_json(self.api, &catalog_url).await?;
            let elapsed = (Utc::now() - started).to_std().unwrap_or_default();

            if !sync.is_transitioning() {
                let took = HumanTime::from(Utc::now() - started).to_text_en(Accuracy::Rough, Tense::Present);
                spinner.suspend(|| tracing::info!(state = %sync.state, took = %took, "Catalog sync complete"));
                return Ok(sync);
            }

            spinner.suspend(|| tracing::info!(message = %sync.transitioning_message, "Catalog sync in progress"));
            spinner.set_message(sync.transitioning_message.clone());

            let pause = match self.wait.timeout {
                Some(limit) if elapsed >= limit => {
                    return Err(DeployError::CatalogSyncTimeout {
                        catalog: self.catalog.to_string(),
                        waited: elapsed,
                    });
                }
                Some(limit) => self.wait.interval.min(limit - elapsed),
                None => self.wait.interval,
            };
            tokio::time::sleep(pause).await;
        }
    }
}
