use crate::client::{get_json, ControlPlane};
use crate::error::Result;
use crate::types::{App, Collection, Project};

/// Lists projects visible to the token, and the apps inside each one.
///
/// Only the first page of each collection is read. App collections are
/// found through the project's own `apps` link.
pub struct Inventory<'a> {
    api: &'a dyn ControlPlane,
    base_url: &'a str,
}

impl<'a> Inventory<'a> {
    pub fn new(api: &'a dyn ControlPlane, base_url: &'a str) -> Self {
        Self { api, base_url }
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        tracing::debug!("Listing projects");
        let url = format!("{}/v3/projects", self.base_url);
        let projects: Collection<Project> = get_json(self.api, &url).await?;
        warn_if_paged(&projects, "projects");
        Ok(projects.data)
    }

    /// Apps in `project`. A project without an `apps` link has none.
    pub async fn apps(&self, project: &Project) -> Result<Vec<App>> {
        let Some(url) = project.links.get("apps") else {
            tracing::warn!(project = %project.name, "Project has no apps link, skipping");
            return Ok(Vec::new());
        };

        tracing::debug!(project = %project.name, "Listing apps");
        let apps: Collection<App> = get_json(self.api, url).await?;
        warn_if_paged(&apps, &project.name);
        Ok(apps.data)
    }
}

fn warn_if_paged<T>(collection: &Collection<T>, what: &str) {
    if let Some(next) = collection.next_page() {
        tracing::warn!(
            collection = what,
            next,
            "Only the first page of {} results was read",
            collection.data.len()
        );
    }
}
