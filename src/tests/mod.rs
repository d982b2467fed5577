use crate::{
    config::{Args, Config, SettingsFile},
    error::ConfigError,
    types::{App, CatalogSync, Collection, ExternalId, Project, UpgradeRequest},
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;


fn required_args() -> Args {
    Args {
        catalog_name: Some("helm-charts".to_string()),
        chart_name: Some("web".to_string()),
        chart_tags: vec!["v1.4.0".to_string()],
        rancher_api_token: Some("token-abc:secret".to_string()),
        rancher_url: Some("https://rancher.example.com/".to_string()),
        ..Args::default()
    }
}

fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_config_from_flags() {
    let config = Config::resolve(&required_args(), env_of(&[])).unwrap();

    assert_eq!(config.rancher_url, "https://rancher.example.com");
    assert_eq!(config.catalog_name, "helm-charts");
    assert_eq!(config.chart_name, "web");
    assert_eq!(config.chart_tags, vec!["v1.4.0"]);
    assert!(!config.dry_run);
    assert_eq!(config.sync_wait.interval, Duration::from_secs(10));
    assert_eq!(config.sync_wait.timeout, None);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
}

#[test]
fn test_config_missing_required_values() {
    let cases: [(fn(&mut Args), &str); 5] = [
        (|a| a.catalog_name = None, "catalog-name"),
        (|a| a.chart_name = None, "chart-name"),
        (|a| a.chart_tags.clear(), "chart-tags"),
        (|a| a.rancher_api_token = Some("  ".to_string()), "rancher-api-token"),
        (|a| a.rancher_url = None, "rancher-url"),
    ];

    for (unset, flag) in cases {
        let mut args = required_args();
        unset(&mut args);
        match Config::resolve(&args, env_of(&[])) {
            Err(ConfigError::Missing(missing)) => assert_eq!(missing, flag),
            other => panic!("expected missing {flag}, got {other:?}"),
        }
    }
}

#[test]
fn test_config_fallback_env_vars() {
    let mut args = required_args();
    args.catalog_name = None;
    args.chart_name = None;

    let env = env_of(&[("CICD_GIT_REPO", "pipeline-repo"), ("CICD_GIT_BRANCH", "main")]);
    let config = Config::resolve(&args, env).unwrap();

    assert_eq!(config.catalog_name, "pipeline-repo");
    assert_eq!(config.chart_name, "main");
}

#[test]
fn test_config_tag_merge_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let tags_file = temp_dir.path().join(".tags");
    std::fs::write(&tags_file, "latest,v1.3.9\n").unwrap();

    let mut args = required_args();
    args.chart_tags = vec!["feature-x".to_string(), " ".to_string()];
    args.tags_file = tags_file;

    let env = env_of(&[("CHART_TAG", "v0.0.1"), ("CHART_TAGS", "a, b")]);
    let config = Config::resolve(&args, env).unwrap();

    assert_eq!(
        config.chart_tags,
        vec!["feature-x", "latest", "v1.3.9", "v0.0.1", "a", "b"]
    );
}

#[test]
fn test_config_missing_tags_file_is_ignored() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut args = required_args();
    args.tags_file = temp_dir.path().join("does-not-exist");

    let config = Config::resolve(&args, env_of(&[])).unwrap();
    assert_eq!(config.chart_tags, vec!["v1.4.0"]);
}

#[test]
fn test_config_settings_file() {
    let settings = r#"
catalog-name: from-file
chart-name: api
chart-tags: [v2.0.0]
rancher-url: https://rancher.internal
rancher-api-token: file-token
dry-run: true
poll-interval-secs: 3
catalog-timeout-secs: 600
"#;
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("deploy.yaml");
    std::fs::write(&path, settings).unwrap();

    let args = Args {
        config: Some(path),
        chart_name: Some("web".to_string()),
        ..Args::default()
    };
    let config = Config::resolve(&args, env_of(&[])).unwrap();

    assert_eq!(config.catalog_name, "from-file");
    assert_eq!(config.chart_name, "web");
    assert_eq!(config.chart_tags, vec!["v2.0.0"]);
    assert_eq!(config.rancher_api_token, "file-token");
    assert!(config.dry_run);
    assert_eq!(config.sync_wait.interval, Duration::from_secs(3));
    assert_eq!(config.sync_wait.timeout, Some(Duration::from_secs(600)));
}

#[test]
fn test_settings_file_rejects_unknown_keys() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("deploy.yaml");
    std::fs::write(&path, "chart: web\n").unwrap();

    let err = SettingsFile::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_config_debug_hides_token() {
    let config = Config::resolve(&required_args(), env_of(&[])).unwrap();
    let printed = format!("{config:?}");
    assert!(!printed.contains("secret"));
}

#[test]
fn test_args_parsing() {
    use clap::Parser;

    let args = Args::try_parse_from([
        "rancher-pipeline-deploy",
        "--chart-tags",
        "latest,v1.0.0",
        "--chart-tags",
        "v0.9.0",
        "--dry-run",
        "--tags-file",
        "/nonexistent/.tags",
    ])
    .unwrap();

    assert_eq!(args.chart_tags, vec!["latest", "v1.0.0", "v0.9.0"]);
    assert!(args.dry_run);
    assert_eq!(args.tags_file, PathBuf::from("/nonexistent/.tags"));
}

#[test]
fn test_external_id_parsing() {
    let id = ExternalId::parse("catalog://?catalog=c1&template=t1&version=1.0.0").unwrap();
    assert_eq!(
        id,
        ExternalId {
            catalog: "c1".to_string(),
            template: "t1".to_string(),
            version: "1.0.0".to_string(),
        }
    );
    assert_eq!(
        id.with_version("2.0.0").to_string(),
        "catalog://?catalog=c1&template=t1&version=2.0.0"
    );

    assert!(ExternalId::parse("").is_err());
    assert!(ExternalId::parse("not a uri").is_err());
    assert!(ExternalId::parse("catalog://?catalog=c1&template=t1").is_err());
}

#[test]
fn test_collection_parsing() {
    let body = json!({
        "type": "collection",
        "data": [
            { "id": "c-1:p-1", "name": "Default", "links": { "apps": "https://r/v3/projects/c-1:p-1/apps" } }
        ],
        "pagination": { "limit": 1000, "next": "https://r/v3/projects?marker=p-2" }
    });

    let projects: Collection<Project> = serde_json::from_value(body).unwrap();
    assert_eq!(projects.data.len(), 1);
    assert_eq!(projects.data[0].links["apps"], "https://r/v3/projects/c-1:p-1/apps");
    assert_eq!(projects.next_page(), Some("https://r/v3/projects?marker=p-2"));

    let empty: Collection<App> = serde_json::from_value(json!({ "data": [] })).unwrap();
    assert!(empty.data.is_empty());
    assert_eq!(empty.next_page(), None);
}

#[test]
fn test_app_auto_update_flag() {
    let app: App = serde_json::from_value(json!({
        "id": "p-1:web",
        "name": "web",
        "externalId": "catalog://?catalog=c1&template=t1&version=1.0.0",
        "answers": { "rancher.autoUpdate": "true", "replicas": "3" },
        "actions": { "upgrade": "https://r/upgrade" }
    }))
    .unwrap();
    assert!(app.auto_update());

    let mut other = app.clone();
    other.answers.insert("rancher.autoUpdate".to_string(), "True".to_string());
    assert!(!other.auto_update());
    other.answers.remove("rancher.autoUpdate");
    assert!(!other.auto_update());
}

#[test]
fn test_catalog_sync_parsing() {
    let sync: CatalogSync = serde_json::from_value(json!({
        "state": "refreshing",
        "transitioning": "yes",
        "transitioningMessage": "Refreshing catalog"
    }))
    .unwrap();
    assert!(sync.is_transitioning());
    assert_eq!(sync.transitioning_message, "Refreshing catalog");

    let settled: CatalogSync = serde_json::from_value(json!({ "state": "active", "transitioning": "no" })).unwrap();
    assert!(!settled.is_transitioning());
}

#[test]
fn test_upgrade_request_encoding() {
    let request = UpgradeRequest {
        external_id: "catalog://?catalog=c1&template=t1&version=2.0.0".to_string(),
        answers: BTreeMap::from([("rancher.autoUpdate".to_string(), "true".to_string())]),
    };

    let encoded = String::from_utf8(serde_json::to_vec(&request).unwrap()).unwrap();
    assert!(encoded.contains("catalog=c1&template=t1&version=2.0.0"));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&encoded).unwrap(),
        json!({
            "externalId": "catalog://?catalog=c1&template=t1&version=2.0.0",
            "answers": { "rancher.autoUpdate": "true" }
        })
    );
}

#[test]
fn test_null_fields_decode_as_empty() {
    let apps: Collection<App> = serde_json::from_value(json!({
        "data": [
            {
                "id": "p-1:web",
                "externalId": "catalog://?catalog=c1&template=t1&version=1.0.0",
                "answers": { "rancher.autoUpdate": "true" },
                "actions": { "upgrade": "https://r/upgrade" }
            },
            { "id": "p-1:raw", "name": null, "externalId": null, "answers": null, "actions": null, "links": null }
        ]
    }))
    .unwrap();

    assert_eq!(apps.data.len(), 2);
    let raw = &apps.data[1];
    assert_eq!(raw.external_id, "");
    assert!(raw.answers.is_empty());
    assert!(raw.actions.is_empty());
    assert!(!raw.auto_update());

    let projects: Collection<Project> =
        serde_json::from_value(json!({ "data": [{ "id": "c-1:p-1", "name": "Default", "links": null }] })).unwrap();
    assert!(projects.data[0].links.is_empty());

    let empty: Collection<Project> = serde_json::from_value(json!({ "data": null })).unwrap();
    assert!(empty.data.is_empty());

    let sync: CatalogSync = serde_json::from_value(json!({
        "state": "active",
        "transitioning": null,
        "transitioningMessage": null
    }))
    .unwrap();
    assert!(!sync.is_transitioning());
}

#[test]
fn test_client_setup_error_message() {
    let source = reqwest::Client::new().get("not a url").build().unwrap_err();
    let err = crate::error::DeployError::ClientSetup(source);
    assert!(err.to_string().starts_with("failed to build HTTP client"), "{err}");
}
