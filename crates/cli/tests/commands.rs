use ncli::commands::cache::CacheCommands;
use ncli::commands::workspace::WorkspaceCommands;
use ncli::{Commands, Runtime};
use ncli_config::Settings;
use ncli_resolver::WorkspaceCache;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

const TASKS_ID: &str = "1fb79d4c71bb8032b722c82305b63a00";

async fn runtime(dir: &TempDir) -> Runtime {
    let mut settings = Settings::default();
    settings.disk.directory = Some(dir.path().join("http"));
    settings.disk.sync_interval = Duration::ZERO;
    Runtime::from_settings(settings, Some(dir.path().join("workspace.json"))).await
}

fn write_index(dir: &TempDir) {
    WorkspaceCache::from_remote(&[json!({
        "id": TASKS_ID,
        "title": [{"plain_text": "Tasks"}],
        "properties": {"Name": {"type": "title"}}
    })])
    .save(&dir.path().join("workspace.json"))
    .unwrap();
}

#[tokio::test]
async fn test_cache_stats_clear_and_sweep() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime(&dir).await;
    let disk = runtime.fetch().disk().unwrap();
    disk.set("page:a", &json!({"id": "a"}), Duration::from_secs(60))
        .await
        .unwrap();
    disk.set("page:b", &json!({"id": "b"}), Duration::ZERO)
        .await
        .unwrap();

    let stats = Commands::Cache {
        command: CacheCommands::Stats,
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(stats["disk"]["stats"]["entries"], 2);
    assert_eq!(stats["circuit"], "closed");

    let sweep = Commands::Cache {
        command: CacheCommands::Sweep,
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(sweep["disk"]["expired_removed"], 1);

    let cleared = Commands::Cache {
        command: CacheCommands::Clear,
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(cleared["disk_removed"], 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_resolve_by_name_and_url() {
    let dir = TempDir::new().unwrap();
    write_index(&dir);
    let runtime = runtime(&dir).await;

    let by_name = Commands::Resolve {
        input: "Tasks Database".to_string(),
        kind: Some("database".to_string()),
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(by_name["id"], TASKS_ID);
    assert_eq!(by_name["dashed"], "1fb79d4c-71bb-8032-b722-c82305b63a00");
    assert_eq!(by_name["offline"], true);

    let by_url = Commands::Resolve {
        input: format!("https://host/{TASKS_ID}?v=x"),
        kind: Some("page".to_string()),
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(by_url["id"], TASKS_ID);
}

#[tokio::test]
async fn test_resolve_without_kind_infers_it_from_input() {
    let dir = TempDir::new().unwrap();
    write_index(&dir);
    let runtime = runtime(&dir).await;

    let by_name = Commands::Resolve {
        input: "Tasks Database".to_string(),
        kind: None,
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(by_name["id"], TASKS_ID);
    assert_eq!(by_name["kind"], "database");

    let by_id = Commands::Resolve {
        input: TASKS_ID.to_string(),
        kind: None,
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(by_id["kind"], "page");
}

#[tokio::test]
async fn test_resolve_unknown_name_is_not_found() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime(&dir).await;

    let err = Commands::Resolve {
        input: "Payroll".to_string(),
        kind: Some("database".to_string()),
    }
    .run(&runtime)
    .await
    .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_workspace_show() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime(&dir).await;

    let missing = Commands::Workspace {
        command: WorkspaceCommands::Show { full: false },
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(missing["present"], false);

    write_index(&dir);
    let shown = Commands::Workspace {
        command: WorkspaceCommands::Show { full: true },
    }
    .run(&runtime)
    .await
    .unwrap();
    assert_eq!(shown["present"], true);
    assert_eq!(shown["count"], 1);
    assert_eq!(shown["databases"][0]["titleNormalized"], "tasks");
}
