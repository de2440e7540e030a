//! End-to-end tests of the engine operations against the mock API.

use confsync_core::model::{ConfigKey, ConfigRowKey, Key};
use confsync_core::Object;
use confsync_sync_engine::{ApiConfig, ApiConfigRow, PullOptions, PushOptions, SyncError};
use confsync_testkit::TestProject;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const BRANCH: &str = "111";
const EXTRACTOR: &str = "ex-generic-v2";

fn api_config(id: &str, name: &str, configuration: Value, rows: Vec<ApiConfigRow>) -> ApiConfig {
    ApiConfig {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        is_disabled: false,
        configuration: configuration.as_object().cloned().unwrap_or_default(),
        rows,
    }
}

fn api_row(id: &str, name: &str, configuration: Value) -> ApiConfigRow {
    ApiConfigRow {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        is_disabled: false,
        configuration: configuration.as_object().cloned().unwrap_or_default(),
    }
}

/// A project with the default branch pulled to `main`.
fn project_with_main() -> TestProject {
    let project = TestProject::new().with_branch(BRANCH, "Main", true, "main");
    project.api.add_branch(BRANCH, "Main", true);
    project
}

fn mutations(project: &TestProject) -> Vec<String> {
    project
        .api
        .calls()
        .into_iter()
        .filter(|c| !c.starts_with("list_"))
        .collect()
}

#[tokio::test]
async fn test_pull_writes_remote_objects() {
    let project = TestProject::new();
    project.api.add_branch(BRANCH, "Main", true);
    project.api.add_config(
        BRANCH,
        EXTRACTOR,
        api_config(
            "1",
            "My Config",
            json!({"a": 1}),
            vec![api_row("2", "Row One", json!({"b": true}))],
        ),
    );

    let report = project
        .engine()
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.executed);
    assert_eq!(report.plan[0], "Plan for \"pull\" operation:");

    assert!(project.exists("main/meta.json"));
    let config_dir = "main/extractor/ex-generic-v2/my-config";
    assert_eq!(
        project.read_json(&format!("{config_dir}/config.json"))["a"],
        json!(1)
    );
    assert_eq!(
        project.read_json(&format!("{config_dir}/rows/row-one/config.json"))["b"],
        json!(true)
    );
    assert_eq!(project.load_manifest().len(), 3);
    assert!(mutations(&project).is_empty());

    let lines = project.engine().diff(false).await.unwrap();
    assert_eq!(lines, vec!["No difference.".to_string()]);
}

#[tokio::test]
async fn test_pull_dry_run_changes_nothing() {
    let project = TestProject::new();
    project.api.add_branch(BRANCH, "Main", true);

    let report = project
        .engine()
        .pull(PullOptions {
            force: false,
            dry_run: true,
        })
        .await
        .unwrap();
    assert!(!report.executed);
    assert!(report.plan.len() > 1);
    assert!(project.tree().is_empty());
    assert_eq!(project.load_manifest().len(), 0);
}

#[tokio::test]
async fn test_persist_new_config() {
    let project = project_with_main();
    let dir = "main/extractor/ex-generic-v2/new-config";
    project.write_json(&format!("{dir}/meta.json"), &json!({"name": "foo"}));
    project.write_json(&format!("{dir}/config.json"), &json!({"key": "value"}));
    project.write_file(&format!("{dir}/description.md"), "bar\n");

    let mut engine = project.engine();
    let report = engine.persist(false).await.unwrap();
    assert!(report.executed);
    assert_eq!(report.plan[1], format!("  + C {dir}"));

    let key = Key::Config(ConfigKey::new(BRANCH, EXTRACTOR, "1001"));
    let record = engine.state().record(&key).unwrap();
    assert_eq!(record.paths.parent_path, "main");
    assert_eq!(record.paths.object_path, "extractor/ex-generic-v2/new-config");
    assert_eq!(
        record.related_paths,
        vec!["meta.json", "config.json", "description.md"]
    );
    let Some(Object::Config(config)) = engine.state().local(&key) else {
        panic!("config not loaded");
    };
    assert_eq!(config.name, "foo");
    assert_eq!(config.description, "bar");
    assert_eq!(config.content.get("key"), Some(&json!("value")));
    drop(engine);

    assert!(project.load_manifest().record(&key).is_some());
    assert_eq!(project.api.calls_of("generate_new_id").len(), 1);
}

#[tokio::test]
async fn test_persist_new_config_with_row() {
    let project = project_with_main();
    let dir = "main/extractor/ex-generic-v2/new-config";
    project.write_json(&format!("{dir}/meta.json"), &json!({"name": "New"}));
    project.write_json(&format!("{dir}/config.json"), &json!({}));
    project.write_json(&format!("{dir}/rows/first/meta.json"), &json!({"name": "First"}));
    project.write_json(&format!("{dir}/rows/first/config.json"), &json!({"x": 1}));

    let mut engine = project.engine();
    engine.persist(false).await.unwrap();
    assert_eq!(project.api.calls_of("generate_new_id").len(), 2);

    let config_key = engine
        .state()
        .keys()
        .into_iter()
        .find_map(|k| match k {
            Key::Config(c) => Some(c),
            _ => None,
        })
        .unwrap();
    let row_key = engine
        .state()
        .keys()
        .into_iter()
        .find_map(|k| match k {
            Key::ConfigRow(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(row_key.config_key(), config_key);
    let mut ids = vec![config_key.id.to_string(), row_key.id.to_string()];
    ids.sort();
    assert_eq!(ids, vec!["1001", "1002"]);
    assert_eq!(
        engine
            .state()
            .path_of(&Key::ConfigRow(row_key))
            .unwrap(),
        format!("{dir}/rows/first")
    );
}

#[tokio::test]
async fn test_persist_removes_deleted_directories() {
    let config_key = ConfigKey::new(BRANCH, EXTRACTOR, "1");
    let project = project_with_main().with_config(
        config_key.clone(),
        "main",
        "extractor/ex-generic-v2/gone",
        "Gone",
        json!({}),
    );
    std::fs::remove_dir_all(project.path("main/extractor")).unwrap();

    project.engine().persist(false).await.unwrap();
    assert!(project
        .load_manifest()
        .record(&Key::Config(config_key))
        .is_none());
    assert!(project.api.calls_of("generate_new_id").is_empty());
}

#[tokio::test]
async fn test_push_updates_changed_config() {
    let project = project_with_main().with_config(
        ConfigKey::new(BRANCH, EXTRACTOR, "1"),
        "main",
        "extractor/ex-generic-v2/cfg",
        "Cfg",
        json!({"a": 2}),
    );
    project
        .api
        .add_config(BRANCH, EXTRACTOR, api_config("1", "Cfg", json!({"a": 1}), vec![]));

    let report = project
        .engine()
        .push(PushOptions::default())
        .await
        .unwrap();
    assert!(report.executed);
    assert_eq!(project.api.calls_of("update_config").len(), 1);
    let stored = project.api.config(BRANCH, EXTRACTOR, "1").unwrap();
    assert_eq!(stored.configuration.get("a"), Some(&json!(2)));
}

#[tokio::test]
async fn test_push_skips_remote_delete_without_force() {
    let project = project_with_main();
    project
        .api
        .add_config(BRANCH, EXTRACTOR, api_config("1", "Remote", json!({}), vec![]));

    let report = project
        .engine()
        .push(PushOptions::default())
        .await
        .unwrap();
    assert!(report.plan.iter().any(|l| l.ends_with(" - SKIPPED")));
    assert!(project.api.calls_of("delete_config").is_empty());
    assert!(project.api.config(BRANCH, EXTRACTOR, "1").is_some());
}

#[tokio::test]
async fn test_push_force_deletes_remote_config() {
    let project = project_with_main();
    project
        .api
        .add_config(BRANCH, EXTRACTOR, api_config("1", "Remote", json!({}), vec![]));

    project
        .engine()
        .push(PushOptions {
            force: true,
            ..PushOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(
        project.api.calls_of("delete_config"),
        vec!["delete_config ex-generic-v2/1"]
    );
    assert!(project.api.config(BRANCH, EXTRACTOR, "1").is_none());
}

#[tokio::test]
async fn test_push_never_deletes_default_branch() {
    let project = TestProject::new();
    project.api.add_branch(BRANCH, "Main", true);

    let err = project
        .engine()
        .push(PushOptions {
            force: true,
            ..PushOptions::default()
        })
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("cannot perform the push operation:\n- "));
    assert!(text.contains("default branch cannot be deleted"));
    assert!(mutations(&project).is_empty());
}

#[tokio::test]
async fn test_rejected_push_does_not_encrypt() {
    let project = TestProject::new()
        .with_branch("222", "Feature", false, "feature")
        .with_config(
            ConfigKey::new("222", EXTRACTOR, "1"),
            "feature",
            "extractor/ex-generic-v2/cfg",
            "Cfg",
            json!({"#t": "plain"}),
        );
    project.api.add_branch(BRANCH, "Main", true);

    let err = project
        .engine()
        .push(PushOptions {
            encrypt: true,
            ..PushOptions::default()
        })
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("cannot perform the push operation:\n- "));
    assert!(text.contains("default branch cannot be deleted"));
    let content = project.read_json("feature/extractor/ex-generic-v2/cfg/config.json");
    assert_eq!(content["#t"], json!("plain"));
    assert!(project.api.calls_of("encrypt_values").is_empty());
    assert!(mutations(&project).is_empty());
}

#[tokio::test]
async fn test_push_with_encrypt() {
    let project = project_with_main().with_config(
        ConfigKey::new(BRANCH, EXTRACTOR, "1"),
        "main",
        "extractor/ex-generic-v2/cfg",
        "Cfg",
        json!({"#token": "secret"}),
    );
    project
        .api
        .add_config(BRANCH, EXTRACTOR, api_config("1", "Cfg", json!({}), vec![]));

    project
        .engine()
        .push(PushOptions {
            encrypt: true,
            ..PushOptions::default()
        })
        .await
        .unwrap();
    let stored = project.api.config(BRANCH, EXTRACTOR, "1").unwrap();
    assert_eq!(
        stored.configuration.get("#token"),
        Some(&json!("KBC::ProjectSecure::secret"))
    );
}

#[tokio::test]
async fn test_encrypt_rewrites_local_secrets() {
    let project = project_with_main().with_config(
        ConfigKey::new(BRANCH, EXTRACTOR, "1"),
        "main",
        "extractor/ex-generic-v2/cfg",
        "Cfg",
        json!({"#password": "p4ss", "user": "admin", "#done": "KBC::ProjectSecure::x"}),
    );

    let report = project.engine().encrypt(false).await.unwrap();
    assert!(report.executed);
    let content = project.read_json("main/extractor/ex-generic-v2/cfg/config.json");
    assert_eq!(content["#password"], json!("KBC::ProjectSecure::p4ss"));
    assert_eq!(content["user"], json!("admin"));
    assert_eq!(content["#done"], json!("KBC::ProjectSecure::x"));
    assert_eq!(project.api.calls_of("encrypt_values").len(), 1);

    let again = project.engine().encrypt(false).await.unwrap();
    assert!(!again.executed);
}

#[tokio::test]
async fn test_fix_paths_is_idempotent() {
    let config_key = ConfigKey::new(BRANCH, EXTRACTOR, "1");
    let project = project_with_main()
        .with_config(
            config_key.clone(),
            "main",
            "extractor/ex-generic-v2/old-name",
            "New Name",
            json!({}),
        )
        .with_row(
            ConfigRowKey::new(BRANCH, EXTRACTOR, "1", "2"),
            "main/extractor/ex-generic-v2/old-name",
            "rows/row",
            "Row",
            json!({}),
        );

    let report = project.engine().fix_paths(false).await.unwrap();
    assert!(report.executed);
    assert!(project.exists("main/extractor/ex-generic-v2/new-name/meta.json"));
    assert!(project.exists("main/extractor/ex-generic-v2/new-name/rows/row/meta.json"));
    assert!(!project.exists("main/extractor/ex-generic-v2/old-name"));

    let manifest = project.load_manifest();
    let record = manifest.record(&Key::Config(config_key)).unwrap();
    assert_eq!(record.path(), "main/extractor/ex-generic-v2/new-name");

    let again = project.engine().fix_paths(false).await.unwrap();
    assert!(!again.executed);
    assert_eq!(again.plan, vec!["Plan for \"rename\" operation:", "  no difference"]);
}

#[tokio::test]
async fn test_fix_paths_renames_transformation_blocks() {
    let config_key = ConfigKey::new(BRANCH, "keboola.snowflake-transformation", "1");
    let cfg = "main/transformation/keboola.snowflake-transformation/cfg";
    let project = project_with_main().with_config(
        config_key.clone(),
        "main",
        "transformation/keboola.snowflake-transformation/cfg",
        "Cfg",
        json!({}),
    );
    project.write_json(&format!("{cfg}/blocks/001-old/meta.json"), &json!({"name": "New Block"}));
    project.write_json(
        &format!("{cfg}/blocks/001-old/001-code/meta.json"),
        &json!({"name": "Code"}),
    );
    project.write_file(&format!("{cfg}/blocks/001-old/001-code/code.sql"), "SELECT 1;\n");

    let report = project.engine().fix_paths(false).await.unwrap();
    assert!(report.executed);
    assert!(report.plan.iter().any(|l| l.contains("blocks/001-new-block")));
    assert_eq!(
        project.read_file(&format!("{cfg}/blocks/001-new-block/001-code/code.sql")),
        "SELECT 1;\n"
    );
    assert!(!project.exists(&format!("{cfg}/blocks/001-old")));

    let manifest = project.load_manifest();
    let record = manifest.record(&Key::Config(config_key)).unwrap();
    assert_eq!(record.path(), cfg);
    assert!(record
        .related_paths
        .contains(&"blocks/001-new-block/meta.json".to_string()));
    assert!(record
        .related_paths
        .contains(&"blocks/001-new-block/001-code/code.sql".to_string()));
    assert!(!record.related_paths.iter().any(|p| p.contains("001-old")));

    let again = project.engine().fix_paths(false).await.unwrap();
    assert!(!again.executed);
}

#[tokio::test]
async fn test_invalid_local_state_stops_push() {
    let project = project_with_main().with_config(
        ConfigKey::new(BRANCH, EXTRACTOR, "1"),
        "main",
        "extractor/ex-generic-v2/cfg",
        "Cfg",
        json!({}),
    );
    project.write_file("main/extractor/ex-generic-v2/cfg/config.json", "{not json");

    let err = project
        .engine()
        .push(PushOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidLocalState(_)));
    assert!(mutations(&project).is_empty());
}

#[tokio::test]
async fn test_engine_runs_one_operation() {
    let project = project_with_main();
    let mut engine = project.engine();
    engine.diff(false).await.unwrap();
    assert!(engine.diff(false).await.is_err());
}

#[tokio::test]
async fn test_second_engine_cannot_lock_project() {
    let project = project_with_main();
    let _engine = project.engine();
    let err = confsync_sync_engine::SyncEngine::open(
        project.root(),
        project.engine_config(),
        project.api.clone(),
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("lock"));
}
