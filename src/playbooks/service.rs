use crate::cases::CaseManager;
use crate::error::{AppError, Result};
use crate::models::{ExecutionReport, Playbook};
use dashmap::DashMap;
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::engine::PlaybookEngine;
use super::loader::PlaybookLoader;

/// Outcome of loading one file from a playbook directory
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,

    /// Registered playbook name, or the load error
    pub outcome: Result<String>,
}

/// Playbook service manages the playbook catalog and runs playbooks by name
pub struct PlaybookService {
    /// Playbooks keyed by name
    playbooks: Arc<DashMap<String, Playbook>>,

    engine: PlaybookEngine,
}

impl PlaybookService {
    pub fn new(engine: PlaybookEngine) -> Self {
        Self {
            playbooks: Arc::new(DashMap::new()),
            engine,
        }
    }

    pub fn engine(&self) -> &PlaybookEngine {
        &self.engine
    }

    /// Register a playbook, replacing any playbook with the same name
    pub fn register(&self, playbook: Playbook) {
        info!(
            playbook = %playbook.name,
            actions = playbook.action_count(),
            "Registering playbook"
        );
        self.playbooks.insert(playbook.name.clone(), playbook);
    }

    pub fn get(&self, name: &str) -> Option<Playbook> {
        self.playbooks.get(name).map(|p| p.clone())
    }

    /// All playbooks, sorted by name
    pub fn list(&self) -> Vec<Playbook> {
        let mut playbooks: Vec<Playbook> = self.playbooks.iter().map(|e| e.value().clone()).collect();
        playbooks.sort_by(|a, b| a.name.cmp(&b.name));
        playbooks
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`, registering the valid ones
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<LoadedFile>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AppError::NotFound(format!(
                "Playbook directory {}",
                dir.display()
            )));
        }

        let mut paths = playbook_files(dir)?;
        paths.sort();

        let loaded = paths
            .into_iter()
            .map(|path| {
                let outcome = PlaybookLoader::from_path(&path).map(|playbook| {
                    let name = playbook.name.clone();
                    self.register(playbook);
                    name
                });
                if let Err(e) = &outcome {
                    warn!(path = %path.display(), error = %e, "Skipping invalid playbook");
                }
                LoadedFile { path, outcome }
            })
            .collect();

        Ok(loaded)
    }

    /// Run a registered playbook by name
    pub async fn run(&self, name: &str, inputs: Map<String, JsonValue>) -> Result<ExecutionReport> {
        let playbook = self
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("Playbook '{}'", name)))?;

        Ok(self.engine.execute(&playbook, inputs).await)
    }

    /// Run a playbook and record the report on a case timeline
    pub async fn run_for_case(
        &self,
        name: &str,
        inputs: Map<String, JsonValue>,
        cases: &CaseManager,
        case_id: Uuid,
    ) -> Result<ExecutionReport> {
        // Fail before running when the case does not exist
        cases.get_case(case_id).await?;

        let report = self.run(name, inputs).await?;
        cases.attach_report(case_id, name, &report).await?;

        info!(
            case_id = %case_id,
            playbook = %name,
            status = %report.status,
            "Attached playbook report to case"
        );

        Ok(report)
    }
}

/// Playbook documents directly inside `dir`
pub fn playbook_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CaseManager, InMemoryCaseStore, NewCase};
    use crate::models::{CaseEventType, ExecutionStatus, Severity};
    use serde_json::json;

    const GREETING: &str = r#"
playbook:
  name: Greeting
  actions:
    - id: hello
      type: log
      parameters:
        message: "hello {{inputs.name}}"
"#;

    const BROKEN: &str = r#"
playbook:
  name: Broken
  actions:
    - id: no_type
"#;

    fn service_with_dir() -> (PlaybookService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greeting.yaml"), GREETING).unwrap();
        std::fs::write(dir.path().join("broken.yml"), BROKEN).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        (PlaybookService::new(PlaybookEngine::new()), dir)
    }

    #[test]
    fn test_load_directory_reports_each_file() {
        let (service, dir) = service_with_dir();
        let loaded = service.load_directory(dir.path()).unwrap();

        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].path.ends_with("broken.yml"));
        assert!(matches!(loaded[0].outcome, Err(AppError::Load(_))));
        assert_eq!(loaded[1].outcome.as_ref().unwrap(), "Greeting");

        let names: Vec<String> = service.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Greeting".to_string()]);
    }

    #[test]
    fn test_missing_directory() {
        let service = PlaybookService::new(PlaybookEngine::new());
        assert!(matches!(
            service.load_directory("/definitely/not/here"),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_by_name() {
        let (service, dir) = service_with_dir();
        service.load_directory(dir.path()).unwrap();

        let inputs = json!({"name": "world"}).as_object().cloned().unwrap();
        let report = service.run("Greeting", inputs).await.unwrap();
        assert!(report.has_message("LOG: hello world"));

        assert!(matches!(
            service.run("Nope", Map::new()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_for_case_attaches_report() {
        let (service, dir) = service_with_dir();
        service.load_directory(dir.path()).unwrap();

        let cases = CaseManager::new(Arc::new(InMemoryCaseStore::new()));
        let case = cases
            .create_case(NewCase {
                title: "Greeting check".to_string(),
                description: String::new(),
                severity: Severity::Low,
                tags: vec![],
            })
            .await
            .unwrap();

        let report = service
            .run_for_case("Greeting", Map::new(), &cases, case.id)
            .await
            .unwrap();
        assert_eq!(report.status, ExecutionStatus::Success);

        let stored = cases.get_case(case.id).await.unwrap();
        assert_eq!(stored.playbooks_executed, vec!["Greeting".to_string()]);
        assert_eq!(stored.events.last().unwrap().event_type, CaseEventType::PlaybookRun);

        let missing = service
            .run_for_case("Greeting", Map::new(), &cases, Uuid::new_v4())
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
