// SPDX-License-Identifier: MIT

//! File-backed persistence for workflows and their execution history
//!
//! Layout under the data directory:
//! - `workflows/<workflow id>.json`
//! - `executions/<workflow id>/<execution id>.json`
//!
//! Everything is loaded into memory on [`WorkflowStore::open`]; writes go to
//! disk first, then to the cache.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::adk::error::StoreError;
use crate::works::engine::ExecutionContext;
use crate::works::workflow::Workflow;

/// Executions kept per workflow; older ones are pruned
pub const MAX_EXECUTIONS_PER_WORKFLOW: usize = 100;

pub struct WorkflowStore {
    base_dir: PathBuf,
    workflows: RwLock<HashMap<String, Workflow>>,
    executions: RwLock<HashMap<String, VecDeque<ExecutionContext>>>,
}

impl WorkflowStore {
    /// Open (creating if needed) the store rooted at `base_dir`
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            base_dir: base_dir.into(),
            workflows: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
        };
        store.load_all().await?;
        Ok(store)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn workflows_dir(&self) -> PathBuf {
        self.base_dir.join("workflows")
    }

    fn executions_dir(&self) -> PathBuf {
        self.base_dir.join("executions")
    }

    fn execution_file(&self, workflow_id: &str, execution_id: &str) -> PathBuf {
        self.executions_dir()
            .join(workflow_id)
            .join(format!("{execution_id}.json"))
    }

    pub async fn list(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        workflows
    }

    pub async fn get(&self, id: &str) -> Result<Workflow, StoreError> {
        self.workflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.workflows.read().await.contains_key(id)
    }

    /// Insert or replace a workflow
    pub async fn save(&self, workflow: &Workflow) -> Result<(), StoreError> {
        check_id(&workflow.id)?;
        let dir = self.workflows_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let content = serde_json::to_string_pretty(workflow)?;
        tokio::fs::write(dir.join(format!("{}.json", workflow.id)), content).await?;

        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        log::debug!("Saved workflow {} ({})", workflow.id, workflow.name);
        Ok(())
    }

    /// Remove a workflow together with its execution history
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        check_id(id)?;
        if self.workflows.write().await.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let path = self.workflows_dir().join(format!("{id}.json"));
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }

        self.executions.write().await.remove(id);
        let runs = self.executions_dir().join(id);
        if runs.exists() {
            tokio::fs::remove_dir_all(&runs).await?;
        }
        log::info!("Deleted workflow {}", id);
        Ok(())
    }

    /// Persist a finished execution, pruning the oldest beyond the cap
    pub async fn record_execution(&self, execution: &ExecutionContext) -> Result<(), StoreError> {
        check_id(&execution.workflow_id)?;
        check_id(&execution.execution_id)?;

        let dir = self.executions_dir().join(&execution.workflow_id);
        tokio::fs::create_dir_all(&dir).await?;
        let content = serde_json::to_string_pretty(execution)?;
        tokio::fs::write(
            self.execution_file(&execution.workflow_id, &execution.execution_id),
            content,
        )
        .await?;

        let mut executions = self.executions.write().await;
        let queue = executions
            .entry(execution.workflow_id.clone())
            .or_default();
        queue.push_back(execution.clone());

        while queue.len() > MAX_EXECUTIONS_PER_WORKFLOW {
            if let Some(old) = queue.pop_front() {
                let path = self.execution_file(&old.workflow_id, &old.execution_id);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    log::warn!("Could not prune {}: {}", path.display(), e);
                }
            }
        }
        Ok(())
    }

    /// Most recent executions of a workflow, newest first
    pub async fn executions(&self, workflow_id: &str, limit: usize) -> Vec<ExecutionContext> {
        self.executions
            .read()
            .await
            .get(workflow_id)
            .map(|q| q.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub async fn execution(
        &self,
        workflow_id: &str,
        execution_id: &str,
    ) -> Option<ExecutionContext> {
        self.executions
            .read()
            .await
            .get(workflow_id)?
            .iter()
            .find(|e| e.execution_id == execution_id)
            .cloned()
    }

    async fn load_all(&self) -> Result<(), StoreError> {
        let workflows_dir = self.workflows_dir();
        tokio::fs::create_dir_all(&workflows_dir).await?;

        let mut loaded = HashMap::new();
        for path in json_files(&workflows_dir).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Workflow>(&content) {
                Ok(workflow) => {
                    loaded.insert(workflow.id.clone(), workflow);
                }
                Err(e) => log::warn!("Skipping invalid workflow file {}: {}", path.display(), e),
            }
        }
        log::info!("Loaded {} workflows from {}", loaded.len(), workflows_dir.display());
        *self.workflows.write().await = loaded;

        let executions_dir = self.executions_dir();
        tokio::fs::create_dir_all(&executions_dir).await?;

        let mut history: HashMap<String, VecDeque<ExecutionContext>> = HashMap::new();
        let mut entries = tokio::fs::read_dir(&executions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let workflow_id = entry.file_name().to_string_lossy().to_string();

            let mut runs = Vec::new();
            for path in json_files(&entry.path()).await? {
                let content = tokio::fs::read_to_string(&path).await?;
                match serde_json::from_str::<ExecutionContext>(&content) {
                    Ok(run) => runs.push(run),
                    Err(e) => {
                        log::warn!("Skipping invalid execution file {}: {}", path.display(), e)
                    }
                }
            }
            runs.sort_by(|a, b| a.started_at.cmp(&b.started_at));

            let overflow = runs.len().saturating_sub(MAX_EXECUTIONS_PER_WORKFLOW);
            for old in runs.drain(..overflow) {
                let _ = tokio::fs::remove_file(self.execution_file(&workflow_id, &old.execution_id)).await;
            }
            history.insert(workflow_id, runs.into());
        }
        *self.executions.write().await = history;
        Ok(())
    }
}

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(files)
}

// Ids become file names
fn check_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id.contains("..")
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::works::workflow::{Edge, Node, NodeType};
    use serde_json::json;
    use tempfile::TempDir;

    fn workflow(name: &str) -> Workflow {
        Workflow::new(name, "")
            .with_node(Node::new("start", NodeType::Start))
            .with_node(Node::new("end", NodeType::End))
            .with_edge(Edge::new("start", "end"))
    }

    #[tokio::test]
    async fn test_save_get_and_reload() {
        let dir = TempDir::new().unwrap();
        let wf = workflow("Persisted");
        {
            let store = WorkflowStore::open(dir.path()).await.unwrap();
            store.save(&wf).await.unwrap();
            assert_eq!(store.get(&wf.id).await.unwrap(), wf);
        }

        let reopened = WorkflowStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get(&wf.id).await.unwrap(), wf);
        assert_eq!(reopened.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_and_delete_missing() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::open(dir.path()).await.unwrap();
        assert!(matches!(store.get("nope").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("nope").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::open(dir.path()).await.unwrap();
        let mut wf = workflow("Sneaky");
        wf.id = "../escape".to_string();
        assert!(matches!(store.save(&wf).await, Err(StoreError::InvalidId(_))));
        assert!(matches!(store.delete("a/b").await, Err(StoreError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_execution_history_is_capped_and_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::open(dir.path()).await.unwrap();
        let wf = workflow("Busy");
        store.save(&wf).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..MAX_EXECUTIONS_PER_WORKFLOW + 3 {
            let ctx = ExecutionContext::new(&wf, json!(i));
            ids.push(ctx.execution_id.clone());
            store.record_execution(&ctx).await.unwrap();
        }

        let recent = store.executions(&wf.id, 2).await;
        assert_eq!(recent[0].execution_id, ids[ids.len() - 1]);
        assert_eq!(recent[1].execution_id, ids[ids.len() - 2]);
        assert_eq!(
            store.executions(&wf.id, usize::MAX).await.len(),
            MAX_EXECUTIONS_PER_WORKFLOW
        );
        assert!(store.execution(&wf.id, &ids[0]).await.is_none());
        assert!(!store.execution_file(&wf.id, &ids[0]).exists());
    }

    #[tokio::test]
    async fn test_delete_removes_history() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::open(dir.path()).await.unwrap();
        let wf = workflow("Short lived");
        store.save(&wf).await.unwrap();
        store
            .record_execution(&ExecutionContext::new(&wf, json!(null)))
            .await
            .unwrap();

        store.delete(&wf.id).await.unwrap();
        assert!(store.executions(&wf.id, 10).await.is_empty());
        assert!(!dir.path().join("executions").join(&wf.id).exists());
        assert!(!store.contains(&wf.id).await);
    }
}
