//! Stored workflow templates and the store abstraction.

use crate::normalize;
use async_trait::async_trait;
use atelier_core::{FlatGraph, GenerationKind, RoleMapping, WorkflowGraph};
use atelier_error::{AtelierResult, GraphError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A stored graph with its optional role mapping.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct WorkflowTemplate {
    /// Store key
    id: String,
    /// Graph as authored (either shape)
    graph: WorkflowGraph,
    /// Role mapping; empty means "heuristics only"
    mapping: RoleMapping,
}

impl WorkflowTemplate {
    /// Create a template from parsed parts.
    pub fn new(id: impl Into<String>, graph: WorkflowGraph, mapping: RoleMapping) -> Self {
        Self {
            id: id.into(),
            graph,
            mapping,
        }
    }

    /// Parse the stored `{graphJson, roleMappingJson}` pair.
    pub fn from_json(
        id: impl Into<String>,
        graph_json: &str,
        mapping_json: Option<&str>,
    ) -> Result<Self, GraphError> {
        let graph = WorkflowGraph::from_json(graph_json)?;
        let mapping = match mapping_json {
            Some(text) => RoleMapping::from_json(text)?,
            None => RoleMapping::default(),
        };
        Ok(Self::new(id, graph, mapping))
    }

    /// Executable form of the graph.
    pub fn executable(&self) -> Result<FlatGraph, GraphError> {
        normalize(&self.graph)
    }

    /// Mapping to pass to the binder, `None` when nothing is mapped.
    pub fn mapping_opt(&self) -> Option<&RoleMapping> {
        (!self.mapping.is_empty()).then_some(&self.mapping)
    }
}

/// Supplies workflow templates by id.
///
/// Implementations must be thread-safe; callers share one store across tasks.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Template by id, `None` if unknown.
    async fn template(&self, id: &str) -> AtelierResult<Option<WorkflowTemplate>>;

    /// Template registered as the default for a generation kind.
    async fn default_for(&self, kind: GenerationKind) -> AtelierResult<Option<WorkflowTemplate>>;
}

/// Map-backed store for embedding and tests.
///
/// # Example
///
/// ```
/// use atelier_core::GenerationKind;
/// use atelier_workflow::{InMemoryWorkflowStore, WorkflowStore, WorkflowTemplate};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = InMemoryWorkflowStore::new();
/// let template = WorkflowTemplate::from_json(
///     "portrait-v2",
///     r#"{"9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "x"}}}"#,
///     Some(r#"{"save_image": "9"}"#),
/// ).unwrap();
/// store.insert_default(GenerationKind::Portrait, template).await;
///
/// let found = store.default_for(GenerationKind::Portrait).await.unwrap().unwrap();
/// assert_eq!(found.id(), "portrait-v2");
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    templates: Arc<RwLock<HashMap<String, WorkflowTemplate>>>,
    defaults: Arc<RwLock<HashMap<GenerationKind, String>>>,
}

impl InMemoryWorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template.
    pub async fn insert(&self, template: WorkflowTemplate) {
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template);
    }

    /// Add a template and make it the default for `kind`.
    pub async fn insert_default(&self, kind: GenerationKind, template: WorkflowTemplate) {
        self.defaults
            .write()
            .await
            .insert(kind, template.id.clone());
        self.insert(template).await;
    }

    /// Number of stored templates.
    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.templates.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn template(&self, id: &str) -> AtelierResult<Option<WorkflowTemplate>> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn default_for(&self, kind: GenerationKind) -> AtelierResult<Option<WorkflowTemplate>> {
        let id = self.defaults.read().await.get(&kind).cloned();
        match id {
            Some(id) => self.template(&id).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_ids_are_none() {
        let store = InMemoryWorkflowStore::new();
        assert!(store.template("nope").await.unwrap().is_none());
        assert!(store.default_for(GenerationKind::ShotVideo).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[test]
    fn empty_mapping_is_reported_as_absent() {
        let template = WorkflowTemplate::from_json(
            "t",
            r#"{"9": {"class_type": "SaveImage", "inputs": {}}}"#,
            Some(""),
        )
        .unwrap();
        assert!(template.mapping_opt().is_none());
        assert_eq!(template.executable().unwrap().len(), 1);
    }
}
