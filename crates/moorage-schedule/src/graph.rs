//! Dependency graph construction using `petgraph`.
//!
//! Nodes are active service handles; an edge points from a dependency to
//! its dependent so that topological traversal yields dependencies
//! first. Edges whose endpoints are not both active are dropped, and
//! every active service is present even with no dependencies.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

/// A startup dependency graph over active services.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: petgraph::Graph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service node, idempotently.
    pub fn add_service(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&index) = self.indices.get(&name) {
            return index;
        }
        let index = self.graph.add_node(name.clone());
        let _ = self.indices.insert(name, index);
        index
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The edge is dropped unless both services are present, and parallel
    /// edges are not duplicated.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let (Some(&dependent), Some(&dependency)) =
            (self.indices.get(dependent), self.indices.get(dependency))
        else {
            return;
        };
        if self.graph.find_edge(dependency, dependent).is_none() {
            let _ = self.graph.add_edge(dependency, dependent, ());
        }
    }

    /// Whether `name` is a node of the graph.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Number of services in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of `name`, in insertion order.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(&index) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect();
        deps.reverse();
        deps
    }

    pub(crate) const fn inner(&self) -> &petgraph::Graph<String, ()> {
        &self.graph
    }

    /// Builds the graph from parsed fragment documents, restricted to
    /// `active` services. `depends_on` is read in both its list and its
    /// condition-map form.
    #[must_use]
    pub fn from_documents(documents: &[serde_yaml::Value], active: &[String]) -> Self {
        let mut graph = Self::new();
        for name in active {
            let _ = graph.add_service(name.clone());
        }

        for document in documents {
            let Some(services) = document.get("services").and_then(|s| s.as_mapping()) else {
                continue;
            };
            for (key, definition) in services {
                let Some(dependent) = key.as_str() else {
                    continue;
                };
                if !graph.contains(dependent) {
                    continue;
                }
                for dependency in depends_on_names(definition) {
                    graph.add_dependency(dependent, &dependency);
                }
            }
        }

        tracing::debug!(
            services = graph.len(),
            edges = graph.inner().edge_count(),
            "built dependency graph"
        );
        graph
    }
}

/// Referenced dependency names of one service definition value.
fn depends_on_names(definition: &serde_yaml::Value) -> Vec<String> {
    match definition.get("depends_on") {
        Some(serde_yaml::Value::Sequence(entries)) => entries
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        Some(serde_yaml::Value::Mapping(entries)) => entries
            .keys()
            .filter_map(|k| k.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}
