//! Startup wave computation.
//!
//! Kahn's algorithm, layered: each wave is the set of services whose
//! dependencies are all satisfied by earlier waves, so members of a wave
//! can start concurrently. A cycle makes wave computation impossible and
//! is reported as a recoverable error naming the members; callers fall
//! back to the coarse two-phase plan.

use petgraph::Direction;
use thiserror::Error;

use crate::graph::DependencyGraph;

/// The dependency graph contains a cycle.
#[derive(Debug, Error)]
#[error("dependency cycle among services: {}", members.join(", "))]
pub struct CycleError {
    /// Services participating in (or downstream of) the cycle, sorted.
    pub members: Vec<String>,
}

/// Computes startup waves over `graph`.
///
/// Every service appears in exactly one wave, each service strictly
/// after all its dependencies. Waves are sorted internally for stable
/// output.
///
/// # Errors
///
/// Returns [`CycleError`] when the graph is not acyclic.
pub fn compute_waves(graph: &DependencyGraph) -> Result<Vec<Vec<String>>, CycleError> {
    let inner = graph.inner();
    let mut in_degree: Vec<usize> = inner
        .node_indices()
        .map(|idx| inner.neighbors_directed(idx, Direction::Incoming).count())
        .collect();
    let mut emitted = vec![false; inner.node_count()];
    let mut remaining = inner.node_count();
    let mut waves = Vec::new();

    while remaining > 0 {
        let ready: Vec<petgraph::graph::NodeIndex> = inner
            .node_indices()
            .filter(|idx| !emitted[idx.index()] && in_degree[idx.index()] == 0)
            .collect();

        if ready.is_empty() {
            let mut members: Vec<String> = inner
                .node_indices()
                .filter(|idx| !emitted[idx.index()])
                .filter_map(|idx| inner.node_weight(idx).cloned())
                .collect();
            members.sort_unstable();
            return Err(CycleError { members });
        }

        for &idx in &ready {
            emitted[idx.index()] = true;
            remaining -= 1;
            for dependent in inner.neighbors_directed(idx, Direction::Outgoing) {
                in_degree[dependent.index()] -= 1;
            }
        }

        let mut wave: Vec<String> = ready
            .iter()
            .filter_map(|&idx| inner.node_weight(idx).cloned())
            .collect();
        wave.sort_unstable();
        waves.push(wave);
    }

    tracing::debug!(waves = waves.len(), "computed startup waves");
    Ok(waves)
}

/// Coarse fallback plan used when the graph is cyclic: natively-run
/// services first, containers second, empty phases omitted.
#[must_use]
pub fn two_phase_fallback(native: &[String], containers: &[String]) -> Vec<Vec<String>> {
    [native, containers]
        .into_iter()
        .filter(|phase| !phase.is_empty())
        .map(<[String]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(edges: &[(&str, &str)], nodes: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for node in nodes {
            let _ = graph.add_service(*node);
        }
        for (dependent, dependency) in edges {
            graph.add_dependency(dependent, dependency);
        }
        graph
    }

    #[test]
    fn reference_example() {
        let graph = graph_of(&[("api", "db"), ("cache", "db")], &["api", "db", "cache"]);
        let waves = compute_waves(&graph).expect("acyclic");
        assert_eq!(waves, vec![vec!["db"], vec!["api", "cache"]]);
    }

    #[test]
    fn independent_services_share_the_first_wave() {
        let graph = graph_of(&[], &["c", "a", "b"]);
        let waves = compute_waves(&graph).expect("acyclic");
        assert_eq!(waves, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn chain_yields_one_wave_per_service() {
        let graph = graph_of(&[("b", "a"), ("c", "b")], &["a", "b", "c"]);
        let waves = compute_waves(&graph).expect("acyclic");
        assert_eq!(waves, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn every_service_appears_after_its_dependencies() {
        let graph = graph_of(
            &[("api", "db"), ("api", "cache"), ("worker", "api")],
            &["api", "db", "cache", "worker"],
        );
        let waves = compute_waves(&graph).expect("acyclic");

        let wave_of = |name: &str| {
            waves
                .iter()
                .position(|w| w.iter().any(|s| s == name))
                .expect(name)
        };
        assert!(wave_of("db") < wave_of("api"));
        assert!(wave_of("cache") < wave_of("api"));
        assert!(wave_of("api") < wave_of("worker"));
        assert_eq!(waves.iter().map(Vec::len).sum::<usize>(), 4);
    }

    #[test]
    fn empty_graph_yields_no_waves() {
        let waves = compute_waves(&DependencyGraph::new()).expect("acyclic");
        assert!(waves.is_empty());
    }

    #[test]
    fn cycle_reports_members() {
        let graph = graph_of(&[("a", "b"), ("b", "a"), ("c", "a")], &["a", "b", "c"]);
        let err = compute_waves(&graph).expect_err("cyclic");
        assert_eq!(err.members, vec!["a", "b", "c"]);
        assert!(err.to_string().contains("dependency cycle"));
    }

    #[test]
    fn cycle_does_not_poison_disconnected_services() {
        let graph = graph_of(&[("a", "b"), ("b", "a")], &["a", "b", "solo"]);
        let err = compute_waves(&graph).expect_err("cyclic");
        assert_eq!(err.members, vec!["a", "b"]);
    }

    #[test]
    fn fallback_partitions_and_skips_empty_phases() {
        let native = vec!["ollama".to_owned()];
        let containers = vec!["webui".to_owned(), "dify".to_owned()];
        assert_eq!(
            two_phase_fallback(&native, &containers),
            vec![vec!["ollama".to_owned()], vec!["webui".to_owned(), "dify".to_owned()]]
        );
        assert_eq!(
            two_phase_fallback(&[], &containers),
            vec![vec!["webui".to_owned(), "dify".to_owned()]]
        );
        assert!(two_phase_fallback(&[], &[]).is_empty());
    }
}
