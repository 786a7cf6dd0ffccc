//! Property tests for the dependency graph engine.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use vanguard::domain::models::{Task, TaskStatus};
use vanguard::MissionGraph;

/// Build a random DAG: edges only point from later tasks to earlier ones,
/// so the graph is acyclic by construction.
fn random_dag(size: usize, edge_bits: &[bool]) -> Vec<Task> {
    let mission = Uuid::new_v4();
    let mut tasks: Vec<Task> = (0..size)
        .map(|i| Task::new(mission, format!("task-{i}"), "Property test task"))
        .collect();

    let mut bit = 0;
    for i in 1..size {
        for j in 0..i {
            if edge_bits.get(bit).copied().unwrap_or(false) {
                let dep = tasks[j].id;
                tasks[i].depends_on.push(dep);
            }
            bit += 1;
        }
    }
    tasks
}

proptest! {
    /// Topological order always places dependencies before dependents.
    #[test]
    fn prop_topological_order_respects_edges(
        size in 1usize..20,
        edge_bits in prop::collection::vec(any::<bool>(), 0..200),
    ) {
        let tasks = random_dag(size, &edge_bits);
        let graph = MissionGraph::from_tasks(&tasks);

        let order = graph.topological_order().expect("acyclic by construction");
        prop_assert_eq!(order.len(), tasks.len());

        let position: HashMap<Uuid, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for task in &tasks {
            for dep in &task.depends_on {
                prop_assert!(position[dep] < position[&task.id]);
            }
        }
    }

    /// Every task's level is exactly one more than its deepest dependency.
    #[test]
    fn prop_levels_follow_dependencies(
        size in 1usize..20,
        edge_bits in prop::collection::vec(any::<bool>(), 0..200),
    ) {
        let tasks = random_dag(size, &edge_bits);
        let graph = MissionGraph::from_tasks(&tasks);

        let levels = graph.levels().expect("acyclic by construction");
        for task in &tasks {
            let expected = task
                .depends_on
                .iter()
                .map(|dep| levels[dep] + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(levels[&task.id], expected);
        }
    }

    /// The executable set is exactly the dispatchable tasks whose
    /// dependencies are all completed.
    #[test]
    fn prop_executable_set_is_consistent(
        size in 1usize..15,
        edge_bits in prop::collection::vec(any::<bool>(), 0..120),
        completed_bits in prop::collection::vec(any::<bool>(), 0..15),
    ) {
        let mut tasks = random_dag(size, &edge_bits);
        for (i, task) in tasks.iter_mut().enumerate() {
            if completed_bits.get(i).copied().unwrap_or(false) {
                task.status = TaskStatus::Completed;
            }
        }

        let graph = MissionGraph::from_tasks(&tasks);
        let executable: HashSet<Uuid> = graph.executable().into_iter().collect();
        let by_id: HashMap<Uuid, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

        for task in &tasks {
            let deps_done = task
                .depends_on
                .iter()
                .all(|dep| by_id[dep].status == TaskStatus::Completed);
            let expected = task.status == TaskStatus::Pending && deps_done;
            prop_assert_eq!(executable.contains(&task.id), expected);
        }
    }

    /// The critical path is a real dependency chain, and its total weight
    /// dominates every single task's weight.
    #[test]
    fn prop_critical_path_is_a_chain(
        size in 1usize..15,
        edge_bits in prop::collection::vec(any::<bool>(), 0..120),
        weights in prop::collection::vec(1i64..500, 15),
    ) {
        let mut tasks = random_dag(size, &edge_bits);
        for (task, weight) in tasks.iter_mut().zip(&weights) {
            task.estimated_duration_seconds = Some(*weight);
        }

        let graph = MissionGraph::from_tasks(&tasks);
        let cp = graph.critical_path().expect("acyclic by construction");
        prop_assert!(!cp.path.is_empty());

        let by_id: HashMap<Uuid, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

        // Consecutive entries are real dependency edges
        for pair in cp.path.windows(2) {
            prop_assert!(by_id[&pair[1]].depends_on.contains(&pair[0]));
        }

        // Total equals the sum of weights along the path
        let sum: i64 = cp
            .path
            .iter()
            .map(|id| by_id[id].estimated_duration_seconds.unwrap_or(1))
            .sum();
        prop_assert_eq!(cp.total_duration_seconds, sum);

        // No single task outweighs the whole path
        let max_weight = tasks
            .iter()
            .map(|t| t.estimated_duration_seconds.unwrap_or(1))
            .max()
            .unwrap_or(1);
        prop_assert!(cp.total_duration_seconds >= max_weight);
    }

    /// Introducing one back-edge into a chain always produces a cycle, and
    /// the reported cycle is closed.
    #[test]
    fn prop_back_edge_detected(size in 2usize..15) {
        let mission = Uuid::new_v4();
        let mut tasks: Vec<Task> = (0..size)
            .map(|i| Task::new(mission, format!("chain-{i}"), "Chain task"))
            .collect();
        for i in 1..size {
            let dep = tasks[i - 1].id;
            tasks[i].depends_on.push(dep);
        }
        // Close the loop: the first task depends on the last
        let last = tasks[size - 1].id;
        tasks[0].depends_on.push(last);

        let graph = MissionGraph::from_tasks(&tasks);
        let cycle = graph.detect_cycle().expect("cycle must be found");
        prop_assert_eq!(cycle.first(), cycle.last());
        prop_assert_eq!(cycle.len(), size + 1);
        prop_assert!(graph.levels().is_err());
    }
}
