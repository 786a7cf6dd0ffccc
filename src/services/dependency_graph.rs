//! Dependency graph engine.
//!
//! Builds an in-memory DAG from one mission's task set and answers every
//! graph question the orchestrator has: cycle detection, topological
//! levels, the executable and blocked sets, and the critical path. The
//! graph is rebuilt from a single snapshot of the mission's tasks on each
//! call; it never goes back to the store per node.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskStatus};

/// Weight assumed for tasks without a duration estimate, so the critical
/// path still reflects chain depth.
const DEFAULT_TASK_WEIGHT: i64 = 1;

/// A node in the DAG view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DagNode {
    pub task_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    /// Topological level; `None` when the graph has cycles
    pub level: Option<u32>,
}

/// An edge in the DAG view, pointing dependency -> dependent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DagEdge {
    pub from: Uuid,
    pub to: Uuid,
}

/// Serializable snapshot of a mission's DAG.
#[derive(Debug, Clone, Serialize)]
pub struct DagView {
    pub nodes: Vec<DagNode>,
    pub edges: Vec<DagEdge>,
    pub has_cycles: bool,
    pub cycles: Vec<Vec<Uuid>>,
}

/// A pending task held back by incomplete dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedTask {
    pub task_id: Uuid,
    /// The dependencies that are not yet completed, with their status
    pub blocking: Vec<BlockingDependency>,
}

/// One incomplete dependency of a blocked task.
#[derive(Debug, Clone, Serialize)]
pub struct BlockingDependency {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

/// The longest weighted path through the DAG.
#[derive(Debug, Clone, Serialize)]
pub struct CriticalPath {
    /// Task ids from the path's root to its final task
    pub path: Vec<Uuid>,
    /// Sum of task weights along the path
    pub total_duration_seconds: i64,
}

/// In-memory DAG over one mission's tasks.
#[derive(Debug, Clone)]
pub struct MissionGraph {
    /// Task ids in insertion order, for deterministic iteration
    ids: Vec<Uuid>,
    titles: HashMap<Uuid, String>,
    statuses: HashMap<Uuid, TaskStatus>,
    /// Whether normal dispatch may consider the task (pending, no audit ref)
    dispatchable: HashMap<Uuid, bool>,
    weights: HashMap<Uuid, i64>,
    /// task -> tasks it depends on
    deps: HashMap<Uuid, Vec<Uuid>>,
    /// task -> tasks that depend on it
    dependents: HashMap<Uuid, Vec<Uuid>>,
}

impl MissionGraph {
    /// Build the graph from a snapshot of one mission's tasks.
    ///
    /// Dependency references to tasks outside the snapshot are dropped;
    /// submission-time validation prevents them from being persisted.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let known: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();

        let mut graph = Self {
            ids: Vec::with_capacity(tasks.len()),
            titles: HashMap::new(),
            statuses: HashMap::new(),
            dispatchable: HashMap::new(),
            weights: HashMap::new(),
            deps: HashMap::new(),
            dependents: HashMap::new(),
        };

        for task in tasks {
            graph.ids.push(task.id);
            graph.titles.insert(task.id, task.title.clone());
            graph.statuses.insert(task.id, task.status);
            graph.dispatchable.insert(task.id, task.is_dispatchable());
            graph.weights.insert(
                task.id,
                task.estimated_duration_seconds.unwrap_or(DEFAULT_TASK_WEIGHT),
            );

            let deps: Vec<Uuid> = task
                .depends_on
                .iter()
                .copied()
                .filter(|dep| known.contains(dep) && *dep != task.id)
                .collect();
            for &dep in &deps {
                graph.dependents.entry(dep).or_default().push(task.id);
            }
            graph.deps.insert(task.id, deps);
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.statuses.contains_key(&id)
    }

    /// Dependencies of a task (tasks it depends on).
    pub fn dependencies_of(&self, id: Uuid) -> &[Uuid] {
        self.deps.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Dependents of a task (tasks that depend on it).
    pub fn dependents_of(&self, id: Uuid) -> &[Uuid] {
        self.dependents
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Find a dependency cycle, if any.
    ///
    /// DFS with an explicit recursion stack; the first back-edge found
    /// yields the offending cycle as an ordered id sequence closed on its
    /// first node, e.g. `[A, B, C, A]`.
    pub fn detect_cycle(&self) -> Option<Vec<Uuid>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for &start in &self.ids {
            if !visited.contains(&start)
                && self.cycle_dfs(start, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path);
            }
        }
        None
    }

    fn cycle_dfs(
        &self,
        node: Uuid,
        visited: &mut HashSet<Uuid>,
        rec_stack: &mut HashSet<Uuid>,
        path: &mut Vec<Uuid>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for &dep in self.dependencies_of(node) {
            if !visited.contains(&dep) {
                if self.cycle_dfs(dep, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(&dep) {
                // Back-edge: trim the prefix and close the cycle
                if let Some(start) = path.iter().position(|&id| id == dep) {
                    path.drain(0..start);
                    path.push(dep);
                    return true;
                }
            }
        }

        rec_stack.remove(&node);
        path.pop();
        false
    }

    /// All cycles reachable from distinct DFS roots.
    pub fn find_cycles(&self) -> Vec<Vec<Uuid>> {
        // One DFS finds at most one cycle; rerunning after removing the
        // first cycle's nodes surfaces independent cycles for diagnostics.
        let mut cycles = Vec::new();
        let mut excluded: HashSet<Uuid> = HashSet::new();

        loop {
            let sub = self.without(&excluded);
            match sub.detect_cycle() {
                Some(cycle) => {
                    excluded.extend(cycle.iter().copied());
                    cycles.push(cycle);
                }
                None => break,
            }
        }
        cycles
    }

    /// Clone of the graph with `excluded` nodes removed.
    fn without(&self, excluded: &HashSet<Uuid>) -> Self {
        let mut sub = self.clone();
        sub.ids.retain(|id| !excluded.contains(id));
        sub.statuses.retain(|id, _| !excluded.contains(id));
        for deps in sub.deps.values_mut() {
            deps.retain(|id| !excluded.contains(id));
        }
        sub.deps.retain(|id, _| !excluded.contains(id));
        for dependents in sub.dependents.values_mut() {
            dependents.retain(|id| !excluded.contains(id));
        }
        sub.dependents.retain(|id, _| !excluded.contains(id));
        sub
    }

    /// Task ids in topological order (dependencies before dependents).
    ///
    /// Kahn's algorithm; fails with `DependencyCycle` when the graph is
    /// not a DAG.
    pub fn topological_order(&self) -> DomainResult<Vec<Uuid>> {
        let mut in_degree: HashMap<Uuid, usize> = self
            .ids
            .iter()
            .map(|&id| (id, self.dependencies_of(id).len()))
            .collect();

        let mut queue: VecDeque<Uuid> = self
            .ids
            .iter()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.ids.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &dependent in self.dependents_of(id) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != self.ids.len() {
            let cycle = self.detect_cycle().unwrap_or_default();
            return Err(DomainError::DependencyCycle(cycle));
        }
        Ok(order)
    }

    /// Topological level per task: 0 without dependencies, else
    /// `1 + max(level(dep))`.
    pub fn levels(&self) -> DomainResult<HashMap<Uuid, u32>> {
        let order = self.topological_order()?;
        let mut levels: HashMap<Uuid, u32> = HashMap::with_capacity(order.len());

        for id in order {
            let level = self
                .dependencies_of(id)
                .iter()
                .map(|dep| levels[dep] + 1)
                .max()
                .unwrap_or(0);
            levels.insert(id, level);
        }
        Ok(levels)
    }

    /// Tasks eligible for dispatch right now: pending, not under audit,
    /// and every dependency completed.
    pub fn executable(&self) -> Vec<Uuid> {
        self.ids
            .iter()
            .copied()
            .filter(|&id| self.dispatchable[&id] && self.deps_completed(id))
            .collect()
    }

    /// Pending tasks held back by at least one incomplete dependency,
    /// with the blockers and their current status for diagnostics.
    pub fn blocked(&self) -> Vec<BlockedTask> {
        self.ids
            .iter()
            .copied()
            .filter(|&id| self.statuses[&id] == TaskStatus::Pending)
            .filter_map(|id| {
                let blocking: Vec<BlockingDependency> = self
                    .dependencies_of(id)
                    .iter()
                    .filter(|dep| self.statuses[dep] != TaskStatus::Completed)
                    .map(|&dep| BlockingDependency {
                        task_id: dep,
                        status: self.statuses[&dep],
                    })
                    .collect();
                if blocking.is_empty() {
                    None
                } else {
                    Some(BlockedTask { task_id: id, blocking })
                }
            })
            .collect()
    }

    fn deps_completed(&self, id: Uuid) -> bool {
        self.dependencies_of(id)
            .iter()
            .all(|dep| self.statuses[dep] == TaskStatus::Completed)
    }

    /// Longest weighted path through the DAG, weighting each task by its
    /// duration estimate.
    ///
    /// DP over topological order: `dist(t) = weight(t) + max(dist(dep))`;
    /// the path is reconstructed by following the maximizing predecessor
    /// back from the global maximum.
    pub fn critical_path(&self) -> DomainResult<CriticalPath> {
        let order = self.topological_order()?;
        if order.is_empty() {
            return Ok(CriticalPath {
                path: Vec::new(),
                total_duration_seconds: 0,
            });
        }

        let mut dist: HashMap<Uuid, i64> = HashMap::with_capacity(order.len());
        let mut predecessor: HashMap<Uuid, Uuid> = HashMap::new();

        for &id in &order {
            let mut best: Option<(Uuid, i64)> = None;
            for &dep in self.dependencies_of(id) {
                let d = dist[&dep];
                if best.map_or(true, |(_, bd)| d > bd) {
                    best = Some((dep, d));
                }
            }
            let base = best.map_or(0, |(_, d)| d);
            dist.insert(id, self.weights[&id] + base);
            if let Some((dep, _)) = best {
                predecessor.insert(id, dep);
            }
        }

        let mut end = order[0];
        let mut total = dist[&end];
        for &id in &order {
            if dist[&id] > total {
                end = id;
                total = dist[&id];
            }
        }

        let mut path = vec![end];
        let mut current = end;
        while let Some(&prev) = predecessor.get(&current) {
            path.push(prev);
            current = prev;
        }
        path.reverse();

        Ok(CriticalPath {
            path,
            total_duration_seconds: total,
        })
    }

    /// Validate a proposed dependency edge `task -> depends_on` without
    /// committing it.
    ///
    /// Rejects self-references, unknown endpoints, and any edge that
    /// would close a cycle; the error carries the offending cycle.
    pub fn validate_new_edge(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()> {
        if task_id == depends_on {
            return Err(DomainError::ValidationFailed(
                "task cannot depend on itself".to_string(),
            ));
        }
        if !self.contains(task_id) {
            return Err(DomainError::TaskNotFound(task_id));
        }
        if !self.contains(depends_on) {
            return Err(DomainError::TaskNotFound(depends_on));
        }

        // If depends_on can already reach task_id through dependency
        // edges, the new edge closes a cycle.
        if let Some(chain) = self.dependency_chain(depends_on, task_id) {
            let mut cycle = Vec::with_capacity(chain.len() + 1);
            cycle.push(task_id);
            cycle.extend(chain);
            return Err(DomainError::DependencyCycle(cycle));
        }
        Ok(())
    }

    /// Find a path `from -> ... -> to` through dependency edges, if one
    /// exists. Used for cycle explanations.
    fn dependency_chain(&self, from: Uuid, to: Uuid) -> Option<Vec<Uuid>> {
        let mut stack = vec![vec![from]];
        let mut visited = HashSet::new();

        while let Some(path) = stack.pop() {
            let Some(&current) = path.last() else {
                continue;
            };
            if current == to {
                return Some(path);
            }
            if !visited.insert(current) {
                continue;
            }
            for &dep in self.dependencies_of(current) {
                if !visited.contains(&dep) {
                    let mut next = path.clone();
                    next.push(dep);
                    stack.push(next);
                }
            }
        }
        None
    }

    /// Serializable snapshot of the whole graph.
    pub fn to_view(&self) -> DagView {
        let levels = self.levels().ok();
        let cycles = if levels.is_some() {
            Vec::new()
        } else {
            self.find_cycles()
        };

        let nodes = self
            .ids
            .iter()
            .map(|&id| DagNode {
                task_id: id,
                title: self.titles.get(&id).cloned().unwrap_or_default(),
                status: self.statuses[&id],
                level: levels.as_ref().and_then(|l| l.get(&id).copied()),
            })
            .collect();

        let mut edges = Vec::new();
        for &id in &self.ids {
            for &dep in self.dependencies_of(id) {
                edges.push(DagEdge { from: dep, to: id });
            }
        }

        DagView {
            nodes,
            edges,
            has_cycles: !cycles.is_empty(),
            cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Task;

    fn task(mission: Uuid, deps: &[Uuid]) -> Task {
        let mut t = Task::new(mission, "Graph task", "Graph test task");
        t.depends_on = deps.to_vec();
        t
    }

    fn completed(mission: Uuid, deps: &[Uuid]) -> Task {
        let mut t = task(mission, deps);
        t.status = TaskStatus::Completed;
        t
    }

    #[test]
    fn test_empty_graph() {
        let graph = MissionGraph::from_tasks(&[]);
        assert!(graph.is_empty());
        assert!(graph.detect_cycle().is_none());
        assert!(graph.executable().is_empty());
        assert_eq!(graph.critical_path().unwrap().total_duration_seconds, 0);
    }

    #[test]
    fn test_diamond_levels() {
        let mission = Uuid::new_v4();
        let a = task(mission, &[]);
        let b = task(mission, &[a.id]);
        let c = task(mission, &[a.id]);
        let d = task(mission, &[b.id, c.id]);
        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone(), c.clone(), d.clone()]);

        let levels = graph.levels().unwrap();
        assert_eq!(levels[&a.id], 0);
        assert_eq!(levels[&b.id], 1);
        assert_eq!(levels[&c.id], 1);
        assert_eq!(levels[&d.id], 2);
    }

    #[test]
    fn test_diamond_blocking_and_executable() {
        let mission = Uuid::new_v4();
        let a = completed(mission, &[]);
        let b = completed(mission, &[a.id]);
        let c = task(mission, &[a.id]);
        let d = task(mission, &[b.id, c.id]);

        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone(), c.clone(), d.clone()]);

        // C is executable (its only dep A is done); D is blocked on C
        assert_eq!(graph.executable(), vec![c.id]);
        let blocked = graph.blocked();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].task_id, d.id);
        assert_eq!(blocked[0].blocking.len(), 1);
        assert_eq!(blocked[0].blocking[0].task_id, c.id);
        assert_eq!(blocked[0].blocking[0].status, TaskStatus::Pending);

        // Completing C unblocks D
        let mut c_done = c;
        c_done.status = TaskStatus::Completed;
        let graph = MissionGraph::from_tasks(&[a, b, c_done, d.clone()]);
        assert_eq!(graph.executable(), vec![d.id]);
        assert!(graph.blocked().is_empty());
    }

    #[test]
    fn test_under_audit_excluded_from_executable() {
        let mission = Uuid::new_v4();
        let mut t = task(mission, &[]);
        t.status = TaskStatus::UnderAudit;
        t.auditor_review_id = Some(Uuid::new_v4());

        let graph = MissionGraph::from_tasks(&[t]);
        assert!(graph.executable().is_empty());
    }

    #[test]
    fn test_cycle_detection_reports_rotation() {
        let mission = Uuid::new_v4();
        let mut a = task(mission, &[]);
        let mut b = task(mission, &[]);
        let mut c = task(mission, &[]);
        // A -> B -> C -> A (dependency direction)
        a.depends_on = vec![b.id];
        b.depends_on = vec![c.id];
        c.depends_on = vec![a.id];

        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone(), c.clone()]);
        let cycle = graph.detect_cycle().expect("cycle expected");

        // Closed on its first node, containing exactly the three tasks
        assert_eq!(cycle.first(), cycle.last());
        let members: HashSet<Uuid> = cycle.iter().copied().collect();
        assert_eq!(members, HashSet::from([a.id, b.id, c.id]));
        assert_eq!(cycle.len(), 4);

        assert!(matches!(
            graph.levels(),
            Err(DomainError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_validate_new_edge_rejects_cycle() {
        let mission = Uuid::new_v4();
        let a = task(mission, &[]);
        let b = task(mission, &[a.id]);
        let c = task(mission, &[b.id]);
        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone(), c.clone()]);

        // A depending on C would close A <- B <- C <- A
        let err = graph.validate_new_edge(a.id, c.id).unwrap_err();
        match err {
            DomainError::DependencyCycle(cycle) => {
                assert_eq!(cycle.first(), Some(&a.id));
                assert_eq!(cycle.last(), Some(&a.id));
                assert!(cycle.contains(&b.id));
                assert!(cycle.contains(&c.id));
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }

        // Self-reference rejected
        assert!(graph.validate_new_edge(a.id, a.id).is_err());

        // A fresh edge that closes nothing is fine
        assert!(graph.validate_new_edge(c.id, a.id).is_ok());
    }

    #[test]
    fn test_critical_path_weighted() {
        let mission = Uuid::new_v4();
        let a = task(mission, &[]).with_estimated_duration(10);
        let b = task(mission, &[a.id]).with_estimated_duration(100);
        let c = task(mission, &[a.id]).with_estimated_duration(5);
        let d = task(mission, &[b.id, c.id]).with_estimated_duration(1);

        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let cp = graph.critical_path().unwrap();

        assert_eq!(cp.path, vec![a.id, b.id, d.id]);
        assert_eq!(cp.total_duration_seconds, 111);
    }

    #[test]
    fn test_critical_path_defaults_weight() {
        let mission = Uuid::new_v4();
        let a = task(mission, &[]);
        let b = task(mission, &[a.id]);
        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone()]);

        let cp = graph.critical_path().unwrap();
        assert_eq!(cp.path, vec![a.id, b.id]);
        assert_eq!(cp.total_duration_seconds, 2 * DEFAULT_TASK_WEIGHT);
    }

    #[test]
    fn test_view_shape() {
        let mission = Uuid::new_v4();
        let a = task(mission, &[]);
        let b = task(mission, &[a.id]);
        let graph = MissionGraph::from_tasks(&[a.clone(), b.clone()]);

        let view = graph.to_view();
        assert_eq!(view.nodes.len(), 2);
        assert_eq!(view.edges, vec![DagEdge { from: a.id, to: b.id }]);
        assert!(!view.has_cycles);
        assert!(view.cycles.is_empty());
    }
}
