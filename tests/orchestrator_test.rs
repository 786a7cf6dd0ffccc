//! Plan materialization and mission completion tests.

mod common;

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use vanguard::adapters::sqlite::{
    SqliteAgentRepository, SqliteMissionRepository, SqliteTaskRepository,
};
use vanguard::domain::models::{AgentStatus, Mission, MissionStatus, TaskKind, TaskStatus};
use vanguard::domain::ports::{AgentRepository, MissionRepository, TaskFilter, TaskRepository};
use vanguard::services::{CompositeAgentScorer, MissionCoordinator, MissionService, TaskService};
use vanguard::{Agent, DomainError, Task};

use common::{setup_repos, TestRepos};

type Coordinator = MissionCoordinator<
    SqliteTaskRepository,
    SqliteMissionRepository,
    SqliteAgentRepository,
    CompositeAgentScorer<SqliteAgentRepository, SqliteTaskRepository>,
>;

fn coordinator(repos: &TestRepos) -> Coordinator {
    let scorer = Arc::new(CompositeAgentScorer::new(
        repos.agents.clone(),
        repos.tasks.clone(),
    ));
    MissionCoordinator::new(
        repos.tasks.clone(),
        repos.missions.clone(),
        repos.agents.clone(),
        scorer,
        "auditor",
    )
}

fn task_service(
    repos: &TestRepos,
) -> TaskService<SqliteTaskRepository, SqliteMissionRepository, SqliteAgentRepository> {
    TaskService::new(
        repos.tasks.clone(),
        repos.missions.clone(),
        repos.agents.clone(),
    )
}

async fn seeded_mission(repos: &TestRepos) -> Mission {
    let mission = Mission::new("Plan mission", "Materialize a plan");
    repos.missions.create(&mission).await.expect("create mission");
    mission
}

fn sample_plan() -> serde_json::Value {
    json!({
        "agents": [
            {"name": "scout", "role": "researcher"},
            {"name": "builder", "role": "executor"}
        ],
        "tasks": [
            {"local_id": "research", "title": "Research approaches",
             "assigned_agent": "scout", "estimated_duration_seconds": 60},
            {"local_id": "implement", "title": "Implement the winner",
             "assigned_agent": "builder", "dependencies": ["research"],
             "estimated_duration_seconds": 300},
            {"local_id": "verify", "title": "Verify the result",
             "assigned_agent": "scout", "dependencies": ["implement"]}
        ]
    })
}

#[tokio::test]
async fn test_process_plan_materializes_entities() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;
    let coordinator = coordinator(&repos);

    let summary = coordinator
        .process_plan(mission.id, None, &sample_plan())
        .await
        .unwrap();

    assert_eq!(summary.agents_created.len(), 2);
    assert_eq!(summary.agents_reused.len(), 0);
    assert_eq!(summary.tasks_created.len(), 3);
    assert!(summary.failures.is_empty());

    // Dependencies were resolved from plan-local ids to persisted ids
    let tasks = repos
        .tasks
        .list_by_mission(mission.id, TaskFilter::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 3);
    let research = tasks.iter().find(|t| t.title.contains("Research")).unwrap();
    let implement = tasks.iter().find(|t| t.title.contains("Implement")).unwrap();
    let verify = tasks.iter().find(|t| t.title.contains("Verify")).unwrap();
    assert!(research.depends_on.is_empty());
    assert_eq!(implement.depends_on, vec![research.id]);
    assert_eq!(verify.depends_on, vec![implement.id]);

    // Agents were created and attached to the mission
    let scout = repos.agents.get_by_name("scout").await.unwrap().unwrap();
    assert_eq!(scout.current_mission_id, Some(mission.id));
    assert_eq!(research.assigned_to, Some(scout.id));

    // One log entry per entity plus the batch summary
    let log = repos.missions.list_log(mission.id).await.unwrap();
    let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions.iter().filter(|a| **a == "agent_created").count(), 2);
    assert_eq!(actions.iter().filter(|a| **a == "task_created").count(), 3);
    assert_eq!(actions.iter().filter(|a| **a == "plan_processed").count(), 1);
}

#[tokio::test]
async fn test_process_plan_reuses_agents_by_name() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let existing = Agent::new("scout", "researcher");
    repos.agents.create(&existing).await.unwrap();

    let summary = coordinator(&repos)
        .process_plan(mission.id, None, &sample_plan())
        .await
        .unwrap();
    assert_eq!(summary.agents_reused, vec![existing.id]);
    assert_eq!(summary.agents_created.len(), 1);
}

#[tokio::test]
async fn test_process_plan_rejects_empty_tasks() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let err = coordinator(&repos)
        .process_plan(
            mission.id,
            None,
            &json!({"tasks": [], "agents": [{"name": "a", "role": "r"}]}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidPlan(_)));

    // Nothing was created
    let tasks = repos
        .tasks
        .list_by_mission(mission.id, TaskFilter::default())
        .await
        .unwrap();
    assert!(tasks.is_empty());
    let agents = repos.agents.list(Default::default()).await.unwrap();
    assert!(agents.is_empty());
}

#[tokio::test]
async fn test_process_plan_rejects_cyclic_dependencies() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let plan = json!({
        "agents": [{"name": "a", "role": "r"}],
        "tasks": [
            {"local_id": "t1", "title": "One", "dependencies": ["t2"]},
            {"local_id": "t2", "title": "Two", "dependencies": ["t1"]}
        ]
    });
    let err = coordinator(&repos)
        .process_plan(mission.id, None, &plan)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DependencyCycle(_)));

    let tasks = repos
        .tasks
        .list_by_mission(mission.id, TaskFilter::default())
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_process_plan_completes_lead_task() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let mut lead_task = Task::new(mission.id, "Decompose the mission", "Produce a plan")
        .with_kind(TaskKind::PlanAnalysis);
    repos.tasks.create(&lead_task).await.unwrap();
    lead_task.transition_to(TaskStatus::InProgress).unwrap();
    repos.tasks.update(&lead_task).await.unwrap();

    coordinator(&repos)
        .process_plan(mission.id, Some(lead_task.id), &sample_plan())
        .await
        .unwrap();

    let lead_task = repos.tasks.get(lead_task.id).await.unwrap().unwrap();
    assert_eq!(lead_task.status, TaskStatus::Completed);
    assert!(lead_task.output.is_some());
}

#[tokio::test]
async fn test_check_completion_requires_all_tasks_done() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;
    let coordinator = coordinator(&repos);

    let a = Task::new(mission.id, "A", "First");
    let b = Task::new(mission.id, "B", "Second");
    repos.tasks.create(&a).await.unwrap();
    repos.tasks.create(&b).await.unwrap();

    let status = coordinator.check_completion(mission.id).await.unwrap();
    assert!(!status.completed);
    assert_eq!(status.total_tasks, 2);
    assert_eq!(status.completed_tasks, 0);
}

#[tokio::test]
async fn test_check_completion_releases_lead_agent_once() {
    let (_pool, repos) = setup_repos().await;

    let lead = Agent::new("lead-1", "lead");
    repos.agents.create(&lead).await.unwrap();

    let mut mission = Mission::new("Completable", "Finish everything");
    mission.lead_agent_id = Some(lead.id);
    repos.missions.create(&mission).await.unwrap();

    let mut lead_agent = repos.agents.get(lead.id).await.unwrap().unwrap();
    lead_agent.current_mission_id = Some(mission.id);
    lead_agent.status = AgentStatus::Active;
    repos.agents.update(&lead_agent).await.unwrap();

    let mut task = Task::new(mission.id, "Only task", "Do it");
    repos.tasks.create(&task).await.unwrap();
    task.transition_to(TaskStatus::InProgress).unwrap();
    task.transition_to(TaskStatus::Completed).unwrap();
    repos.tasks.update(&task).await.unwrap();

    let coordinator = coordinator(&repos);
    let status = coordinator.check_completion(mission.id).await.unwrap();
    assert!(status.completed);

    let mission_after = repos.missions.get(mission.id).await.unwrap().unwrap();
    assert_eq!(mission_after.status, MissionStatus::Completed);

    let released = repos.agents.get(lead.id).await.unwrap().unwrap();
    assert_eq!(released.status, AgentStatus::Idle);
    assert!(released.current_mission_id.is_none());
    assert_eq!(released.mission_history, vec![mission.id]);

    let log_len = repos.missions.list_log(mission.id).await.unwrap().len();

    // Second check is a no-op: no new log entries, no double release
    let status = coordinator.check_completion(mission.id).await.unwrap();
    assert!(status.completed);
    let log_after = repos.missions.list_log(mission.id).await.unwrap();
    assert_eq!(log_after.len(), log_len);
    let released_again = repos.agents.get(lead.id).await.unwrap().unwrap();
    assert_eq!(released_again.mission_history, vec![mission.id]);
}

#[tokio::test]
async fn test_claim_and_complete_through_service() {
    let (_pool, repos) = setup_repos().await;
    let missions = MissionService::new(repos.missions.clone());
    let mission = seeded_mission(&repos).await;
    missions.activate(mission.id).await.unwrap();

    let service = task_service(&repos);
    let agent = Agent::new("worker", "executor");
    repos.agents.create(&agent).await.unwrap();

    let first = service
        .submit(
            mission.id,
            vanguard::services::TaskSubmission {
                title: "First".to_string(),
                description: "Goes first".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second = service
        .submit(
            mission.id,
            vanguard::services::TaskSubmission {
                title: "Second".to_string(),
                description: "Needs the first".to_string(),
                depends_on: vec![first.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Only the first task is claimable; the second is blocked
    let claimed = service.claim_next(mission.id, agent.id).await.unwrap();
    assert_eq!(claimed.map(|t| t.id), Some(first.id));
    assert!(service.claim_next(mission.id, agent.id).await.unwrap().is_none());

    service.complete(first.id, None).await.unwrap();

    // Completing the first unblocks the second
    let claimed = service.claim_next(mission.id, agent.id).await.unwrap();
    assert_eq!(claimed.map(|t| t.id), Some(second.id));

    // Agent metrics were updated on completion
    let agent_after = repos.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_after.tasks_completed, 1);
}

#[tokio::test]
async fn test_paused_mission_stops_dispatch() {
    let (_pool, repos) = setup_repos().await;
    let missions = MissionService::new(repos.missions.clone());
    let mission = seeded_mission(&repos).await;
    missions.activate(mission.id).await.unwrap();

    let service = task_service(&repos);
    let task = service
        .submit(
            mission.id,
            vanguard::services::TaskSubmission {
                title: "Parked".to_string(),
                description: "Not while paused".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    missions.pause(mission.id).await.unwrap();
    assert!(service
        .claim_next(mission.id, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
    assert!(service.claim(task.id, Uuid::new_v4()).await.is_err());

    // Resuming restores dispatch
    missions.activate(mission.id).await.unwrap();
    let claimed = service.claim_next(mission.id, Uuid::new_v4()).await.unwrap();
    assert_eq!(claimed.map(|t| t.id), Some(task.id));
}

#[tokio::test]
async fn test_add_dependency_rejects_cycles_through_service() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;
    let service = task_service(&repos);

    let a = Task::new(mission.id, "A", "first");
    let b = Task::new(mission.id, "B", "second").with_dependency(a.id);
    let c = Task::new(mission.id, "C", "third").with_dependency(b.id);
    for task in [&a, &b, &c] {
        repos.tasks.create(task).await.unwrap();
    }

    let err = service.add_dependency(a.id, c.id).await.unwrap_err();
    match err {
        DomainError::DependencyCycle(cycle) => {
            assert!(cycle.contains(&a.id) && cycle.contains(&b.id) && cycle.contains(&c.id));
        }
        other => panic!("expected DependencyCycle, got {other:?}"),
    }

    // The edge was not persisted
    let a_after = repos.tasks.get(a.id).await.unwrap().unwrap();
    assert!(a_after.depends_on.is_empty());

    // A legal edge is accepted
    service.add_dependency(c.id, a.id).await.unwrap();
    let c_after = repos.tasks.get(c.id).await.unwrap().unwrap();
    assert!(c_after.depends_on.contains(&a.id));
}
