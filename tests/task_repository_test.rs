mod common;

use uuid::Uuid;
use vanguard::domain::models::{Mission, Task, TaskKind, TaskStatus};
use vanguard::domain::ports::{TaskFilter, TaskRepository};

use common::setup_repos;
use vanguard::domain::ports::MissionRepository;

async fn seeded_mission(repos: &common::TestRepos) -> Mission {
    let mission = Mission::new("Test mission", "Exercise the task repository");
    repos.missions.create(&mission).await.expect("create mission");
    mission
}

fn pending_task(mission_id: Uuid, title: &str) -> Task {
    Task::new(mission_id, title, "Test task description")
}

#[tokio::test]
async fn test_create_and_get_round_trip() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let task = pending_task(mission.id, "Round trip")
        .with_kind(TaskKind::Analysis)
        .with_estimated_duration(90)
        .with_input(serde_json::json!({"query": "llamas"}));
    repos.tasks.create(&task).await.expect("create task");

    let loaded = repos
        .tasks
        .get(task.id)
        .await
        .expect("get task")
        .expect("task exists");
    assert_eq!(loaded.title, "Round trip");
    assert_eq!(loaded.kind, TaskKind::Analysis);
    assert_eq!(loaded.status, TaskStatus::Pending);
    assert_eq!(loaded.estimated_duration_seconds, Some(90));
    assert_eq!(loaded.input, Some(serde_json::json!({"query": "llamas"})));
    assert!(loaded.retry_history.is_empty());
}

#[tokio::test]
async fn test_get_missing_task_is_none() {
    let (_pool, repos) = setup_repos().await;
    let result = repos.tasks.get(Uuid::new_v4()).await.expect("query ok");
    assert!(result.is_none());
}

#[tokio::test]
async fn test_dependencies_persist_through_round_trip() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let dep = pending_task(mission.id, "Dependency");
    repos.tasks.create(&dep).await.expect("create dep");

    let task = pending_task(mission.id, "Dependent").with_dependency(dep.id);
    repos.tasks.create(&task).await.expect("create task");

    let loaded = repos.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(loaded.depends_on, vec![dep.id]);

    repos
        .tasks
        .remove_dependency(task.id, dep.id)
        .await
        .expect("remove dependency");
    let loaded = repos.tasks.get(task.id).await.unwrap().unwrap();
    assert!(loaded.depends_on.is_empty());
}

#[tokio::test]
async fn test_try_claim_is_exclusive() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let task = pending_task(mission.id, "Contended");
    repos.tasks.create(&task).await.expect("create task");

    let agent_a = Uuid::new_v4();
    let agent_b = Uuid::new_v4();

    let first = repos.tasks.try_claim(task.id, agent_a).await.unwrap();
    assert!(first, "first claim wins");

    let second = repos.tasks.try_claim(task.id, agent_b).await.unwrap();
    assert!(!second, "second claim must lose");

    let loaded = repos.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::InProgress);
    assert_eq!(loaded.assigned_to, Some(agent_a));
    assert!(loaded.started_at.is_some());
}

#[tokio::test]
async fn test_claim_respects_reservation() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let task = pending_task(mission.id, "Reserved").with_assignee(owner);
    repos.tasks.create(&task).await.expect("create task");

    // A task reserved for one agent cannot be claimed by another
    assert!(!repos.tasks.try_claim(task.id, stranger).await.unwrap());
    assert!(repos.tasks.try_claim(task.id, owner).await.unwrap());
}

#[tokio::test]
async fn test_claim_skips_audited_tasks() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let mut task = pending_task(mission.id, "Audited");
    repos.tasks.create(&task).await.expect("create task");

    // Park the task under audit directly in the store
    task.status = TaskStatus::UnderAudit;
    task.auditor_review_id = Some(Uuid::new_v4());
    repos.tasks.update(&task).await.expect("update task");

    assert!(!repos.tasks.try_claim(task.id, Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_update_if_status_guards() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let mut task = pending_task(mission.id, "Guarded");
    repos.tasks.create(&task).await.expect("create task");

    task.transition_to(TaskStatus::InProgress).unwrap();

    // Wrong expectation: no update happens
    let applied = repos
        .tasks
        .update_if_status(&task, TaskStatus::Failed)
        .await
        .unwrap();
    assert!(!applied);
    let loaded = repos.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::Pending);

    // Correct expectation: the guarded update lands
    let applied = repos
        .tasks
        .update_if_status(&task, TaskStatus::Pending)
        .await
        .unwrap();
    assert!(applied);
    let loaded = repos.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn test_list_by_mission_with_filters() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;
    let other_mission = seeded_mission(&repos).await;

    let a = pending_task(mission.id, "A");
    let mut b = pending_task(mission.id, "B");
    b.status = TaskStatus::Completed;
    let elsewhere = pending_task(other_mission.id, "Elsewhere");
    for task in [&a, &b, &elsewhere] {
        repos.tasks.create(task).await.expect("create task");
    }

    let all = repos
        .tasks
        .list_by_mission(mission.id, TaskFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let completed = repos
        .tasks
        .list_by_mission(
            mission.id,
            TaskFilter {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, b.id);
}

#[tokio::test]
async fn test_count_by_status() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    for i in 0..3 {
        let mut task = pending_task(mission.id, &format!("T{i}"));
        if i == 0 {
            task.status = TaskStatus::Completed;
        }
        repos.tasks.create(&task).await.expect("create task");
    }

    let counts = repos.tasks.count_by_status(mission.id).await.unwrap();
    assert_eq!(counts.get(&TaskStatus::Pending), Some(&2));
    assert_eq!(counts.get(&TaskStatus::Completed), Some(&1));
}

#[tokio::test]
async fn test_delete_task() {
    let (_pool, repos) = setup_repos().await;
    let mission = seeded_mission(&repos).await;

    let task = pending_task(mission.id, "Doomed");
    repos.tasks.create(&task).await.expect("create task");
    repos.tasks.delete(task.id).await.expect("delete task");

    assert!(repos.tasks.get(task.id).await.unwrap().is_none());
    assert!(repos.tasks.delete(task.id).await.is_err());
}
