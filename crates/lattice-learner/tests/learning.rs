//! The split learning pipeline against the mock backend: distillation
//! outcomes, publish decisions, the skill agent's library mutations, and
//! learn-lock contention.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use lattice_agent::deps::Deps;
use lattice_core::config::{LatticeConfig, ProjectConfig};
use lattice_core::topics::{self, SkillLearnDistilled, SkillLearnTask};
use lattice_core::types::{MessageBlob, Role, TaskStatus};
use lattice_coord::{acquire_learn_lock, CoordStore};
use lattice_learner::consumer::{process_skill_agent, process_skill_distillation};
use lattice_llm::ProviderRegistry;
use lattice_mq::Broker;
use lattice_store::data::{disks, messages, projects, sessions, skills, spaces, tasks};
use lattice_store::Store;

struct Harness {
    _dir: tempfile::TempDir,
    deps: Deps,
    mq_path: std::path::PathBuf,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = LatticeConfig::default();
    let store = Store::open(dir.path().join("lattice.db")).unwrap();
    let mq_path = dir.path().join("mq.db");
    let broker = Broker::open(&mq_path, config.broker.clone()).unwrap();
    let deps = Deps {
        config: Arc::new(config),
        store,
        coord: Arc::new(CoordStore::new()),
        broker: broker.handle(),
        llm: Arc::new(ProviderRegistry::from_config(&Default::default())),
    };
    drop(broker);
    Harness {
        _dir: dir,
        deps,
        mq_path,
    }
}

fn queued(harness: &Harness, topic: &str) -> Vec<serde_json::Value> {
    let conn = rusqlite::Connection::open(&harness.mq_path).unwrap();
    let mut stmt = conn
        .prepare("SELECT body FROM mq_messages WHERE topic = ?1 ORDER BY id")
        .unwrap();
    let rows = stmt
        .query_map([topic], |row| row.get::<_, String>(0))
        .unwrap();
    rows.map(|r| serde_json::from_str(&r.unwrap()).unwrap())
        .collect()
}

struct Fixture {
    project_id: Uuid,
    session_id: Uuid,
    task_id: Uuid,
    space_id: Uuid,
}

/// Project + session + learning space + one terminal task with a bound
/// transcript, all on the mock backend.
fn seed(harness: &Harness, status: TaskStatus, transcript: &str) -> Fixture {
    let config = ProjectConfig {
        llm_backend: Some("mock".to_string()),
        ..Default::default()
    };
    let uow = harness.deps.store.unit_of_work().unwrap();
    let project = projects::create_project(&uow, &Uuid::new_v4().to_string(), &config).unwrap();
    let session = sessions::create_session(&uow, project.id, false).unwrap();
    let space = spaces::create_learning_space(&uow, project.id).unwrap();
    spaces::link_session(&uow, space.id, session.id).unwrap();

    let message =
        messages::insert_message(&uow, session.id, &MessageBlob::text(Role::User, transcript))
            .unwrap();
    let task = tasks::insert_task_after(&uow, session.id, 0, "ship the feature").unwrap();
    tasks::append_raw_message_ids(&uow, task.id, &[message.id]).unwrap();
    tasks::update_task_status(&uow, task.id, status).unwrap();
    uow.commit().unwrap();

    Fixture {
        project_id: project.id,
        session_id: session.id,
        task_id: task.id,
        space_id: space.id,
    }
}

fn learn_body(f: &Fixture) -> SkillLearnTask {
    SkillLearnTask {
        project_id: f.project_id,
        session_id: f.session_id,
        task_id: f.task_id,
    }
}

// ------------------------------------------------------------- distiller --

#[tokio::test]
async fn distillation_publishes_success_analysis() {
    let h = harness();
    let f = seed(&h, TaskStatus::Success, "please ship the feature");

    process_skill_distillation(&h.deps, learn_body(&f)).await.unwrap();

    let published = queued(&h, topics::SKILL_LEARN_DISTILLED);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["learning_space_id"], json!(f.space_id.to_string()));
    let context = published[0]["distilled_context"].as_str().unwrap();
    assert!(context.starts_with("## Task Analysis (Success)"));
    assert!(context.contains("**Key Lessons:**"));
}

#[tokio::test]
async fn distillation_marks_failed_tasks_as_failure() {
    let h = harness();
    let f = seed(&h, TaskStatus::Failed, "deploy broke");

    process_skill_distillation(&h.deps, learn_body(&f)).await.unwrap();

    let published = queued(&h, topics::SKILL_LEARN_DISTILLED);
    assert_eq!(published.len(), 1);
    assert!(published[0]["distilled_context"]
        .as_str()
        .unwrap()
        .starts_with("## Task Analysis (Failure)"));
}

#[tokio::test]
async fn trivial_task_is_skipped() {
    let h = harness();
    let f = seed(&h, TaskStatus::Success, "TRIVIAL hello there");

    process_skill_distillation(&h.deps, learn_body(&f)).await.unwrap();
    assert!(queued(&h, topics::SKILL_LEARN_DISTILLED).is_empty());
}

#[tokio::test]
async fn session_without_learning_space_drops_message() {
    let h = harness();
    let config = ProjectConfig {
        llm_backend: Some("mock".to_string()),
        ..Default::default()
    };
    let uow = h.deps.store.unit_of_work().unwrap();
    let project = projects::create_project(&uow, "h", &config).unwrap();
    let session = sessions::create_session(&uow, project.id, false).unwrap();
    let task = tasks::insert_task_after(&uow, session.id, 0, "t").unwrap();
    uow.commit().unwrap();

    process_skill_distillation(
        &h.deps,
        SkillLearnTask {
            project_id: project.id,
            session_id: session.id,
            task_id: task.id,
        },
    )
    .await
    .unwrap();
    assert!(queued(&h, topics::SKILL_LEARN_DISTILLED).is_empty());
}

// ----------------------------------------------------------- skill agent --

fn distilled_body(f: &Fixture) -> SkillLearnDistilled {
    SkillLearnDistilled {
        project_id: f.project_id,
        session_id: f.session_id,
        task_id: f.task_id,
        learning_space_id: f.space_id,
        distilled_context: "## Task Analysis (Success)\n**Goal:** ship\n".to_string(),
    }
}

#[tokio::test]
async fn skill_agent_creates_skill_with_front_matter() {
    let h = harness();
    let f = seed(&h, TaskStatus::Success, "ship it");

    process_skill_agent(&h.deps, distilled_body(&f)).await.unwrap();

    let uow = h.deps.store.unit_of_work().unwrap();
    let listed = spaces::list_space_skills(&uow, f.space_id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "learned-patterns");
    assert_eq!(listed[0].description, "Lessons distilled from completed tasks");
    assert_eq!(listed[0].file_paths, vec!["/SKILL.md".to_string()]);

    let skill = skills::get_skill_by_name(&uow, f.project_id, "learned-patterns")
        .unwrap()
        .unwrap();
    let md = disks::get_artifact(&uow, skill.disk_id, "/", "SKILL.md")
        .unwrap()
        .unwrap();
    assert!(md.asset_meta.text.unwrap().starts_with("---\nname: learned-patterns"));
    drop(uow);

    // Lock released in the finally path.
    assert!(acquire_learn_lock(&h.deps.coord, f.space_id, Duration::from_secs(1)).is_some());
}

#[tokio::test]
async fn skill_agent_is_idempotent_when_skill_exists() {
    let h = harness();
    let f = seed(&h, TaskStatus::Success, "ship it");

    process_skill_agent(&h.deps, distilled_body(&f)).await.unwrap();
    // Second distilled context for the same space: the mock sees the skill
    // in Available Skills and finishes without writing.
    process_skill_agent(&h.deps, distilled_body(&f)).await.unwrap();

    let uow = h.deps.store.unit_of_work().unwrap();
    assert_eq!(spaces::list_space_skills(&uow, f.space_id).unwrap().len(), 1);
}

#[tokio::test]
async fn learn_lock_contention_republishes_verbatim() {
    let h = harness();
    let f = seed(&h, TaskStatus::Success, "ship it");
    let body = distilled_body(&f);

    let _held = acquire_learn_lock(&h.deps.coord, f.space_id, Duration::from_secs(60)).unwrap();
    process_skill_agent(&h.deps, body.clone()).await.unwrap();

    let republished = queued(&h, topics::SKILL_LEARN_DISTILLED);
    assert_eq!(republished.len(), 1);
    let round_tripped: SkillLearnDistilled =
        serde_json::from_value(republished[0].clone()).unwrap();
    assert_eq!(round_tripped, body);

    // Nothing was written while the lock was held elsewhere.
    let uow = h.deps.store.unit_of_work().unwrap();
    assert!(spaces::list_space_skills(&uow, f.space_id).unwrap().is_empty());
}
