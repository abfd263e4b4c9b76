use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lattice_core::config::ProjectConfig;
use lattice_core::types::{MessageBlob, ProcessStatus, TaskData, TaskStatus};

#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub configs: ProjectConfig,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub project_id: Uuid,
    pub display_title: Option<String>,
    pub disable_task_tracking: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Monotonic insertion order within the database; the ordering and
    /// staleness tiebreaker.
    pub seq: i64,
    pub id: Uuid,
    pub session_id: Uuid,
    pub blob: MessageBlob,
    pub process_status: ProcessStatus,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub session_id: Uuid,
    /// 1-based, dense, monotonic within the session.
    pub order: i64,
    pub status: TaskStatus,
    pub data: TaskData,
    pub raw_message_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct Disk {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    pub created_at: String,
}

/// Content metadata of an artifact: hash, MIME, size, and either inline
/// text or an object-store reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub disk_id: Uuid,
    pub path: String,
    pub filename: String,
    pub asset_meta: AssetMeta,
}

impl Artifact {
    /// Full slash-joined path of this artifact on its disk.
    pub fn full_path(&self) -> String {
        if self.path.ends_with('/') {
            format!("{}{}", self.path, self.filename)
        } else {
            format!("{}/{}", self.path, self.filename)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub disk_id: Uuid,
}

/// Listing entry used to seed the skill-learn agent.
#[derive(Debug, Clone)]
pub struct SkillInfo {
    pub id: Uuid,
    pub disk_id: Uuid,
    pub name: String,
    pub description: String,
    pub file_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LearningSpace {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SandboxLog {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Unified UUID used at the API boundary.
    pub sandbox_id: Uuid,
    /// Backend-specific identifier the runtime maps to.
    pub backend_id: String,
    pub history_commands: Vec<String>,
    pub generated_files: Vec<String>,
}
