use uuid::Uuid;

use lattice_core::Result;
use lattice_store::data::spaces;
use lattice_store::types::SkillInfo;
use lattice_store::UnitOfWork;

/// In-memory view of a learning space's skill library for one agent run.
#[derive(Debug)]
pub struct SkillCtx {
    pub project_id: Uuid,
    pub learning_space_id: Uuid,
    pub skills: Vec<SkillInfo>,
    pub stale: bool,
    pub has_reported_thinking: bool,
    pub last_thinking: Option<String>,
    pub finished: bool,
}

impl SkillCtx {
    pub fn skill_by_name(&self, name: &str) -> Option<&SkillInfo> {
        let wanted = lattice_store::data::skills::sanitize_skill_name(name);
        self.skills.iter().find(|s| s.name == wanted)
    }
}

/// Load the space's current skill listing; run-scoped fields carry over
/// from `previous` on rebuild.
pub fn build_skill_ctx(
    uow: &UnitOfWork,
    project_id: Uuid,
    learning_space_id: Uuid,
    previous: Option<SkillCtx>,
) -> Result<SkillCtx> {
    let skills = spaces::list_space_skills(uow, learning_space_id)?;
    let mut ctx = SkillCtx {
        project_id,
        learning_space_id,
        skills,
        stale: false,
        has_reported_thinking: false,
        last_thinking: None,
        finished: false,
    };
    if let Some(prev) = previous {
        ctx.has_reported_thinking = prev.has_reported_thinking;
        ctx.last_thinking = prev.last_thinking;
        ctx.finished = prev.finished;
    }
    Ok(ctx)
}
