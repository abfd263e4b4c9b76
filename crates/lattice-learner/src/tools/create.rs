use serde::Deserialize;
use serde_json::Value;

use lattice_core::{LatticeError, Result};
use lattice_store::data::{disks, skills, spaces};
use lattice_store::UnitOfWork;

use crate::ctx::SkillCtx;
use crate::skill_md::{parse_front_matter, split_file_path};

use super::parse_args;

#[derive(Debug, Deserialize)]
struct CreateSkillArgs {
    skill_md_content: String,
}

/// Create a skill from a full SKILL.md: its front matter names the skill,
/// the document lands at `/SKILL.md` on a fresh disk, and the skill is
/// linked into the learning space.
pub fn create_skill(ctx: &mut SkillCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: CreateSkillArgs = parse_args("create_skill", args)?;
    let front = parse_front_matter(&args.skill_md_content)?;

    let disk = disks::create_disk(uow, ctx.project_id, None).map_err(LatticeError::from)?;
    let skill = skills::create_skill(
        uow,
        ctx.project_id,
        &front.name,
        &front.description,
        disk.id,
    )
    .map_err(LatticeError::from)?;
    disks::put_artifact(
        uow,
        disk.id,
        "/",
        "SKILL.md",
        &disks::text_asset_meta(&args.skill_md_content, "text/markdown"),
    )
    .map_err(LatticeError::from)?;
    spaces::link_skill(uow, ctx.learning_space_id, skill.id).map_err(LatticeError::from)?;

    ctx.stale = true;
    Ok(format!("created skill {:?}", skill.name))
}

#[derive(Debug, Deserialize)]
struct CreateSkillFileArgs {
    skill_name: String,
    file_path: String,
    content: String,
}

pub fn create_skill_file(ctx: &mut SkillCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: CreateSkillFileArgs = parse_args("create_skill_file", args)?;
    let (disk_id, skill_name) = {
        let skill = ctx.skill_by_name(&args.skill_name).ok_or_else(|| {
            LatticeError::Rejected(format!(
                "create_skill_file: no skill named {:?}",
                args.skill_name
            ))
        })?;
        (skill.disk_id, skill.name.clone())
    };
    let (path, filename) = split_file_path(&args.file_path)?;
    if path == "/" && filename == "SKILL.md" {
        return Err(LatticeError::Rejected(
            "create_skill_file: /SKILL.md is created by create_skill".to_string(),
        ));
    }
    if disks::get_artifact(uow, disk_id, &path, &filename)
        .map_err(LatticeError::from)?
        .is_some()
    {
        return Err(LatticeError::Rejected(format!(
            "create_skill_file: {} already exists; use str_replace_skill_file",
            args.file_path
        )));
    }

    disks::put_artifact(
        uow,
        disk_id,
        &path,
        &filename,
        &disks::text_asset_meta(&args.content, "text/markdown"),
    )
    .map_err(LatticeError::from)?;

    ctx.stale = true;
    Ok(format!("created {} in {}", args.file_path, skill_name))
}
