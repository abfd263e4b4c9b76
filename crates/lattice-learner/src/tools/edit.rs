use serde::Deserialize;
use serde_json::Value;

use lattice_core::{LatticeError, Result};
use lattice_store::data::{disks, skills};
use lattice_store::UnitOfWork;

use crate::ctx::SkillCtx;
use crate::skill_md::{parse_front_matter, split_file_path};

use super::parse_args;

#[derive(Debug, Deserialize)]
struct StrReplaceArgs {
    skill_name: String,
    file_path: String,
    old_string: String,
    new_string: String,
}

/// Replace one exact occurrence of `old_string`. Zero or multiple matches
/// are rejected so the model can't make an ambiguous edit.
pub fn str_replace_skill_file(ctx: &mut SkillCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: StrReplaceArgs = parse_args("str_replace_skill_file", args)?;
    if args.old_string.is_empty() {
        return Err(LatticeError::Rejected(
            "str_replace_skill_file: old_string must not be empty".to_string(),
        ));
    }
    let (skill_id, disk_id, skill_name) = {
        let skill = ctx.skill_by_name(&args.skill_name).ok_or_else(|| {
            LatticeError::Rejected(format!(
                "str_replace_skill_file: no skill named {:?}",
                args.skill_name
            ))
        })?;
        (skill.id, skill.disk_id, skill.name.clone())
    };
    let (path, filename) = split_file_path(&args.file_path)?;
    let artifact = disks::get_artifact(uow, disk_id, &path, &filename)
        .map_err(LatticeError::from)?
        .ok_or_else(|| {
            LatticeError::Rejected(format!(
                "str_replace_skill_file: {} has no file {}",
                skill_name, args.file_path
            ))
        })?;
    let Some(text) = artifact.asset_meta.text else {
        return Err(LatticeError::Rejected(format!(
            "str_replace_skill_file: {} is not a text file",
            args.file_path
        )));
    };

    let matches = text.matches(&args.old_string).count();
    if matches != 1 {
        return Err(LatticeError::Rejected(format!(
            "str_replace_skill_file: old_string matched {matches} times, need exactly 1"
        )));
    }
    let updated = text.replacen(&args.old_string, &args.new_string, 1);

    // The front matter stays authoritative: an edit to /SKILL.md re-syncs
    // the skill row.
    if path == "/" && filename == "SKILL.md" {
        let front = parse_front_matter(&updated)?;
        skills::update_skill_meta(uow, skill_id, &front.name, &front.description)
            .map_err(LatticeError::from)?;
    }

    disks::put_artifact(
        uow,
        disk_id,
        &path,
        &filename,
        &disks::text_asset_meta(&updated, "text/markdown"),
    )
    .map_err(LatticeError::from)?;

    ctx.stale = true;
    Ok(format!("edited {} in {}", args.file_path, skill_name))
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    skill_name: String,
    file_path: String,
}

pub fn delete_skill_file(ctx: &mut SkillCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: DeleteArgs = parse_args("delete_skill_file", args)?;
    let (disk_id, skill_name) = {
        let skill = ctx.skill_by_name(&args.skill_name).ok_or_else(|| {
            LatticeError::Rejected(format!(
                "delete_skill_file: no skill named {:?}",
                args.skill_name
            ))
        })?;
        (skill.disk_id, skill.name.clone())
    };
    let (path, filename) = split_file_path(&args.file_path)?;
    if path == "/" && filename == "SKILL.md" {
        return Err(LatticeError::Rejected(
            "delete_skill_file: /SKILL.md is the skill's authoritative source and cannot be deleted"
                .to_string(),
        ));
    }
    disks::delete_artifact(uow, disk_id, &path, &filename).map_err(LatticeError::from)?;

    ctx.stale = true;
    Ok(format!("deleted {} from {}", args.file_path, skill_name))
}
