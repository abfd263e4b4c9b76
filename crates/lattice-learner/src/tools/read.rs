use serde::Deserialize;
use serde_json::Value;

use lattice_core::{LatticeError, Result};
use lattice_store::data::disks;
use lattice_store::UnitOfWork;

use crate::ctx::SkillCtx;
use crate::skill_md::split_file_path;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct GetSkillArgs {
    name: String,
}

pub fn get_skill(ctx: &mut SkillCtx, args: Value) -> Result<String> {
    let args: GetSkillArgs = parse_args("get_skill", args)?;
    let skill = ctx.skill_by_name(&args.name).ok_or_else(|| {
        LatticeError::Rejected(format!("get_skill: no skill named {:?}", args.name))
    })?;
    Ok(format!(
        "# {}\n{}\nFiles: {}",
        skill.name,
        skill.description,
        skill.file_paths.join(", ")
    ))
}

#[derive(Debug, Deserialize)]
struct GetSkillFileArgs {
    skill_name: String,
    file_path: String,
}

pub fn get_skill_file(ctx: &mut SkillCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: GetSkillFileArgs = parse_args("get_skill_file", args)?;
    let skill = ctx.skill_by_name(&args.skill_name).ok_or_else(|| {
        LatticeError::Rejected(format!("get_skill_file: no skill named {:?}", args.skill_name))
    })?;
    let (path, filename) = split_file_path(&args.file_path)?;
    let artifact = disks::get_artifact(uow, skill.disk_id, &path, &filename)
        .map_err(LatticeError::from)?
        .ok_or_else(|| {
            LatticeError::Rejected(format!(
                "get_skill_file: {} has no file {}",
                skill.name, args.file_path
            ))
        })?;
    match artifact.asset_meta.text {
        Some(text) => Ok(text),
        None => Ok(format!(
            "(binary content, {} bytes, stored at {})",
            artifact.asset_meta.size,
            artifact.asset_meta.s3_key.as_deref().unwrap_or("unknown")
        )),
    }
}
