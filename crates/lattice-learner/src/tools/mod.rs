//! The skill-learn agent's 8-tool palette.

pub mod control;
pub mod create;
pub mod edit;
pub mod read;

use serde_json::{json, Value};

use lattice_core::{LatticeError, Result};
use lattice_llm::ToolDefinition;
use lattice_store::UnitOfWork;

use crate::ctx::SkillCtx;

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(name: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| LatticeError::Rejected(format!("{name}: invalid arguments: {e}")))
}

pub fn dispatch(name: &str, args: Value, ctx: &mut SkillCtx, uow: &UnitOfWork) -> Result<String> {
    match name {
        "get_skill" => read::get_skill(ctx, args),
        "get_skill_file" => read::get_skill_file(ctx, uow, args),
        "create_skill" => create::create_skill(ctx, uow, args),
        "create_skill_file" => create::create_skill_file(ctx, uow, args),
        "str_replace_skill_file" => edit::str_replace_skill_file(ctx, uow, args),
        "delete_skill_file" => edit::delete_skill_file(ctx, uow, args),
        "report_thinking" => control::report_thinking(ctx, args),
        "finish" => control::finish(ctx),
        other => Err(LatticeError::Rejected(format!("unknown tool: {other}"))),
    }
}

pub fn schemas() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_skill".to_string(),
            description: "Show a skill's description and file listing.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "get_skill_file".to_string(),
            description: "Read one file of a skill.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "skill_name": {"type": "string"},
                    "file_path": {"type": "string", "description": "e.g. /SKILL.md"}
                },
                "required": ["skill_name", "file_path"]
            }),
        },
        ToolDefinition {
            name: "create_skill".to_string(),
            description: "Create a new skill from a full SKILL.md document. The YAML \
                          front matter must carry `name` and `description`."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"skill_md_content": {"type": "string"}},
                "required": ["skill_md_content"]
            }),
        },
        ToolDefinition {
            name: "create_skill_file".to_string(),
            description: "Add a new file to a skill. Refuses to overwrite.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "skill_name": {"type": "string"},
                    "file_path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["skill_name", "file_path", "content"]
            }),
        },
        ToolDefinition {
            name: "str_replace_skill_file".to_string(),
            description: "Replace an exact, unique occurrence of old_string in a skill \
                          file with new_string."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "skill_name": {"type": "string"},
                    "file_path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"}
                },
                "required": ["skill_name", "file_path", "old_string", "new_string"]
            }),
        },
        ToolDefinition {
            name: "delete_skill_file".to_string(),
            description: "Delete a skill file. /SKILL.md cannot be deleted.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "skill_name": {"type": "string"},
                    "file_path": {"type": "string"}
                },
                "required": ["skill_name", "file_path"]
            }),
        },
        ToolDefinition {
            name: "report_thinking".to_string(),
            description: "Report a short thought about what you are doing. Call this \
                          at least once in any turn that makes other tool calls."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: "finish".to_string(),
            description: "Signal that the skill library reflects the analysis.".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn palette_has_eight_tools_without_distillation() {
        let names: BTreeSet<String> = schemas().into_iter().map(|t| t.name).collect();
        let expected: BTreeSet<String> = [
            "get_skill",
            "get_skill_file",
            "str_replace_skill_file",
            "create_skill_file",
            "create_skill",
            "delete_skill_file",
            "finish",
            "report_thinking",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(names, expected);
        assert!(!names.contains("report_success_analysis"));
        assert!(!names.contains("report_failure_analysis"));
    }
}
