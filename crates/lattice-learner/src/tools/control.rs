use serde::Deserialize;
use serde_json::Value;

use lattice_core::Result;
use tracing::info;

use crate::ctx::SkillCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct ThinkingArgs {
    text: String,
}

/// Same duplicate-suppression gate as the task agent's report_thinking.
pub fn report_thinking(ctx: &mut SkillCtx, args: Value) -> Result<String> {
    let args: ThinkingArgs = parse_args("report_thinking", args)?;
    if ctx.last_thinking.as_deref() == Some(args.text.as_str()) {
        return Ok("ok (duplicate thinking suppressed)".to_string());
    }
    info!(learning_space_id = %ctx.learning_space_id, "skill agent thinking: {}", args.text);
    ctx.last_thinking = Some(args.text);
    ctx.has_reported_thinking = true;
    Ok("ok".to_string())
}

pub fn finish(ctx: &mut SkillCtx) -> Result<String> {
    ctx.finished = true;
    Ok("ok".to_string())
}
