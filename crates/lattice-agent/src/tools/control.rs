use serde::Deserialize;
use serde_json::Value;

use lattice_core::Result;
use tracing::info;

use crate::ctx::TaskCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct ThinkingArgs {
    text: String,
}

/// Streamed thought from the agent. The first report of a given text is
/// logged; an identical repeat is acknowledged but suppressed, which keeps
/// retried iterations from double-reporting.
pub fn report_thinking(ctx: &mut TaskCtx, args: Value) -> Result<String> {
    let args: ThinkingArgs = parse_args("report_thinking", args)?;
    if ctx.last_thinking.as_deref() == Some(args.text.as_str()) {
        return Ok("ok (duplicate thinking suppressed)".to_string());
    }
    info!(session_id = %ctx.session_id, "agent thinking: {}", args.text);
    ctx.last_thinking = Some(args.text);
    ctx.has_reported_thinking = true;
    Ok("ok".to_string())
}

pub fn finish(ctx: &mut TaskCtx) -> Result<String> {
    ctx.finished = true;
    Ok("ok".to_string())
}
