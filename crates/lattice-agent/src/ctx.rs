use std::collections::HashSet;

use uuid::Uuid;

use lattice_core::Result;
use lattice_store::data::tasks;
use lattice_store::types::Task;
use lattice_store::UnitOfWork;

/// In-memory view of a session's task state for one agent run.
///
/// `pending_message_ids` is frozen at loop start: the indexes the model
/// uses to reference messages must stay stable across the whole run even
/// as messages get bound to tasks. Structural tool calls mark the context
/// stale; it is rebuilt from the same open unit-of-work before the next
/// dispatch so flushed-but-uncommitted writes are visible.
#[derive(Debug)]
pub struct TaskCtx {
    pub project_id: Uuid,
    pub session_id: Uuid,
    pub task_ids: Vec<Uuid>,
    pub tasks: Vec<Task>,
    pub pending_message_ids: Vec<Uuid>,
    /// Indexes already bound to a task during this run.
    pub bound_indexes: HashSet<usize>,
    pub stale: bool,
    pub has_reported_thinking: bool,
    pub last_thinking: Option<String>,
    /// Task ids that hit a terminal status this run; drained into
    /// `skill-learn-task` publishes after the loop, outside any transaction.
    pub learning_task_ids: Vec<Uuid>,
    pub finished: bool,
}

impl TaskCtx {
    pub fn task_by_order(&self, order: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.order == order)
    }
}

/// Load the current task list. `previous` carries over the run-scoped
/// fields (bound indexes, learning ids, thinking state) that must survive
/// a rebuild.
pub fn build_task_ctx(
    uow: &UnitOfWork,
    project_id: Uuid,
    session_id: Uuid,
    pending_message_ids: &[Uuid],
    previous: Option<TaskCtx>,
) -> Result<TaskCtx> {
    let current = tasks::fetch_current_tasks(uow, session_id)?;
    let mut ctx = TaskCtx {
        project_id,
        session_id,
        task_ids: current.iter().map(|t| t.id).collect(),
        tasks: current,
        pending_message_ids: pending_message_ids.to_vec(),
        bound_indexes: HashSet::new(),
        stale: false,
        has_reported_thinking: false,
        last_thinking: None,
        learning_task_ids: Vec::new(),
        finished: false,
    };
    if let Some(prev) = previous {
        ctx.bound_indexes = prev.bound_indexes;
        ctx.has_reported_thinking = prev.has_reported_thinking;
        ctx.last_thinking = prev.last_thinking;
        ctx.learning_task_ids = prev.learning_task_ids;
        ctx.finished = prev.finished;
    }
    Ok(ctx)
}
