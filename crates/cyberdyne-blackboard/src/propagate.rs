//! Fan-out of a source write to its dependent derived attributes.
//!
//! The dependent list is precomputed by the schema in topological order, so
//! a single forward pass suffices: when an entry is recomputed, every derived
//! attribute it reads has already been refreshed in this pass.
//!
//! # Failure Modes
//!
//! - **Compute error**: the pass stops at the failing entry. The source value
//!   and every entry recomputed before it keep their new values; later
//!   entries keep their old ones. The changes already made are still
//!   announced when the caller flushes its batch.

use cyberdyne_reactive::NotifyBatch;

use crate::attr::AttrId;
use crate::board::DynBoard;
use crate::error::Result;

/// Recompute every dependent of `source` on `board`, once each, in order.
///
/// Changes are announced through `batch`, which the caller flushes once the
/// pass is over. Returns the number of entries recomputed.
pub(crate) fn propagate(board: &DynBoard, source: AttrId, batch: &mut NotifyBatch) -> Result<usize> {
    let schema = board.schema();
    let dependents = schema.dependents(source);
    if dependents.is_empty() {
        return Ok(0);
    }

    let span = tracing::debug_span!(
        "blackboard.propagate",
        source = schema.attr_name(source).unwrap_or_default(),
        dependents = dependents.len()
    );
    let _guard = span.enter();

    for &dependent in dependents {
        board.recompute(dependent, batch)?;
    }
    Ok(dependents.len())
}
