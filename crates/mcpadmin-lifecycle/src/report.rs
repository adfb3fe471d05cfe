//! Failure reporting
//!
//! Preconditions are logged under their own target and never shown to users.
//! Every other failure is logged once and surfaced as `OperationFailed`.

use tracing::{debug, warn};

use mcpadmin_core::{DomainEvent, ErrorKind, EventSender, PreconditionFailed, ServerId};

pub const PRECONDITION_TARGET: &str = "mcpadmin::precondition";

pub(crate) fn precondition(failure: &PreconditionFailed) {
    if failure.is_stale() {
        // A late result being dropped is expected after disconnect or delete
        debug!(
            target: PRECONDITION_TARGET,
            server_id = %failure.server_id,
            operation = failure.operation,
            status = ?failure.status,
            "[Lifecycle] Discarded stale result"
        );
        return;
    }
    warn!(
        target: PRECONDITION_TARGET,
        server_id = %failure.server_id,
        operation = failure.operation,
        status = ?failure.status,
        reason = %failure.reason,
        "[Lifecycle] Precondition failed"
    );
}

/// Log and surface a classified failure
pub(crate) fn failure(
    events: &EventSender,
    server_id: Option<ServerId>,
    operation: &'static str,
    kind: ErrorKind,
    precondition_failure: Option<&PreconditionFailed>,
    message: String,
) {
    if let Some(p) = precondition_failure {
        precondition(p);
        return;
    }
    warn!(
        server_id = ?server_id.map(|id| id.get()),
        operation = operation,
        kind = kind.as_str(),
        message = %message,
        "[Lifecycle] Operation failed"
    );
    events.emit(DomainEvent::OperationFailed {
        server_id,
        operation: operation.to_string(),
        kind,
        message,
    });
}

/// Report one of the operation errors from `mcpadmin_core::error`
macro_rules! report {
    ($events:expr, $server_id:expr, $operation:expr, $err:expr) => {{
        let err = &$err;
        $crate::report::failure(
            $events,
            $server_id,
            $operation,
            err.kind(),
            err.precondition(),
            err.user_message(),
        );
    }};
}

pub(crate) use report;
