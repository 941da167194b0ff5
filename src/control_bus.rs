//! Control-Event Bus (spec.md §4.8)
//!
//! Single-consumer queue carrying coarse events to the dispatcher. The
//! dispatcher suspends only on this channel's receive (spec.md §5); every other
//! task that needs the dispatcher's attention sends an event instead of
//! reaching into dispatcher-owned state directly.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::model::RestoreJob;
use crate::registry::TableDescriptor;

/// One dispatched unit of work: the table it targets plus the job itself.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub table: Arc<TableDescriptor>,
    pub job: RestoreJob,
}

/// Events accepted on the control bus.
pub enum ControlEvent {
    /// A data worker asks for work, or just finished a job and wants the next
    /// one. The dispatcher replies via the embedded oneshot: `Some(item)` if
    /// work was found, `None` if the worker should go idle (it will be woken by
    /// a later `WakeData`, or unblocked with `None` again at drain).
    RequestJob(oneshot::Sender<Option<WorkItem>>),

    /// A producer (schema worker, data worker finishing a job, file scanner)
    /// observed newly-ready work and wants the dispatcher to serve any idle
    /// workers immediately rather than wait for their next `RequestJob`.
    WakeData,

    /// Producers have emitted all data jobs. Forces one full table-list refresh
    /// before the dispatcher may declare drain-complete (spec.md §9 open
    /// question).
    FileTypeEnded,

    /// Schema producers are done emitting jobs; any database still buffering in
    /// its `pending_table_queue` gets drained now even if never explicitly
    /// created (e.g. `no_schemas` two-phase mode).
    SchemaPhaseEnded,

    /// Final termination signal.
    Shutdown,
}

pub type ControlSender = mpsc::UnboundedSender<ControlEvent>;
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlEvent>;

pub fn channel() -> (ControlSender, ControlReceiver) {
    mpsc::unbounded_channel()
}
