mod classify;
mod engine;
mod icons;
mod record;
mod snapshot;
mod sources;

pub use classify::classify;
pub use engine::{byte_rate, cpu_share, ProcessBackends, ProcessDeltaEngine};
pub use icons::{IconBackend, IconHandle, IconResourceCache, NoIcons, ReleaseOutcome};
pub use record::{
    ProcessCategory, ProcessRecord, ProcessTableDelta, RawProcessSample, RemovedProcess,
    SystemTimes,
};
pub use snapshot::{
    parse_process_buffer, query_with_growing_buffer, AlignedBuffer, ProcessSnapshotSource,
    QueryStatus, RecordCursor, RecordLayout, STATUS_INFO_LENGTH_MISMATCH,
};
pub use sources::{
    NoInspection, NoOwners, NoWindows, ProcessInspector, UsernameResolver, WindowCatalog,
    UNKNOWN_OWNER,
};
