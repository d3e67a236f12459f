pub mod backend;
pub mod context;
pub mod editor;
pub mod error;
pub mod history;
pub mod model;
pub mod poller;
pub mod store;
pub mod time;
pub mod view;

pub use backend::{BearerToken, SignalBackend};
pub use context::BoardContext;
pub use editor::{
    Commit, EditArbiter, EditOutcome, EditState, EditStep, EditTransition, ReturnMessageEditor,
};
pub use error::{BoardError, Result};
pub use history::{RollingHistory, HISTORY_LEN};
pub use model::{
    count_online, AggregatePoint, DeviceRecord, GpuInfo, HeartbeatLogRow, RawTimestamp,
    RecordError, SignalsPayload,
};
pub use poller::Poller;
pub use store::{
    RefreshOutcome, RefreshReport, RefreshTicket, Snapshot, SnapshotStore, StoreEvent,
    StoreOptions, PREFILL_LABEL,
};
pub use time::{
    elapsed_seconds, format_duration, format_timestamp, is_over_one_day, to_instant,
    ONLINE_INDICATOR, ONLINE_THRESHOLD_SECS,
};
pub use view::ViewProfile;
