pub mod engine;
pub mod executor;
pub mod planner;

pub use engine::{SyncConfig, SyncEngine, SyncReport};
pub use executor::{DownloadExecutor, DownloadReport, FileOutcome, FileResult};
pub use planner::{plan, read_local_names, DownloadPlan, SyncPeriod};
