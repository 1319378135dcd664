//! Import pipeline services
//!
//! Leaves first: status tracker, freshness checker, remote source, archive
//! extractor, database importer. The coordinator sequences them; the
//! scheduler and the HTTP layer are its two entry points.

pub mod archive_extractor;
pub mod cache;
pub mod completion;
pub mod database_importer;
pub mod freshness_checker;
pub mod load_monitor;
pub mod remote_source;
pub mod scheduler;
pub mod status_tracker;
pub mod sync_coordinator;

pub use archive_extractor::{ArchiveExtractor, ExtractionResult};
pub use cache::{CacheService, HttpCacheService, NoopCacheService};
pub use completion::{CompletionListener, ListenerRegistry};
pub use database_importer::{DatabaseImporter, SqliteDatabaseImporter};
pub use freshness_checker::{FreshnessChecker, FreshnessStore};
pub use load_monitor::{InFlightGauge, LoadSensor};
pub use remote_source::{HttpRemoteSource, RemoteSource};
pub use scheduler::{CronTrigger, PeriodicTrigger};
pub use status_tracker::StatusTracker;
pub use sync_coordinator::{Collaborators, SyncCoordinator, HEAVY_LOAD_SKIP_REASON};
