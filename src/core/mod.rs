pub mod catalog;
pub mod conflict;
pub mod engine;
pub mod scanner;
pub mod status;

pub use catalog::{Catalog, CatalogEntry, Diff, SyncState, DEFAULT_CATEGORY};
pub use conflict::{
    ConflictResolver, Decision, DecisionHandler, DecisionRequest, PushAction, RemoteCandidate,
    Unattended,
};
pub use engine::{DeleteTarget, ItemOutcome, LibraryEngine, Outcome, SyncReport, Visibility};
pub use scanner::{FileScanner, ScanConfig};
pub use status::BookStatus;
