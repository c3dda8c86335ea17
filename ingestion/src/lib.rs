pub mod chunker;
pub mod connectors;
pub mod coordinator;
pub mod pipeline;
pub mod watcher;

pub use coordinator::{IngestionCoordinator, SyncReport};
pub use watcher::FileWatcher;
