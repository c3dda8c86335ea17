pub mod manager;
pub mod reflection;

pub use manager::{MemoryManager, MemorySelection};
pub use reflection::{classify_outcome, MemoryCandidateDraft, ReflectionEngine};
