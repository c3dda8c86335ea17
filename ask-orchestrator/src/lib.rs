pub mod drafter;
pub mod orchestrator;
pub mod router;
pub mod state;
pub mod types;

pub use drafter::{SqlDraft, SqlDrafter, FALLBACK_SQL};
pub use orchestrator::AskOrchestrator;
pub use router::{IntentRouter, RouteDecision};
pub use types::{
    AskDebug, AskRequest, AskResponse, CitationView, SqlAttemptView,
};
