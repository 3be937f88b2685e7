// Cookie Vote - Core Library
// Exposes the vote controller and its collaborators for the TUI client, the vote server and tests

pub mod api;
pub mod competitor;
pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod selection;
pub mod session;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use competitor::{Category, Competitor, CounterName};
pub use config::Config;
pub use controller::{ControllerState, Increment, SubmissionReceipt, VoteController};
pub use error::VoteError;
pub use guard::{FlagStore, MemoryFlagStore, SqliteFlagStore, SubmissionGuard, SUBMITTED_KEY};
pub use selection::{SelectionSet, Selections, Toggle, SELECTION_LIMIT};
pub use session::{HttpSessionService, LocalSessionService, Session, SessionError, SessionService};
pub use store::{
    insert_competitors, load_competitors_csv, open_counter_store, setup_database, CounterStore,
    HttpCounterStore, SqliteCounterStore, StoreError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
