pub mod error;
pub mod handlers;
pub mod repository;
pub mod router;
pub mod server;
pub mod state;

pub use error::{ApiError, Result};
pub use repository::{FileLedgerRepository, LedgerRepository, MemoryLedgerRepository};
pub use router::create_router;
pub use server::run_server;
pub use state::AppState;
