pub mod database;
pub mod dates;
pub mod export;
pub mod keys;
pub mod ledger;
pub mod numbers;
pub mod tabular;

// Re-export commonly used items
pub use crate::database::{ensure_database_exists, read_database, write_database, LedgerDatabase};
pub use crate::dates::{parse_with_layouts, DateLayout};
pub use crate::export::export_csv;
pub use crate::keys::{derive_key, derive_keys, make_hash_id};
pub use crate::ledger::{LedgerFilter, LedgerStore, LedgerTotals, MergeStats};
pub use crate::numbers::{parse_flexible_number, value_to_f64};
pub use crate::tabular::{find_col, find_optional_col, RowNormalizer, Table};
