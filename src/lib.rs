pub mod allocator;
pub mod api;
pub mod blacklist;
pub mod book;
pub mod classifier;
pub mod config;
pub mod database;
pub mod error;
pub mod reports;
pub mod settlement;
pub mod types;
pub mod utils;

pub use allocator::{Allocator, allocate};
pub use api::DrawClient;
pub use blacklist::is_blocked;
pub use book::Book;
pub use classifier::{Classification, classify, validate_entry};
pub use config::{Config, MissingCutConfig};
pub use error::{PoolError, Result};
pub use settlement::{Settlement, match_winners, settle};
pub use types::*;
