pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod scheduler;
pub mod store;

pub use error::{PersistenceError, SchedulerError};
pub use models::{Card, CardId, Deck, DueCard, Quality, ReviewRecord, ReviewState, ReviewTime, UserId};
pub use scheduler::{RatingResult, ReviewStats, Scheduler, SchedulerOptions};
pub use store::{MemoryStore, ReviewStore, SqliteStore};
