#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptSnapshot, AttemptSnapshotRepository, InMemoryRepository, OptionRecord, QuestionRecord,
    Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
