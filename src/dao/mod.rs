/// Database model definitions.
pub mod models;
/// Question bank and session archive backends.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
