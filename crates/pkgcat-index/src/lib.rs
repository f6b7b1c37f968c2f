pub mod catalog;
pub mod ingest;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;
