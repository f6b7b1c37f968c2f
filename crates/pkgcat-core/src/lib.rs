pub mod config;
pub mod daily;
pub mod query;
pub mod record;
