pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod present;
pub mod queries;
pub mod sql;
pub mod statements;
pub mod validate;
