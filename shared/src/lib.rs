pub mod config;
pub mod database;
pub mod entity;
pub mod redis;

pub use config::Config;
pub use database::get_db_connection;
pub use redis::{get_redis_client, get_redis_connection, Redis};
