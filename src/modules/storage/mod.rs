pub mod data_store;
pub mod redis_data_store;

pub use data_store::{DataStore, DataStoreBackend, FileDataStore, create_data_store, get_json, set_json};
pub use redis_data_store::RedisDataStore;
