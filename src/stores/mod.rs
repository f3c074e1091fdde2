pub mod buffer_pool;
pub mod connection_cache;
pub mod peer_store;
