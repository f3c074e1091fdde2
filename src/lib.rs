pub mod backup;
pub mod bencode;
pub mod core;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod stores;
pub mod udp;
pub mod utils;
pub mod validation;
