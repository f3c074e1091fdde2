pub mod event;
pub mod peer;
