pub mod encoder;
pub mod response;
