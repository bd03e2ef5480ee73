pub mod client;
pub mod form4;
pub mod index;
pub mod rate_limiter;
