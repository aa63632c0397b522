pub mod base;
pub mod http;
pub mod retry;
pub mod utils;

#[cfg(test)]
pub mod mock;
