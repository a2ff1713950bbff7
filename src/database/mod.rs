pub mod connection;
pub mod match_store;
#[cfg(test)]
pub mod memory_store;
