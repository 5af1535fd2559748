pub mod bank;
pub mod parts;
pub mod pool;
pub mod result_store;
pub mod test_store;
