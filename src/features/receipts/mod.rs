pub mod handlers;
pub mod keys;
pub mod storage;
