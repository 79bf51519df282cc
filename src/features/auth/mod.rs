pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod session;
