pub mod auth;
pub mod expenses;
pub mod receipts;
pub mod trips;
