pub mod error;
pub mod error_sink;
pub mod pagination;
pub mod repos;
pub mod tasks;
