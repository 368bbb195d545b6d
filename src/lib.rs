pub mod agent;
pub mod capabilities;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod models;
pub mod providers;
pub mod registry;
pub mod session;
pub mod token_counter;
