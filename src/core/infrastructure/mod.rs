pub mod api_client;
pub mod collector;
pub mod history_store;
mod migrations;
