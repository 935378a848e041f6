pub mod latest_state_cache;
pub mod scheduler;
