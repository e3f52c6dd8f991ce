// handlers/public/mod.rs - endpoints reachable without a session token
pub mod auth;
pub mod forms;
pub mod responses;
pub mod system;
