// handlers/protected/mod.rs - endpoints behind jwt_auth_middleware
//
// Every handler here receives the caller as Extension<AuthUser>.
pub mod events;
pub mod folders;
pub mod forms;
pub mod responses;
pub mod teams;
pub mod users;
