pub mod migrate;
pub mod team;
pub mod user;
