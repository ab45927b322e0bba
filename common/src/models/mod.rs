pub mod auth;
pub mod deployment;
pub mod session;
