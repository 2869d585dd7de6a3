//! Security module - passwords, tokens and permissions

pub mod password;
pub mod permission;
pub mod token;

pub use password::*;
pub use permission::*;
pub use token::*;
