//! API handlers.

pub mod balance;
pub mod health;
pub mod root;
pub mod token_used;
