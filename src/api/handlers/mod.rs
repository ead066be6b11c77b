//! API handlers for icecube.

pub mod auth;
pub mod health;
pub mod root;
