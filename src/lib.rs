pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod prompts;
pub mod router;
pub mod session;
pub mod tiers;
