pub mod claims;
pub mod events;
pub mod health;
pub mod queue;
