pub mod fleet;
pub mod health;
