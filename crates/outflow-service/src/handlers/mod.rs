//! API handlers.

pub mod campaigns;
pub mod credits;
pub mod dispatch;
pub mod health;
