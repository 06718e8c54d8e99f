pub mod accounts;
pub mod auth;
pub mod chat;
pub mod deliveries;
pub mod health;
pub mod payments;
pub mod products;
pub mod transportation;
