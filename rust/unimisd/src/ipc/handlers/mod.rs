pub mod auth;
pub mod core;
pub mod dashboard;
pub mod lookup;
pub mod screens;
