// Live auction engine for budget-capped team rosters.

pub mod app;
pub mod auction;
pub mod config;
pub mod import;
pub mod store;
pub mod timer;
