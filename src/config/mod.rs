// src/config/mod.rs
pub mod app;
pub mod sites;

pub use app::AppConfig;
pub use sites::{load_sites_default, SiteTarget};
