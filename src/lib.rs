pub mod align;
pub mod backend;
pub mod capsule;
pub mod config;
pub mod core;
pub mod dkim;
pub mod error;
pub mod format;
pub mod hash;
pub mod locator;
pub mod providers;
