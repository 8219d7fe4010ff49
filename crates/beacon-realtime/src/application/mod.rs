//! Tenant applications and the application directory.

pub mod app;
pub mod manager;

pub use app::Application;
pub use manager::ApplicationManager;
