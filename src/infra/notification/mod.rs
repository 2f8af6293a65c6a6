//! Notification surfaces.

pub mod memory;
pub mod logging;

pub use memory::InMemoryNotificationSurface;
pub use logging::TracingNotificationSurface;
