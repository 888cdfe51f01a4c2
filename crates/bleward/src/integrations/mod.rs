//! External collaborators: device discovery and outbound notifications.

pub mod notify;
pub mod scanner;
