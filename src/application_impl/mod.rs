mod authenticated_client;
mod refresh_coordinator;
mod session_events;

pub use authenticated_client::*;
pub use refresh_coordinator::*;
pub use session_events::*;
