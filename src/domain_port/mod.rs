mod backend_transport;
mod credential_store;

pub use backend_transport::*;
pub use credential_store::*;
