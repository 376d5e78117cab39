mod backend_transport_fake;

pub use backend_transport_fake::*;
