mod backend_transport_reqwest;

pub use backend_transport_reqwest::*;
