mod credential;
mod headers;
mod request;
mod response;
mod session;

pub use credential::*;
pub use headers::*;
pub use request::*;
pub use response::*;
pub use session::*;
