mod credential_store_redis;

pub use credential_store_redis::*;
