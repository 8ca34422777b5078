pub mod address;
pub mod ip_cache;

pub use address::{is_valid, ClientIp};
pub use ip_cache::{CacheRecord, CountryResponse, ErrorResponse};
