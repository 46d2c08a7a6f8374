pub mod ip;

pub use ip::{extract_client_ip, extract_forwarded_ip_from_headers, normalize_ip};
