//! Server configuration.

use loglens_core::HubDesc;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

// constants
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STATIC_DIR: &str = "web";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5000;

/// everything needed to run the HTTP surface, hub sizing included
#[derive(Debug, Clone)]
pub struct ServerDesc {
    pub bind_addr: SocketAddr,
    /// directory served for every path that is not an API route
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// longest a single websocket frame write may take before the viewer is dropped
    pub write_timeout: Duration,
    pub hub: HubDesc,
}

impl Default for ServerDesc {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            hub: HubDesc::default(),
        }
    }
}
