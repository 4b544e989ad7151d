use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while turning one request datagram into a response
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("buffer too small for DNS header: {0} bytes")]
    HeaderTooShort(usize),

    #[error("domain name starting at offset {0} has no terminating zero label")]
    UnterminatedName(usize),

    #[error("buffer too small for {what} at offset {offset}")]
    Truncated { what: &'static str, offset: usize },

    #[error("upstream {addr} did not reply within {timeout:?}")]
    UpstreamTimeout { addr: SocketAddr, timeout: Duration },

    #[error("upstream {addr} exchange failed: {source}")]
    Upstream {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("upstream {addr} sent a malformed reply: {source}")]
    MalformedReply {
        addr: SocketAddr,
        #[source]
        source: Box<DnsError>,
    },
}

impl DnsError {
    /// Malformed input from the client, as opposed to a failure talking to the upstream
    pub fn is_malformed_request(&self) -> bool {
        matches!(
            self,
            DnsError::HeaderTooShort(_) | DnsError::UnterminatedName(_) | DnsError::Truncated { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DnsError>;
