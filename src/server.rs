use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::answer_source::AnswerSource;
use crate::dns_message::{resolve, MAX_PACKET_SIZE};
use crate::error::Result;
use crate::forwarder::Forwarder;
use crate::local::LocalAnswers;

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub addr: SocketAddr,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Forward to this resolver; without it every query gets the stub answer
    pub upstream: Option<UpstreamConfig>,
    pub stub: LocalAnswers,
}

/// DNS Server that handles incoming DNS requests one at a time
pub struct DnsServer {
    socket: UdpSocket,
    source: AnswerSource,
}

impl DnsServer {
    /// Create a new DNS server bound to the configured address
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

        let source = match config.upstream {
            Some(upstream) => {
                let forwarder = Forwarder::new(upstream.addr, upstream.timeout)
                    .context("failed to set up upstream socket")?;
                debug!(local = ?forwarder.local_addr(), "upstream socket bound");
                AnswerSource::Forward(forwarder)
            }
            None => AnswerSource::Stub(config.stub),
        };

        Ok(Self { socket, source })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the DNS server main loop.
    /// Only a failure to receive on the client socket ends it.
    pub fn run(&self) -> anyhow::Result<()> {
        info!(answers = %self.source, "serving DNS requests");

        loop {
            self.serve_one()?;
        }
    }

    /// Receive one datagram, answer it and send the response back to its source.
    /// Requests that cannot be answered are logged and dropped without a reply.
    pub fn serve_one(&self) -> anyhow::Result<()> {
        let mut buf = [0u8; MAX_PACKET_SIZE];

        let (size, source) = self
            .socket
            .recv_from(&mut buf)
            .context("failed to receive from client socket")?;
        debug!(%source, bytes = size, "received request");

        match self.handle_request(&buf[..size]) {
            Ok(response) => match self.socket.send_to(&response, source) {
                Ok(sent) => debug!(%source, bytes = sent, "sent response"),
                Err(e) => error!(%source, "failed to send response: {}", e),
            },
            Err(e) if e.is_malformed_request() => {
                warn!(%source, "dropping malformed request: {}", e)
            }
            Err(e) => warn!(%source, "dropping request: {}", e),
        }

        Ok(())
    }

    /// Handle a DNS request: parse, resolve, and build response
    fn handle_request(&self, buf: &[u8]) -> Result<Vec<u8>> {
        resolve(buf, &self.source)
    }
}
