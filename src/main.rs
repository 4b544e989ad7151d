mod answer_source;
mod dns_header;
mod dns_message;
mod dns_name;
mod dns_question_and_answer;
mod error;
mod forwarder;
mod local;
mod server;
#[cfg(test)]
mod testing;

use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use forwarder::DEFAULT_UPSTREAM_TIMEOUT;
use local::{LocalAnswers, DEFAULT_STUB_ADDRESS, DEFAULT_STUB_TTL};
use server::{DnsServer, ServerConfig, UpstreamConfig};

#[derive(Parser, Debug)]
#[command(name = "dns-forwarder")]
#[command(about = "Minimal DNS server that answers A queries locally or via an upstream resolver")]
struct Args {
    /// Upstream DNS resolver address (e.g., 8.8.8.8:53)
    #[arg(long)]
    resolver: Option<String>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:2053")]
    bind: String,

    /// How long to wait for each upstream reply, in milliseconds
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT.as_millis() as u64,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Address returned for every query when no resolver is configured
    #[arg(long, default_value_t = DEFAULT_STUB_ADDRESS)]
    stub_address: Ipv4Addr,

    /// TTL of the stub answers, in seconds
    #[arg(long, default_value_t = DEFAULT_STUB_TTL)]
    stub_ttl: u32,

    /// Log level (trace, debug, info, warn, error), RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn resolve_upstream(resolver: &str) -> anyhow::Result<SocketAddr> {
    resolver
        .to_socket_addrs()
        .with_context(|| format!("invalid resolver address {}", resolver))?
        .next()
        .with_context(|| format!("resolver address {} did not resolve", resolver))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    let upstream = match args.resolver.as_deref() {
        Some(resolver) => {
            let addr = resolve_upstream(resolver)?;
            info!("Using resolver: {}", addr);
            Some(UpstreamConfig {
                addr,
                timeout: Duration::from_millis(args.timeout_ms),
            })
        }
        None => None,
    };

    let server = DnsServer::new(ServerConfig {
        bind_addr: args.bind,
        upstream,
        stub: LocalAnswers::new(args.stub_address, args.stub_ttl),
    })?;
    info!("Listening on {}", server.local_addr()?);

    server.run()
}
