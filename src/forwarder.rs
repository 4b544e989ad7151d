use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::dns_header::HEADER_LEN;
use crate::dns_message::MAX_PACKET_SIZE;
use crate::dns_question_and_answer::{parse_upstream_reply, DnsAnswer, DnsQuestion};
use crate::error::{DnsError, Result};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a DNS query with a single question to send to the upstream resolver.
/// The request's header bytes go out unmodified, followed by the one question.
pub fn build_single_question_query(request_header: &[u8; HEADER_LEN], question: &DnsQuestion) -> Bytes {
    let question_bytes = question.to_bytes();
    let mut query = BytesMut::with_capacity(HEADER_LEN + question_bytes.len());

    query.put_slice(request_header);
    query.put_slice(&question_bytes);

    query.freeze()
}

/// Relays single-question queries to an upstream resolver.
///
/// Upstream traffic uses its own socket, never the one facing clients. A reply is only
/// accepted when it comes from the upstream address, carries the query's id and echoes
/// the question that was sent. All questions of one request share an id, so a late or
/// duplicated reply to an earlier question is told apart by its echoed question.
#[derive(Debug)]
pub struct Forwarder {
    socket: UdpSocket,
    upstream: SocketAddr,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: SocketAddr, timeout: Duration) -> Result<Self> {
        let bind_addr: SocketAddr = if upstream.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).map_err(|source| DnsError::Upstream {
            addr: upstream,
            source,
        })?;

        Ok(Self {
            socket,
            upstream,
            timeout,
        })
    }

    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send one question upstream and wait for its reply, at most `timeout` in total.
    /// Returns the first answer of the reply, `None` when the upstream had none.
    pub fn exchange(
        &self,
        request_header: &[u8; HEADER_LEN],
        question: &DnsQuestion,
    ) -> Result<Option<DnsAnswer>> {
        let query = build_single_question_query(request_header, question);

        self.socket
            .send_to(&query, self.upstream)
            .map_err(|e| self.io_error(e))?;
        debug!(upstream = %self.upstream, %question, "forwarded question");

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; MAX_PACKET_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error());
            }
            self.socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| self.io_error(e))?;

            let (size, source) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(self.timeout_error());
                }
                Err(e) => return Err(self.io_error(e)),
            };

            if source != self.upstream {
                debug!(%source, "ignoring datagram from unexpected source");
                continue;
            }
            if size < 2 || buf[..2] != request_header[..2] {
                debug!(%source, bytes = size, "ignoring reply with mismatched id");
                continue;
            }

            let reply = parse_upstream_reply(&buf[..size]).map_err(|e| DnsError::MalformedReply {
                addr: self.upstream,
                source: Box::new(e),
            })?;
            if !reply.is_reply_to(question) {
                debug!(%source, %question, "ignoring reply to another question");
                continue;
            }

            return Ok(reply.answer);
        }
    }

    fn io_error(&self, source: io::Error) -> DnsError {
        DnsError::Upstream {
            addr: self.upstream,
            source,
        }
    }

    fn timeout_error(&self) -> DnsError {
        DnsError::UpstreamTimeout {
            addr: self.upstream,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_header::{DnsFlags, DnsHeader};
    use crate::testing::{spawn_upstream, upstream_reply};

    fn request_header(id: u16, question_count: u16) -> [u8; HEADER_LEN] {
        DnsHeader {
            id,
            flags: DnsFlags::from_u16(0x0100),
            question_count,
            answer_count: 0,
            authority_count: 0,
            additional_count: 0,
        }
        .to_bytes()
    }

    #[test]
    fn test_single_question_query_keeps_request_header() {
        let header = request_header(0x1234, 2);
        let question = DnsQuestion::new_a_question("b.com");

        let query = build_single_question_query(&header, &question);
        assert_eq!(&query[..HEADER_LEN], &header);
        assert_eq!(&query[HEADER_LEN..], &question.to_bytes()[..]);
    }

    #[test]
    fn test_exchange_returns_upstream_answer() {
        let (upstream, handle) = spawn_upstream(1, |_| Some(Ipv4Addr::new(1, 2, 3, 4)));
        let forwarder = Forwarder::new(upstream, Duration::from_secs(5)).unwrap();
        let question = DnsQuestion::new_a_question("a.com");

        let answer = forwarder
            .exchange(&request_header(0x1234, 1), &question)
            .unwrap()
            .unwrap();
        assert_eq!(answer.name, question.name);
        assert_eq!(&answer.rdata[..], &[1, 2, 3, 4]);

        let queries = handle.join().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(&queries[0][..HEADER_LEN], &request_header(0x1234, 1));
    }

    #[test]
    fn test_exchange_without_upstream_answer() {
        let (upstream, handle) = spawn_upstream(1, |_| None);
        let forwarder = Forwarder::new(upstream, Duration::from_secs(5)).unwrap();

        let answer = forwarder
            .exchange(&request_header(9, 1), &DnsQuestion::new_a_question("nx.example"))
            .unwrap();
        assert_eq!(answer, None);
        handle.join().unwrap();
    }

    #[test]
    fn test_exchange_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let upstream = silent.local_addr().unwrap();
        let forwarder = Forwarder::new(upstream, Duration::from_millis(100)).unwrap();

        let started = Instant::now();
        let result = forwarder.exchange(&request_header(1, 1), &DnsQuestion::new_a_question("a.com"));
        assert!(matches!(result, Err(DnsError::UpstreamTimeout { addr, .. }) if addr == upstream));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_exchange_ignores_strays_and_mismatched_ids() {
        let upstream_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let upstream = upstream_socket.local_addr().unwrap();
        let forwarder = Forwarder::new(upstream, Duration::from_secs(5)).unwrap();
        let forwarder_port = forwarder.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (size, source) = upstream_socket.recv_from(&mut buf).unwrap();
            assert_eq!(source.port(), forwarder_port);
            let query = &buf[..size];

            // a datagram from some other peer
            let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();
            stranger
                .send_to(&upstream_reply(query, Some(Ipv4Addr::new(6, 6, 6, 6))), source)
                .unwrap();

            // right peer, wrong transaction id
            let mut wrong_id = upstream_reply(query, Some(Ipv4Addr::new(7, 7, 7, 7)));
            wrong_id[0] ^= 0xff;
            upstream_socket.send_to(&wrong_id, source).unwrap();

            upstream_socket
                .send_to(&upstream_reply(query, Some(Ipv4Addr::new(1, 1, 1, 1))), source)
                .unwrap();
        });

        let answer = forwarder
            .exchange(&request_header(0x4242, 1), &DnsQuestion::new_a_question("a.com"))
            .unwrap()
            .unwrap();
        assert_eq!(&answer.rdata[..], &[1, 1, 1, 1]);
        handle.join().unwrap();
    }

    #[test]
    fn test_exchange_malformed_reply() {
        let upstream_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let upstream = upstream_socket.local_addr().unwrap();
        let forwarder = Forwarder::new(upstream, Duration::from_secs(5)).unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (size, source) = upstream_socket.recv_from(&mut buf).unwrap();
            // header claims an answer that is not there
            let mut reply = buf[..size].to_vec();
            reply[7] = 1;
            upstream_socket.send_to(&reply, source).unwrap();
        });

        let result = forwarder.exchange(&request_header(3, 1), &DnsQuestion::new_a_question("a.com"));
        assert!(matches!(result, Err(DnsError::MalformedReply { .. })));
        handle.join().unwrap();
    }

    #[test]
    fn test_exchange_skips_replies_to_other_questions() {
        let upstream_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let upstream = upstream_socket.local_addr().unwrap();
        let forwarder = Forwarder::new(upstream, Duration::from_secs(5)).unwrap();
        let header = request_header(0x1234, 2);

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            for address in [Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2)] {
                let (size, source) = upstream_socket.recv_from(&mut buf).unwrap();
                let reply = upstream_reply(&buf[..size], Some(address));
                // the first reply goes out twice, same id as the second query
                if address.octets()[0] == 1 {
                    upstream_socket.send_to(&reply, source).unwrap();
                }
                upstream_socket.send_to(&reply, source).unwrap();
            }
        });

        let first = forwarder
            .exchange(&header, &DnsQuestion::new_a_question("a.com"))
            .unwrap()
            .unwrap();
        let second = forwarder
            .exchange(&header, &DnsQuestion::new_a_question("b.com"))
            .unwrap()
            .unwrap();
        handle.join().unwrap();

        assert_eq!(first.name.to_dotted(), "a.com");
        assert_eq!(&first.rdata[..], &[1, 1, 1, 1]);
        assert_eq!(second.name.to_dotted(), "b.com");
        assert_eq!(&second.rdata[..], &[2, 2, 2, 2]);
    }
}
