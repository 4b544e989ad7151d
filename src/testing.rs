//! Loopback fake upstream resolver shared by the unit tests.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};

use crate::dns_header::{DnsFlags, DnsHeader, HEADER_LEN};
use crate::dns_message::MAX_PACKET_SIZE;
use crate::dns_name::DomainName;
use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion};

/// Reply to a single-question query with one A record, or with no answers.
pub fn upstream_reply(query: &[u8], address: Option<Ipv4Addr>) -> Vec<u8> {
    let request = DnsHeader::from_bytes(query).unwrap();
    let (question, _) = DnsQuestion::from_bytes(query, HEADER_LEN).unwrap();

    let header = DnsHeader {
        id: request.id,
        flags: DnsFlags::from_u16(0x8180),
        question_count: 1,
        answer_count: address.is_some() as u16,
        authority_count: 0,
        additional_count: 0,
    };

    let mut reply = header.to_bytes().to_vec();
    reply.extend_from_slice(&question.to_bytes());
    if let Some(address) = address {
        let answer = DnsAnswer::new_a_record(question.name.clone(), 300, address);
        reply.extend_from_slice(&answer.to_bytes());
    }
    reply
}

/// Serve `count` queries on a loopback socket, resolving each question name with `resolve`.
/// The thread hands back the raw queries it received.
pub fn spawn_upstream<F>(count: usize, resolve: F) -> (SocketAddr, JoinHandle<Vec<Vec<u8>>>)
where
    F: Fn(&str) -> Option<Ipv4Addr> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = socket.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let mut queries = Vec::new();
        let mut buf = [0u8; MAX_PACKET_SIZE];

        for _ in 0..count {
            let (size, source) = socket.recv_from(&mut buf).unwrap();
            let query = buf[..size].to_vec();
            let (name, _) = DomainName::decode(&query, HEADER_LEN).unwrap();

            let reply = upstream_reply(&query, resolve(&name.to_dotted()));
            socket.send_to(&reply, source).unwrap();
            queries.push(query);
        }

        queries
    });

    (addr, handle)
}
