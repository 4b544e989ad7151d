use std::net::Ipv4Addr;

use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion};

pub const DEFAULT_STUB_ADDRESS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
pub const DEFAULT_STUB_TTL: u32 = 60;

/// Canned answers used when no upstream resolver is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAnswers {
    pub address: Ipv4Addr,
    pub ttl: u32,
}

impl Default for LocalAnswers {
    fn default() -> Self {
        LocalAnswers {
            address: DEFAULT_STUB_ADDRESS,
            ttl: DEFAULT_STUB_TTL,
        }
    }
}

impl LocalAnswers {
    pub fn new(address: Ipv4Addr, ttl: u32) -> Self {
        LocalAnswers { address, ttl }
    }

    /// Every question gets an A record for the configured address
    pub fn answer(&self, question: &DnsQuestion) -> DnsAnswer {
        DnsAnswer::new_a_record(question.name.clone(), self.ttl, self.address)
    }
}
