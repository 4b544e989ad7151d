use std::fmt;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::dns_header::{DnsHeader, HEADER_LEN};
use crate::dns_name::DomainName;
use crate::error::{DnsError, Result};

/// DNS Question Section
/// Format: QNAME + QTYPE (2 bytes) + QCLASS (2 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: DomainName, // Wire-encoded domain name
    pub qtype: u16,       // Query type (only A is answered)
    pub qclass: u16,      // Query class (only IN is answered)
}

/// DNS Answer/Resource Record Section
/// Format: NAME + TYPE (2 bytes) + CLASS (2 bytes) + TTL (4 bytes) + RDLENGTH (2 bytes) + RDATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub name: DomainName, // Wire-encoded domain name
    pub rtype: u16,       // Record type
    pub rclass: u16,      // Record class
    pub ttl: u32,         // Time to live in seconds
    pub rdlength: u16,    // Length of RDATA field
    pub rdata: Bytes,     // Resource data, the IPv4 address for an A record
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A = 1, // IPv4 address
}

impl RecordType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordType::A),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    IN = 1, // Internet
}

impl RecordClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordClass::IN),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl DnsQuestion {
    pub fn new_a_question(domain: &str) -> Self {
        DnsQuestion {
            name: DomainName::encode(domain),
            qtype: RecordType::A.to_u16(),
            qclass: RecordClass::IN.to_u16(),
        }
    }

    /// Parse a DNS question from bytes starting at the given offset
    /// Returns the question and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, consumed) = DomainName::decode(bytes, offset)?;
        let fields_offset = offset + consumed;

        let mut rest = &bytes[fields_offset..];
        if rest.remaining() < 4 {
            return Err(DnsError::Truncated {
                what: "question type and class",
                offset: fields_offset,
            });
        }

        let qtype = rest.get_u16();
        let qclass = rest.get_u16();

        Ok((DnsQuestion { name, qtype, qclass }, fields_offset + 4))
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(self.name.len() + 4);

        bytes.put_slice(self.name.as_bytes());
        bytes.put_u16(self.qtype);
        bytes.put_u16(self.qclass);

        bytes.freeze()
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.name)?;
        match RecordType::from_u16(self.qtype) {
            Some(rtype) => write!(f, "{:?}", rtype)?,
            None => write!(f, "TYPE{}", self.qtype)?,
        }
        match RecordClass::from_u16(self.qclass) {
            Some(rclass) => write!(f, " {:?}", rclass),
            None => write!(f, " CLASS{}", self.qclass),
        }
    }
}

/// Parse up to `count` questions from a message, starting right after the header.
///
/// Parsing stops quietly at the first question that is cut short, so a message whose
/// question section is shorter than its header claims yields fewer questions.
pub fn parse_questions(bytes: &[u8], count: u16) -> Vec<DnsQuestion> {
    let mut questions = Vec::with_capacity(count as usize);
    let mut offset = HEADER_LEN;

    while questions.len() < count as usize && offset < bytes.len() {
        match DnsQuestion::from_bytes(bytes, offset) {
            Ok((question, new_offset)) => {
                questions.push(question);
                offset = new_offset;
            }
            Err(_) => break,
        }
    }

    questions
}

impl DnsAnswer {
    /// Parse a DNS answer/resource record from bytes starting at the given offset
    /// Returns the answer and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, consumed) = DomainName::decode(bytes, offset)?;
        let fields_offset = offset + consumed;

        let mut rest = &bytes[fields_offset..];
        if rest.remaining() < 10 {
            return Err(DnsError::Truncated {
                what: "answer fields",
                offset: fields_offset,
            });
        }

        let rtype = rest.get_u16();
        let rclass = rest.get_u16();
        let ttl = rest.get_u32();
        let rdlength = rest.get_u16();

        let data_offset = fields_offset + 10;
        if rest.remaining() < rdlength as usize {
            return Err(DnsError::Truncated {
                what: "RDATA",
                offset: data_offset,
            });
        }
        let rdata = rest.copy_to_bytes(rdlength as usize);

        Ok((
            DnsAnswer {
                name,
                rtype,
                rclass,
                ttl,
                rdlength,
                rdata,
            },
            data_offset + rdlength as usize,
        ))
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(self.name.len() + 10 + self.rdata.len());

        bytes.put_slice(self.name.as_bytes());
        bytes.put_u16(self.rtype);
        bytes.put_u16(self.rclass);
        bytes.put_u32(self.ttl);
        bytes.put_u16(self.rdlength);
        bytes.put_slice(&self.rdata);

        bytes.freeze()
    }

    /// Create a new DNS answer, RDLENGTH is taken from the data
    pub fn new(name: DomainName, rtype: u16, rclass: u16, ttl: u32, rdata: Bytes) -> Self {
        let rdlength = rdata.len() as u16;
        DnsAnswer {
            name,
            rtype,
            rclass,
            ttl,
            rdlength,
            rdata,
        }
    }

    /// Create an A record (IPv4 address) answer
    pub fn new_a_record(name: DomainName, ttl: u32, ip: Ipv4Addr) -> Self {
        Self::new(
            name,
            RecordType::A.to_u16(),
            RecordClass::IN.to_u16(),
            ttl,
            Bytes::copy_from_slice(&ip.octets()),
        )
    }
}

/// What an upstream reply to a single-question query carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub question: Option<DnsQuestion>, // Echoed question, absent when QDCOUNT is 0
    pub answer: Option<DnsAnswer>,     // First resource record, absent when ANCOUNT is 0
}

impl UpstreamReply {
    /// False when the upstream echoed a different question than `question`.
    /// A reply that echoes nothing cannot be told apart and is taken as a match.
    pub fn is_reply_to(&self, question: &DnsQuestion) -> bool {
        self.question.as_ref().map_or(true, |echoed| echoed == question)
    }
}

/// Decode an upstream reply to a single-question query.
///
/// Only the first echoed question and the first answer are decoded; any further
/// records are ignored.
pub fn parse_upstream_reply(reply: &[u8]) -> Result<UpstreamReply> {
    let header = DnsHeader::from_bytes(reply)?;

    let mut offset = HEADER_LEN;
    let mut question = None;
    if header.question_count > 0 {
        let (echoed, new_offset) = DnsQuestion::from_bytes(reply, offset)?;
        question = Some(echoed);
        offset = new_offset;
    }

    let answer = match header.answer_count {
        0 => None,
        _ => Some(DnsAnswer::from_bytes(reply, offset)?.0),
    };

    Ok(UpstreamReply { question, answer })
}
