use bytes::{Buf, BufMut};

use crate::error::{DnsError, Result};

pub const HEADER_LEN: usize = 12;

/// RCODE returned for any opcode other than a standard query
pub const RCODE_NOT_IMPLEMENTED: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: DnsFlags,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

// Flag word layout, most significant bit first:
// QR(15) OPCODE(11-14) AA(10) TC(9) RD(8) RA(7) Z(4-6) RCODE(0-3)
const QR_BIT: u16 = 0x8000;
const AA_BIT: u16 = 0x0400;
const TC_BIT: u16 = 0x0200;
const RD_BIT: u16 = 0x0100;
const RA_BIT: u16 = 0x0080;
const OPCODE_SHIFT: u16 = 11;
const OPCODE_MASK: u16 = 0xF;
const Z_SHIFT: u16 = 4;
const Z_MASK: u16 = 0x7;
const RCODE_MASK: u16 = 0xF;

/// The header's second 16-bit word, split into its named fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsFlags {
    pub qr: bool,
    pub opcode: u8, // 0 = standard query
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8, // 4 = not implemented
}

impl DnsFlags {
    pub fn to_u16(&self) -> u16 {
        [
            (self.qr, QR_BIT),
            (self.aa, AA_BIT),
            (self.tc, TC_BIT),
            (self.rd, RD_BIT),
            (self.ra, RA_BIT),
        ]
        .into_iter()
        .filter(|&(set, _)| set)
        .fold(0, |word, (_, bit)| word | bit)
            | (u16::from(self.opcode) & OPCODE_MASK) << OPCODE_SHIFT
            | (u16::from(self.z) & Z_MASK) << Z_SHIFT
            | u16::from(self.rcode) & RCODE_MASK
    }

    pub fn from_u16(word: u16) -> Self {
        let field = |shift: u16, mask: u16| ((word >> shift) & mask) as u8;

        DnsFlags {
            qr: word & QR_BIT != 0,
            opcode: field(OPCODE_SHIFT, OPCODE_MASK),
            aa: word & AA_BIT != 0,
            tc: word & TC_BIT != 0,
            rd: word & RD_BIT != 0,
            ra: word & RA_BIT != 0,
            z: field(Z_SHIFT, Z_MASK),
            rcode: field(0, RCODE_MASK),
        }
    }

    pub fn is_standard_query(&self) -> bool {
        self.opcode == 0
    }
}

impl DnsHeader {
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DnsError::HeaderTooShort(bytes.len()));
        }

        Ok(DnsHeader {
            id: bytes.get_u16(),
            flags: DnsFlags::from_u16(bytes.get_u16()),
            question_count: bytes.get_u16(),
            answer_count: bytes.get_u16(),
            authority_count: bytes.get_u16(),
            additional_count: bytes.get_u16(),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        let mut buf = &mut bytes[..];

        buf.put_u16(self.id);
        buf.put_u16(self.flags.to_u16());
        buf.put_u16(self.question_count);
        buf.put_u16(self.answer_count);
        buf.put_u16(self.authority_count);
        buf.put_u16(self.additional_count);

        bytes
    }

    /// Derive the response header skeleton for a request.
    ///
    /// The answer count starts out as the request's question count; the final
    /// counts are fixed by [`DnsHeader::with_counts`] once the answers are known.
    pub fn response_to(request: &DnsHeader) -> Self {
        let request_flags = request.flags;

        let response_flags = DnsFlags {
            qr: true,
            opcode: request_flags.opcode,
            aa: request_flags.aa,
            tc: request_flags.tc,
            rd: request_flags.rd,
            ra: false,
            z: 0,
            rcode: if request_flags.is_standard_query() { 0 } else { RCODE_NOT_IMPLEMENTED },
        };

        DnsHeader {
            id: request.id,
            flags: response_flags,
            question_count: request.question_count,
            answer_count: request.question_count,
            authority_count: 0,
            additional_count: 0,
        }
    }

    /// Set the section counts to what is actually written after this header
    pub fn with_counts(self, questions: usize, answers: usize) -> Self {
        DnsHeader {
            question_count: questions as u16,
            answer_count: answers as u16,
            authority_count: 0,
            additional_count: 0,
            ..self
        }
    }
}
