use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DnsError, Result};

/// A domain name kept in its wire form: length-prefixed labels ending with a zero byte.
///
/// Compression pointers are never interpreted. A name that contains one is carried
/// byte-for-byte as if the pointer were part of a literal label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainName(Bytes);

impl DomainName {
    /// Encode a dotted name such as "example.com" -> [7]example[3]com[0]
    ///
    /// Empty labels are skipped, so "." and "" both encode to the root name [0].
    /// Label and total name lengths are not checked against the 63/255 byte limits, but a
    /// label longer than a length byte can express is cut to its first 255 bytes so the
    /// prefix always matches the bytes that follow it.
    pub fn encode(domain: &str) -> Self {
        let mut encoded = BytesMut::with_capacity(domain.len() + 2);

        for label in domain.split('.').filter(|label| !label.is_empty()) {
            let label = label.as_bytes();
            let length = u8::try_from(label.len()).unwrap_or(u8::MAX);
            encoded.put_u8(length);
            encoded.put_slice(&label[..length as usize]);
        }
        encoded.put_u8(0);

        DomainName(encoded.freeze())
    }

    /// Copy the raw name starting at `offset` up to and including the first zero byte.
    /// Returns the name and the number of bytes consumed.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let rest = bytes
            .get(offset..)
            .ok_or(DnsError::UnterminatedName(offset))?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DnsError::UnterminatedName(offset))?;

        let consumed = end + 1;
        Ok((DomainName(Bytes::copy_from_slice(&rest[..consumed])), consumed))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the labels as a dotted string, "." for the root name.
    /// Labels running past the terminator are cut short rather than rejected.
    pub fn to_dotted(&self) -> String {
        let mut labels = Vec::new();
        let mut rest = &self.0[..];

        while let Some((&length, tail)) = rest.split_first() {
            if length == 0 {
                break;
            }
            let take = (length as usize).min(tail.len());
            labels.push(String::from_utf8_lossy(&tail[..take]).into_owned());
            rest = &tail[take..];
        }

        if labels.is_empty() {
            ".".to_string()
        } else {
            labels.join(".")
        }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}
