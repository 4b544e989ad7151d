use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::answer_source::AnswerSource;
use crate::dns_header::{DnsHeader, HEADER_LEN};
use crate::dns_question_and_answer::{parse_questions, DnsAnswer, DnsQuestion};
use crate::error::{DnsError, Result};

/// Largest datagram read from or written to the wire
pub const MAX_PACKET_SIZE: usize = 512;

/// Parse the DNS request from the buffer
/// Takes an immutable borrow of the buffer, returns owned structures
pub fn parse_request(buf: &[u8]) -> Result<(DnsHeader, Vec<DnsQuestion>)> {
    let header = DnsHeader::from_bytes(buf)?;
    let questions = parse_questions(buf, header.question_count);

    if questions.len() < header.question_count as usize {
        debug!(
            declared = header.question_count,
            parsed = questions.len(),
            "question section shorter than header claims"
        );
    }

    Ok((header, questions))
}

/// Build the complete DNS response message.
/// The header's section counts are rewritten to match what is appended.
pub fn build_response(header: &DnsHeader, questions: &[DnsQuestion], answers: &[DnsAnswer]) -> Vec<u8> {
    let header = header.with_counts(questions.len(), answers.len());
    let mut response = BytesMut::with_capacity(MAX_PACKET_SIZE);

    response.put_slice(&header.to_bytes());

    for question in questions {
        response.put_slice(&question.to_bytes());
    }

    for answer in answers {
        response.put_slice(&answer.to_bytes());
    }

    response.to_vec()
}

/// Turn one request datagram into the response datagram.
///
/// Every question is answered in order through `source`. Any failure aborts the whole
/// request so no partial response is ever produced. Requests with a non-standard opcode
/// get RCODE 4 with their questions echoed and no answers.
pub fn resolve(buf: &[u8], source: &AnswerSource) -> Result<Vec<u8>> {
    let (request_header, questions) = parse_request(buf)?;
    let response_header = DnsHeader::response_to(&request_header);

    if !request_header.flags.is_standard_query() {
        debug!(opcode = request_header.flags.opcode, "opcode not implemented");
        return Ok(build_response(&response_header, &questions, &[]));
    }

    let raw_header: &[u8; HEADER_LEN] = buf[..HEADER_LEN]
        .try_into()
        .map_err(|_| DnsError::HeaderTooShort(buf.len()))?;

    let mut answers = Vec::with_capacity(questions.len());
    for question in &questions {
        match source.answer(raw_header, question)? {
            Some(answer) => answers.push(answer),
            None => debug!(%question, "no answer"),
        }
    }

    Ok(build_response(&response_header, &questions, &answers))
}
