use std::fmt;

use crate::dns_header::HEADER_LEN;
use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion};
use crate::error::Result;
use crate::forwarder::Forwarder;
use crate::local::LocalAnswers;

/// Where answers come from, picked once at startup
#[derive(Debug)]
pub enum AnswerSource {
    /// No upstream configured, every question gets the same canned A record
    Stub(LocalAnswers),
    /// Each question is relayed to the upstream resolver on its own
    Forward(Forwarder),
}

impl AnswerSource {
    /// Answer one question of a request whose raw header is `request_header`
    pub fn answer(
        &self,
        request_header: &[u8; HEADER_LEN],
        question: &DnsQuestion,
    ) -> Result<Option<DnsAnswer>> {
        match self {
            AnswerSource::Stub(local) => Ok(Some(local.answer(question))),
            AnswerSource::Forward(forwarder) => forwarder.exchange(request_header, question),
        }
    }
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerSource::Stub(local) => {
                write!(f, "stub ({} ttl {}s)", local.address, local.ttl)
            }
            AnswerSource::Forward(forwarder) => write!(f, "forwarding to {}", forwarder.upstream()),
        }
    }
}
