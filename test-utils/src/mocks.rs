//! Mock implementations for testing.
//!
//! [`MockTransport`] stands in for the HTTP layer of a resilient client. It
//! replays a scripted sequence of replies and records every request it sees.

use std::collections::VecDeque;
use std::future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use microservices_common::{CommonError, CommonResult, HttpTransport, OutboundRequest, RawResponse};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a status and body
    Respond {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
    /// Never answer, so the caller's timeout fires
    Hang,
    /// Fail at the transport level, as a refused connection would
    Fail,
}

impl MockReply {
    /// `200` with the given JSON body.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Respond {
            status: 200,
            body: body.into(),
        }
    }

    /// Arbitrary status and body.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug)]
struct Script {
    queued: VecDeque<MockReply>,
    fallback: MockReply,
    requests: Vec<OutboundRequest>,
}

/// Scripted [`HttpTransport`].
///
/// Replies are taken from the queue in order; once it is empty the fallback
/// reply is used for every further request. Clones share the same script.
#[derive(Debug, Clone)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    /// Transport that always gives `fallback`.
    #[must_use]
    pub fn always(fallback: MockReply) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                queued: VecDeque::new(),
                fallback,
                requests: Vec::new(),
            })),
        }
    }

    /// Transport that never answers.
    #[must_use]
    pub fn hanging() -> Self {
        Self::always(MockReply::Hang)
    }

    /// Queue replies to use before the fallback.
    #[must_use]
    pub fn then(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.lock().queued.extend(replies);
        self
    }

    /// Replace the fallback reply.
    pub fn set_fallback(&self, reply: MockReply) {
        self.lock().fallback = reply;
    }

    /// Number of requests received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Requests received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_reply(&self, request: &OutboundRequest) -> MockReply {
        let mut script = self.lock();
        script.requests.push(request.clone());
        script.queued.pop_front().unwrap_or_else(|| script.fallback.clone())
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &OutboundRequest) -> CommonResult<RawResponse> {
        match self.next_reply(request) {
            MockReply::Respond { status, body } => Ok(RawResponse::new(status, body)),
            MockReply::Fail => Err(CommonError::request_failed(None, "connection refused")),
            MockReply::Hang => future::pending().await,
        }
    }
}
