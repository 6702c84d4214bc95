//! SMTP session state machine — sequences MAIL/RCPT/DATA and drives the
//! extraction pipeline into the dispatch sink.
//!
//! One session per connection; commands within a session are strictly
//! sequential, so no internal synchronization is needed.

use std::net::IpAddr;
use std::sync::Arc;

use mail_parser::MessageParser;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{DataError, SessionError};
use crate::extract;
use crate::notification::{self, Notification};
use crate::topic::{self, TopicPolicy};

/// Who the connection authenticated as. Policy checks branch on this
/// tag rather than on separate session types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { username: String },
}

/// Session lifecycle. A delivered message loops straight back to
/// `Idle` so the connection can carry further messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    HasSender,
    HasRecipient,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::HasSender => "has-sender",
            SessionState::HasRecipient => "has-recipient",
        }
    }
}

/// Creates sessions for inbound connections, carrying the per-process
/// policy and the dispatch sink.
pub struct Backend {
    policy: TopicPolicy,
    max_body_bytes: usize,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Backend {
    pub fn new(config: &Config, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            policy: config.topic_policy(),
            max_body_bytes: config.max_body_bytes,
            dispatcher,
        }
    }

    /// New session for an authenticated connection.
    pub fn login(&self, remote: IpAddr, username: impl Into<String>) -> Session {
        self.session(
            remote,
            Identity::Authenticated {
                username: username.into(),
            },
        )
    }

    /// New session for an anonymous connection.
    pub fn anonymous_login(&self, remote: IpAddr) -> Session {
        self.session(remote, Identity::Anonymous)
    }

    fn session(&self, remote: IpAddr, identity: Identity) -> Session {
        Session {
            remote,
            identity,
            state: SessionState::Idle,
            from: None,
            topic: None,
            policy: self.policy.clone(),
            max_body_bytes: self.max_body_bytes,
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// One SMTP mail transaction endpoint. Attributes are populated
/// strictly in MAIL → RCPT → DATA order; dropping the session abandons
/// any in-flight message without dispatching.
pub struct Session {
    remote: IpAddr,
    identity: Identity,
    state: SessionState,
    from: Option<String>,
    topic: Option<String>,
    policy: TopicPolicy,
    max_body_bytes: usize,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn remote(&self) -> IpAddr {
        self.remote
    }

    /// MAIL — record the sender. Well-formedness of the address is the
    /// protocol engine's job.
    pub fn mail(&mut self, from: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.bad_sequence("MAIL"));
        }
        self.from = Some(from.to_string());
        self.state = SessionState::HasSender;
        Ok(())
    }

    /// RCPT — resolve the recipient to a topic. On resolver error the
    /// session state is untouched, so the client may retry.
    pub fn rcpt(&mut self, to: &str) -> Result<(), SessionError> {
        if self.state != SessionState::HasSender && self.state != SessionState::HasRecipient {
            return Err(self.bad_sequence("RCPT"));
        }
        // Domain and prefix are enforced the same way for anonymous and
        // authenticated sessions.
        let topic = topic::resolve(to, &self.policy, |t| self.dispatcher.is_valid_topic(t))?;
        tracing::debug!(remote = %self.remote, %topic, "recipient resolved");
        self.topic = Some(topic);
        self.state = SessionState::HasRecipient;
        Ok(())
    }

    /// DATA — parse the raw message, run the extraction pipeline, and
    /// dispatch the notification. Dispatch happens at most once, only
    /// after every prior stage succeeded.
    ///
    /// The transaction ends here either way: success or pipeline error,
    /// the session loops back to `Idle` so the client can start a new
    /// message with MAIL.
    pub async fn data(&mut self, raw: &[u8]) -> Result<(), SessionError> {
        if self.state != SessionState::HasRecipient {
            return Err(self.bad_sequence("DATA"));
        }
        let Some(topic) = self.topic.clone() else {
            return Err(self.bad_sequence("DATA"));
        };

        let result = self.deliver(topic, raw).await;
        self.reset();
        result.map_err(SessionError::Data)
    }

    async fn deliver(&self, topic: String, raw: &[u8]) -> Result<(), DataError> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or(DataError::Parse)?;
        let text = extract::extract(&message)?;
        let subject = message.subject().unwrap_or("");

        let (title, body) = notification::normalize(subject, &text);
        let body = notification::truncate(body, self.max_body_bytes);
        let notification = Notification { topic, title, body };

        self.dispatcher.send(&notification).await?;

        tracing::info!(
            remote = %self.remote,
            topic = %notification.topic,
            bytes = notification.body.len(),
            "message published"
        );
        Ok(())
    }

    /// Clear the transaction back to `Idle` (RSET, or reuse after a
    /// delivered message).
    pub fn reset(&mut self) {
        self.from = None;
        self.topic = None;
        self.state = SessionState::Idle;
    }

    fn bad_sequence(&self, command: &'static str) -> SessionError {
        SessionError::BadSequence {
            command,
            state: self.state.name(),
        }
    }
}
