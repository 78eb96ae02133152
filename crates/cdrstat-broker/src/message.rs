//! Broker messages
//!
//! A message is an opaque body plus the metadata the request/reply protocol
//! relies on. The correlation id and reply destination never live in the body.

use bytes::Bytes;

/// Message metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// Token linking a reply to its request
    pub correlation_id: Option<String>,

    /// Queue the reply should be published to
    pub reply_to: Option<String>,

    /// MIME type of the body
    pub content_type: Option<String>,
}

/// A message as published to or delivered from a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: Bytes,
    pub properties: MessageProperties,
}

impl Message {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            properties: MessageProperties::default(),
        }
    }

    /// A message with a JSON body
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::new(body).with_content_type("application/json")
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.properties.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.properties.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.properties.content_type = Some(content_type.into());
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.properties.correlation_id.as_deref()
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.properties.reply_to.as_deref()
    }
}
