use crate::domain::ContactMessage as DomainContactMessage;
use async_graphql::{Object, SimpleObject, ID};
use chrono::{DateTime, Utc};

/// GraphQL representation of a ContactMessage
#[derive(Clone)]
pub struct ContactMessage {
    pub inner: DomainContactMessage,
}

impl From<DomainContactMessage> for ContactMessage {
    fn from(message: DomainContactMessage) -> Self {
        Self { inner: message }
    }
}

#[Object]
impl ContactMessage {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }

    async fn email(&self) -> Option<&str> {
        self.inner.email.as_deref()
    }

    async fn phone(&self) -> Option<&str> {
        self.inner.phone.as_deref()
    }

    async fn message(&self) -> &str {
        &self.inner.message
    }

    /// Whether staff has dealt with the message
    async fn handled(&self) -> bool {
        self.inner.handled
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
}

#[derive(SimpleObject)]
pub struct ContactMessagePayload {
    pub success: bool,
    pub contact_message: Option<ContactMessage>,
}
