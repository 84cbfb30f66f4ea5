use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific message that the agent replays verbatim.
///
/// Providers usually need their own structured form of a response (for
/// example an assistant message that carries tool call records) when the
/// conversation is sent back on the next turn. The agent cannot interpret
/// that form, so it keeps the message as an opaque value and hands it back
/// to the provider, which may downcast it with [`OpaqueMessage::to_raw`].
///
/// Two opaque messages are equal when their ids are equal.
pub struct OpaqueMessage(Arc<dyn Payload>);

impl OpaqueMessage {
    /// Wraps `value` into an opaque message identified by `id`.
    ///
    /// The `id` should be unique within one conversation.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        Self(Arc::new(Tagged {
            id: id.into(),
            value,
        }))
    }

    /// Returns the id of this message.
    #[inline]
    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Returns the wrapped value if it has the type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }

    /// Returns `true` if the wrapped value has the type `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.0.as_any().is::<T>()
    }
}

impl Clone for OpaqueMessage {
    #[inline]
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.id()).finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

trait Payload: Send + Sync {
    fn id(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

struct Tagged<T> {
    id: String,
    value: T,
}

impl<T: Send + Sync + 'static> Payload for Tagged<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }
}
