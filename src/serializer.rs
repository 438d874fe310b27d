use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::event::IntegrationEvent;

/// A type tag plus the serialized event body, ready for the outbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEvent {
    /// Fully-qualified type tag used to reconstruct the concrete event.
    pub type_tag: String,
    /// JSON body of the event.
    pub payload: String,
}

/// Error type for serialize operations.
#[derive(Debug)]
pub enum SerializerError {
    /// The event type was never registered with the serializer.
    UnregisteredType(&'static str),
    /// The event body could not be encoded.
    Encode(serde_json::Error),
}

impl fmt::Display for SerializerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerError::UnregisteredType(name) => {
                write!(f, "event type {} is not registered", name)
            }
            SerializerError::Encode(err) => write!(f, "failed to encode event: {}", err),
        }
    }
}

impl Error for SerializerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SerializerError::Encode(err) => Some(err),
            SerializerError::UnregisteredType(_) => None,
        }
    }
}

type DecodeFn = Box<dyn Fn(&str) -> Option<Box<dyn IntegrationEvent>> + Send + Sync>;

/// Type-tagged JSON codec for integration events.
///
/// The registry is built once at startup via explicit registration; there is
/// no runtime type discovery. Each registered event type gets a decode entry
/// keyed by its type tag (the fully-qualified Rust type name by default) and
/// an encode entry keyed by its `TypeId`.
#[derive(Default)]
pub struct EventSerializer {
    decoders: HashMap<String, DecodeFn>,
    type_tags: HashMap<TypeId, String>,
}

impl EventSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event type under its fully-qualified type name.
    pub fn register<E>(&mut self)
    where
        E: IntegrationEvent + Serialize + DeserializeOwned,
    {
        self.register_as::<E>(type_name::<E>());
    }

    /// Register an event type under a custom tag.
    ///
    /// Useful when the tag must stay stable across renames or match an
    /// externally agreed contract.
    pub fn register_as<E>(&mut self, type_tag: impl Into<String>)
    where
        E: IntegrationEvent + Serialize + DeserializeOwned,
    {
        let type_tag = type_tag.into();
        self.type_tags.insert(TypeId::of::<E>(), type_tag.clone());
        self.decoders.insert(
            type_tag,
            Box::new(|payload: &str| {
                serde_json::from_str::<E>(payload)
                    .ok()
                    .map(|event| Box::new(event) as Box<dyn IntegrationEvent>)
            }),
        );
    }

    /// The tag a type was registered under, if any.
    pub fn type_tag_of<E: IntegrationEvent>(&self) -> Option<&str> {
        self.type_tag_for(TypeId::of::<E>())
    }

    /// The tag for an erased event type, if registered.
    pub fn type_tag_for(&self, type_id: TypeId) -> Option<&str> {
        self.type_tags.get(&type_id).map(String::as_str)
    }

    /// Serialize an event to its type tag and JSON body.
    pub fn serialize<E>(&self, event: &E) -> Result<SerializedEvent, SerializerError>
    where
        E: IntegrationEvent + Serialize,
    {
        let type_tag = self
            .type_tags
            .get(&TypeId::of::<E>())
            .ok_or(SerializerError::UnregisteredType(type_name::<E>()))?;
        let payload = serde_json::to_string(event).map_err(SerializerError::Encode)?;
        Ok(SerializedEvent {
            type_tag: type_tag.clone(),
            payload,
        })
    }

    /// Reconstruct an event from its type tag and JSON body.
    ///
    /// Returns `None` when the tag is unknown or the payload does not parse
    /// as the tagged type. A successfully parsed event is always `Some`, so
    /// `None` unambiguously means "unrecoverable payload", which the
    /// dispatcher treats as a permanent, non-retryable error.
    pub fn deserialize(&self, type_tag: &str, payload: &str) -> Option<Box<dyn IntegrationEvent>> {
        self.decoders.get(type_tag).and_then(|decode| decode(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMetadata, HasEventMetadata};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct UserRegistered {
        #[serde(flatten)]
        meta: EventMetadata,
        email: String,
    }

    impl HasEventMetadata for UserRegistered {
        fn event_metadata(&self) -> &EventMetadata {
            &self.meta
        }
    }

    fn sample_event() -> UserRegistered {
        UserRegistered {
            meta: EventMetadata::stamp(),
            email: "a@example.com".to_string(),
        }
    }

    #[test]
    fn round_trip_through_type_tag() {
        let mut serializer = EventSerializer::new();
        serializer.register::<UserRegistered>();

        let event = sample_event();
        let serialized = serializer.serialize(&event).unwrap();
        assert_eq!(serialized.type_tag, type_name::<UserRegistered>());

        let restored = serializer
            .deserialize(&serialized.type_tag, &serialized.payload)
            .unwrap();
        let restored = restored.as_any().downcast_ref::<UserRegistered>().unwrap();
        assert_eq!(restored, &event);
    }

    #[test]
    fn custom_tag() {
        let mut serializer = EventSerializer::new();
        serializer.register_as::<UserRegistered>("users.UserRegistered.v1");

        let serialized = serializer.serialize(&sample_event()).unwrap();
        assert_eq!(serialized.type_tag, "users.UserRegistered.v1");
        assert_eq!(
            serializer.type_tag_of::<UserRegistered>(),
            Some("users.UserRegistered.v1")
        );
        assert!(serializer
            .deserialize("users.UserRegistered.v1", &serialized.payload)
            .is_some());
    }

    #[test]
    fn unknown_tag_yields_nothing() {
        let serializer = EventSerializer::new();
        assert!(serializer.deserialize("ghost.Event", "{}").is_none());
    }

    #[test]
    fn unparsable_payload_yields_nothing() {
        let mut serializer = EventSerializer::new();
        serializer.register::<UserRegistered>();

        let tag = type_name::<UserRegistered>();
        assert!(serializer.deserialize(tag, "not json").is_none());
        assert!(serializer.deserialize(tag, "{}").is_none());
    }

    #[test]
    fn serialize_unregistered_type_fails() {
        let serializer = EventSerializer::new();
        let err = serializer.serialize(&sample_event()).unwrap_err();
        assert!(matches!(err, SerializerError::UnregisteredType(_)));
    }
}
