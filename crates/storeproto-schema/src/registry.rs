use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use storeproto_wire::{FamilyId, Frame, MessageId, MessageKey};

use crate::config::RegistryConfig;
use crate::context::Context;
use crate::error::{Result, SchemaError};
use crate::message::{self, AnyMessage, Message};
use crate::reflect::TagInfo;
use crate::version::VersionRecord;

/// Allocates and decodes one concrete message type.
pub type DecodeFn = fn(&[u8], &Context) -> Result<Box<dyn AnyMessage>>;

/// Lists the fields a default instance would carry under a context.
pub type InspectFn = fn(&Context) -> Result<Vec<TagInfo>>;

fn decode_boxed<M: Message>(body: &[u8], ctx: &Context) -> Result<Box<dyn AnyMessage>> {
    Ok(Box::new(message::decode::<M>(body, ctx)?))
}

fn inspect_default<M: Message>(ctx: &Context) -> Result<Vec<TagInfo>> {
    M::schema().inspect(&M::default(), ctx)
}

/// One registered message type.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub key: MessageKey,
    pub name: &'static str,
    pub format_version: u32,
    type_id: TypeId,
    decode: DecodeFn,
    inspect: InspectFn,
}

impl Registration {
    /// True when this registration belongs to type `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    pub fn decoder(&self) -> DecodeFn {
        self.decode
    }

    pub fn inspect(&self, ctx: &Context) -> Result<Vec<TagInfo>> {
        (self.inspect)(ctx)
    }
}

/// Bidirectional map between (family, message) keys and message types.
///
/// Built once at startup via [`configure_protocol`] and shared read-only by
/// every connection afterwards.
pub struct TypeRegistry {
    by_key: HashMap<MessageKey, Registration>,
    by_type: HashMap<TypeId, MessageKey>,
    families: BTreeMap<FamilyId, &'static str>,
    config: RegistryConfig,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            by_key: HashMap::new(),
            by_type: HashMap::new(),
            families: BTreeMap::new(),
            config,
        }
    }

    /// Register `M` under `key`.
    ///
    /// Keys are append-only: registering a key or a type twice fails, and
    /// the keepalive key `0:0` can never carry a message.
    pub fn register<M: Message>(&mut self, key: MessageKey) -> Result<()> {
        if key.is_null() {
            return Err(SchemaError::NullMessage);
        }
        if let Some(existing) = self.by_key.get(&key) {
            return Err(SchemaError::DuplicateRegistration {
                key,
                existing: existing.name,
            });
        }
        let type_id = TypeId::of::<M>();
        if self.by_type.contains_key(&type_id) {
            return Err(SchemaError::TypeAlreadyRegistered(M::NAME));
        }

        self.by_key.insert(
            key,
            Registration {
                key,
                name: M::NAME,
                format_version: M::FORMAT_VERSION,
                type_id,
                decode: decode_boxed::<M>,
                inspect: inspect_default::<M>,
            },
        );
        self.by_type.insert(type_id, key);
        tracing::trace!(%key, message = M::NAME, "message registered");
        Ok(())
    }

    /// Decoder for `key`, or a not-found condition.
    pub fn resolve(&self, key: MessageKey) -> Result<DecodeFn> {
        self.registration(key).map(Registration::decoder)
    }

    pub fn registration(&self, key: MessageKey) -> Result<&Registration> {
        if key.is_null() {
            return Err(SchemaError::NullMessage);
        }
        self.by_key
            .get(&key)
            .ok_or(SchemaError::UnknownMessage {
                family: key.family,
                message: key.message,
            })
    }

    /// Look a message up by its type name within a family.
    pub fn find(&self, family: FamilyId, name: &str) -> Option<&Registration> {
        self.by_key
            .values()
            .find(|reg| reg.key.family == family && reg.name.eq_ignore_ascii_case(name))
    }

    pub fn key_of<M: Message>(&self) -> Result<MessageKey> {
        self.by_type
            .get(&TypeId::of::<M>())
            .copied()
            .ok_or(SchemaError::Unregistered(M::NAME))
    }

    pub fn contains(&self, key: MessageKey) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Decode a body addressed to `key`.
    pub fn decode(&self, key: MessageKey, body: &[u8], ctx: &Context) -> Result<Box<dyn AnyMessage>> {
        if body.len() > self.config.max_message_size {
            return Err(SchemaError::MessageTooLarge {
                size: body.len(),
                max: self.config.max_message_size,
            });
        }
        let decode = self.resolve(key)?;
        decode(body, ctx)
    }

    /// Decode a frame and copy its request id into the message envelope.
    pub fn decode_frame(&self, frame: &Frame, ctx: &Context) -> Result<Box<dyn AnyMessage>> {
        let mut msg = self.decode(frame.key, &frame.payload, ctx)?;
        msg.message_envelope_mut().request_id = frame.request_id;
        Ok(msg)
    }

    /// Encode `msg` and return it with its key.
    pub fn encode<M: Message>(&self, msg: &M, ctx: &Context) -> Result<(MessageKey, Bytes)> {
        let key = self.key_of::<M>()?;
        let body = message::encode(msg, ctx)?;
        if body.len() > self.config.max_message_size {
            return Err(SchemaError::MessageTooLarge {
                size: body.len(),
                max: self.config.max_message_size,
            });
        }
        Ok((key, body))
    }

    /// All registrations, sorted by key.
    pub fn registrations(&self) -> Vec<&Registration> {
        let mut all: Vec<_> = self.by_key.values().collect();
        all.sort_by_key(|reg| reg.key);
        all
    }

    /// Configured families, sorted by id.
    pub fn families(&self) -> impl Iterator<Item = (FamilyId, &'static str)> + '_ {
        self.families.iter().map(|(id, name)| (*id, *name))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers the messages of one family.
pub struct Registrar<'a> {
    registry: &'a mut TypeRegistry,
    family: FamilyId,
}

impl Registrar<'_> {
    pub fn family(&self) -> FamilyId {
        self.family
    }

    pub fn register<M: Message>(&mut self, message: MessageId) -> Result<&mut Self> {
        self.registry
            .register::<M>(MessageKey::new(self.family, message))?;
        Ok(self)
    }
}

/// A numbered group of messages sharing one version record.
pub trait ProtocolFamily {
    const ID: FamilyId;
    const NAME: &'static str;

    type Version: VersionRecord;

    /// Register every message of the family. Message ids are append-only.
    fn protocol_table(registrar: &mut Registrar<'_>) -> Result<()>;
}

/// Populate `registry` with family `F`. Called once per family at startup.
pub fn configure_protocol<F: ProtocolFamily>(registry: &mut TypeRegistry) -> Result<()> {
    if let Some(existing) = registry.families.get(&F::ID) {
        return Err(SchemaError::Invalid {
            record: F::NAME,
            reason: format!("family id {} already configured as {existing}", F::ID),
        });
    }
    let before = registry.len();
    F::protocol_table(&mut Registrar {
        registry: &mut *registry,
        family: F::ID,
    })?;
    registry.families.insert(F::ID, F::NAME);
    tracing::debug!(
        family = F::NAME,
        id = F::ID,
        messages = registry.len() - before,
        "protocol family configured"
    );
    Ok(())
}
