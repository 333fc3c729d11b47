/// Implement `Record` and `WireValue` for a nested domain record.
macro_rules! record {
    ($ty:ident => [$($entry:expr),* $(,)?] $(, after_decode = $hook:expr)? $(,)?) => {
        impl storeproto_schema::Record for $ty {
            const NAME: &'static str = stringify!($ty);

            fn schema() -> &'static storeproto_schema::Schema<Self> {
                storeproto_schema::schema!($ty => [$($entry),*] $(, after_decode = $hook)?)
            }
        }

        storeproto_schema::record_value!($ty);
    };
}

/// Implement `Record` and `Message` for a top-level message carrying an
/// `envelope` member.
macro_rules! message {
    ($ty:ident => [$($entry:expr),* $(,)?] $(, after_decode = $hook:expr)? $(,)?) => {
        impl storeproto_schema::Record for $ty {
            const NAME: &'static str = stringify!($ty);

            fn schema() -> &'static storeproto_schema::Schema<Self> {
                storeproto_schema::schema!($ty => [$($entry),*] $(, after_decode = $hook)?)
            }
        }

        impl storeproto_schema::Message for $ty {
            const FORMAT_VERSION: u32 = 1;

            fn envelope(&self) -> &storeproto_schema::Envelope {
                &self.envelope
            }

            fn envelope_mut(&mut self) -> &mut storeproto_schema::Envelope {
                &mut self.envelope
            }
        }
    };
}

/// Implement `WireValue` for a fieldless `#[repr(u8)]` enum with a
/// `from_u8` constructor.
macro_rules! enum_value {
    ($($ty:ident),+ $(,)?) => {$(
        impl storeproto_schema::WireValue for $ty {
            const WIRE_TYPE: storeproto_schema::WireType = storeproto_schema::WireType::Varint;

            fn encode_body(
                &self,
                out: &mut storeproto_schema::WireWriter,
                _meta: &storeproto_schema::FieldMeta,
                _ctx: &storeproto_schema::Context,
            ) -> storeproto_schema::Result<()> {
                out.put_varint(*self as u64);
                Ok(())
            }

            fn decode_body(
                &mut self,
                input: &mut storeproto_schema::WireReader<'_>,
                meta: &storeproto_schema::FieldMeta,
                _ctx: &storeproto_schema::Context,
            ) -> storeproto_schema::Result<()> {
                let raw = input.get_varint()?;
                *self = u8::try_from(raw)
                    .ok()
                    .and_then($ty::from_u8)
                    .ok_or_else(|| storeproto_wire::WireError::InvalidValue {
                        tag: meta.tag,
                        reason: format!("{raw} is not a valid {}", stringify!($ty)),
                    })?;
                Ok(())
            }
        }
    )+};
}
