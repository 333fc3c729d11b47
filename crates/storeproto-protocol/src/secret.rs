use std::fmt;

use storeproto_schema::{Context, FieldMeta, Result, WireReader, WireType, WireValue, WireWriter};

/// Credential material: passwords and tickets.
///
/// Encoded like a plain string but redacted in debug output, so messages
/// carrying one can be logged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            write!(f, "<redacted:{} bytes>", self.0.len())
        }
    }
}

impl WireValue for Secret {
    const WIRE_TYPE: WireType = WireType::Len;
    const BYTE_BOUND: bool = true;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, ctx: &Context) -> Result<()> {
        self.0.encode_body(out, meta, ctx)
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        ctx: &Context,
    ) -> Result<()> {
        self.0.decode_body(input, meta, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let secret = Secret::from("hunter2");
        assert_eq!(format!("{secret:?}"), "<redacted:7 bytes>");
        assert_eq!(secret.expose(), "hunter2");
        assert_eq!(format!("{:?}", Secret::default()), "\"\"");
    }
}
