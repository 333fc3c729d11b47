use storeproto_wire::DEFAULT_MAX_PAYLOAD;

/// Controls registry dispatch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Largest message body the registry will hand to a decoder.
    pub max_message_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
