use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use storeproto_protocol::families::{auth, core, main};
use storeproto_protocol::{ErrorCode, Status};
use storeproto_schema::{Context, Message, TypeRegistry, VersionRecord};
use storeproto_wire::{Frame, FrameReader, FrameWriter, WireError};

use crate::error::{PeerError, Result};

const MAX_PEER_ID_LEN: usize = 128;

/// Request id of the init request; the reply echoes it.
pub const INIT_REQUEST_ID: u64 = 1;

/// Family a connection is opened for. Selects the init request the client
/// sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Service {
    Auth,
    #[default]
    Main,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Main => "main",
        }
    }
}

/// Configuration for the init exchange.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Timeout for each blocking handshake operation.
    pub timeout: Duration,
    /// Maximum init frame payload size in bytes.
    pub max_handshake_payload: usize,
    /// Name recorded for the remote peer, used as the sender of every
    /// message received on the connection.
    pub peer_id: String,
    /// Family the client opens the connection for. Ignored by servers,
    /// which accept either init request.
    pub service: Service,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_handshake_payload: 16 * 1024,
            peer_id: "peer".to_string(),
            service: Service::default(),
        }
    }
}

/// Result of a successful handshake.
#[derive(Debug)]
pub struct HandshakeResult {
    pub peer_id: String,
    pub service: Service,
    /// Version records every later message is encoded and decoded under.
    pub context: Context,
}

/// Client side: advertise local versions and wait for the verdict.
///
/// The client never learns the server's records; it assumes its own for
/// every family it speaks.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    registry: &TypeRegistry,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    validate_peer_id(&config.peer_id)?;

    let mut context = Context::new().with_negotiated(core::Version::local());
    let (key, body) = match config.service {
        Service::Auth => {
            context.set_negotiated(auth::Version::local());
            registry.encode(&auth::InitRequest::local(), &Context::new())?
        }
        Service::Main => {
            context.set_negotiated(main::Version::local());
            registry.encode(&main::InitRequest::local(), &Context::new())?
        }
    };
    writer.send(key, INIT_REQUEST_ID, &body)?;

    let deadline = Instant::now() + config.timeout;
    let frame = recv_init_frame(
        reader,
        deadline,
        config.timeout,
        config.max_handshake_payload,
    )?;
    let msg = registry.decode_frame(&frame, &context)?;
    let found = msg.message_name();
    let reply = msg
        .downcast::<core::InitResponse>()
        .ok_or(PeerError::Unexpected {
            expected: "InitResponse",
            found,
            key: frame.key,
        })?;

    if !reply.error.is_set() {
        tracing::debug!(peer = %config.peer_id, "init response carried no result, assuming accepted");
    } else if !reply.error.is_ok() {
        tracing::warn!(
            peer = %config.peer_id,
            service = config.service.name(),
            error = %reply.error,
            message = %reply.message,
            "init request rejected"
        );
        return Err(PeerError::Rejected(reply.error.condition()));
    }

    tracing::debug!(peer = %config.peer_id, service = config.service.name(), "handshake complete");
    Ok(HandshakeResult {
        peer_id: config.peer_id.clone(),
        service: config.service,
        context,
    })
}

/// Server side: read the client's init request, install its records and
/// reply.
///
/// A client whose family or core record this build cannot use is answered
/// with a `Version` error and the handshake fails.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    registry: &TypeRegistry,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    validate_peer_id(&config.peer_id)?;

    let deadline = Instant::now() + config.timeout;
    let frame = recv_init_frame(
        reader,
        deadline,
        config.timeout,
        config.max_handshake_payload,
    )?;
    let msg = registry.decode_frame(&frame, &Context::new())?;

    let mut context = Context::new();
    let (service, family_supported, core_version) =
        if let Some(init) = msg.downcast_ref::<auth::InitRequest>() {
            context.set_negotiated(init.auth_version.clone());
            (
                Service::Auth,
                init.auth_version.is_supported(),
                init.core_version.clone(),
            )
        } else if let Some(init) = msg.downcast_ref::<main::InitRequest>() {
            context.set_negotiated(init.main_version.clone());
            (
                Service::Main,
                init.main_version.is_supported(),
                init.core_version.clone(),
            )
        } else {
            return Err(PeerError::Unexpected {
                expected: "InitRequest",
                found: msg.message_name(),
                key: frame.key,
            });
        };

    let mut reply = core::InitResponse::default();
    *reply.envelope_mut() = msg.message_envelope().reply();

    if !family_supported || !core_version.is_supported() {
        tracing::warn!(
            peer = %config.peer_id,
            service = service.name(),
            family_supported,
            core_supported = core_version.is_supported(),
            "unsupported client version, rejecting"
        );
        let reply = reply.with_status(
            ErrorCode::Version,
            format!("unsupported {} protocol version", service.name()),
        );
        // the client reads the reply under its own core record
        let reject_ctx = Context::new().with_negotiated(core::Version::local());
        send_reply(writer, registry, &reply, &reject_ctx, frame.request_id)?;
        return Err(PeerError::HandshakeFailed(format!(
            "unsupported {} protocol version",
            service.name()
        )));
    }

    context.set_negotiated(core_version);
    let reply = reply.with_status(Status::OK, "");
    send_reply(writer, registry, &reply, &context, frame.request_id)?;

    tracing::debug!(peer = %config.peer_id, service = service.name(), "handshake accepted");
    Ok(HandshakeResult {
        peer_id: config.peer_id.clone(),
        service,
        context,
    })
}

fn send_reply<W: Write, M: Message>(
    writer: &mut FrameWriter<W>,
    registry: &TypeRegistry,
    reply: &M,
    ctx: &Context,
    request_id: u64,
) -> Result<()> {
    let (key, body) = registry.encode(reply, ctx)?;
    writer.send(key, request_id, &body)?;
    Ok(())
}

fn recv_init_frame<R: Read>(
    reader: &mut FrameReader<R>,
    deadline: Instant,
    timeout: Duration,
    max_handshake_payload: usize,
) -> Result<Frame> {
    loop {
        if Instant::now() >= deadline {
            return Err(PeerError::Timeout(timeout));
        }

        match reader.read_frame() {
            Ok(frame) if frame.is_keepalive() => continue,
            Ok(frame) => {
                if frame.payload.len() > max_handshake_payload {
                    return Err(PeerError::HandshakeFailed(format!(
                        "init payload too large: {} (max {})",
                        frame.payload.len(),
                        max_handshake_payload
                    )));
                }
                return Ok(frame);
            }
            Err(WireError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => return Err(PeerError::from_read(err, "handshake")),
        }
    }
}

fn validate_peer_id(peer_id: &str) -> Result<()> {
    if peer_id.is_empty() || peer_id.len() > MAX_PEER_ID_LEN {
        return Err(PeerError::HandshakeFailed(format!(
            "invalid peer_id length: {}",
            peer_id.len()
        )));
    }
    Ok(())
}
