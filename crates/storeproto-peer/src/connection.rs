use std::collections::VecDeque;
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use storeproto_schema::{AnyMessage, Context, Message, TypeRegistry};
use storeproto_wire::{FrameConfig, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};

use crate::error::{PeerError, Result};
use crate::handshake::{handshake_client, handshake_server, HandshakeConfig, HandshakeResult};

/// Runtime limits of an established connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum frame payload after the handshake.
    pub max_payload_size: usize,
    /// Messages buffered while [`Connection::request`] waits for its reply.
    pub max_pending: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_pending: 64,
        }
    }
}

/// A handshaken connection exchanging typed messages.
///
/// Every message is encoded and decoded under the version records agreed
/// during the handshake. Keepalive frames are consumed silently.
pub struct Connection<R, W> {
    peer_id: String,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    registry: Arc<TypeRegistry>,
    context: Context,
    config: ConnectionConfig,
    next_request_id: u64,
    pending: VecDeque<Box<dyn AnyMessage>>,
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Wrap a reader/writer pair that already completed a handshake.
    pub fn from_parts(
        mut reader: FrameReader<R>,
        mut writer: FrameWriter<W>,
        registry: Arc<TypeRegistry>,
        handshake: HandshakeResult,
        config: ConnectionConfig,
    ) -> Self {
        // the handshake ran under a tighter payload budget
        reader.set_max_payload_size(config.max_payload_size);
        writer.set_max_payload_size(config.max_payload_size);
        Self {
            peer_id: handshake.peer_id,
            reader,
            writer,
            registry,
            context: handshake.context,
            config,
            // the init exchange used the first id
            next_request_id: crate::handshake::INIT_REQUEST_ID + 1,
            pending: VecDeque::new(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Send `msg`. A zero request id in its envelope is replaced by a fresh
    /// one; responses keep the id of the request they answer.
    ///
    /// Returns the request id the frame carried.
    pub fn send<M: Message>(&mut self, msg: &M) -> Result<u64> {
        let request_id = match msg.envelope().request_id {
            0 => self.allocate_request_id(),
            id => id,
        };
        let (key, body) = self.registry.encode(msg, &self.context)?;
        self.writer.send(key, request_id, &body)?;
        tracing::debug!(peer = %self.peer_id, %key, request_id, message = M::NAME, "message sent");
        Ok(request_id)
    }

    /// Next message from the peer, skipping keepalives.
    pub fn recv(&mut self) -> Result<Box<dyn AnyMessage>> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(msg);
        }
        self.read_message()
    }

    /// Next message, which must be an `M`.
    pub fn recv_as<M: Message>(&mut self) -> Result<M> {
        let msg = self.recv()?;
        downcast(msg, &self.registry)
    }

    /// Send `request` and wait for the message answering it.
    ///
    /// Messages with other request ids that arrive meanwhile are kept for
    /// later [`Connection::recv`] calls.
    pub fn request<Req: Message, Resp: Message>(&mut self, request: &Req) -> Result<Resp> {
        let request_id = self.send(request)?;
        loop {
            let msg = self.read_message()?;
            if msg.message_envelope().request_id == request_id {
                return downcast(msg, &self.registry);
            }
            if self.pending.len() >= self.config.max_pending {
                return Err(PeerError::BufferFull(self.pending.len()));
            }
            tracing::trace!(
                peer = %self.peer_id,
                request_id = msg.message_envelope().request_id,
                waiting_for = request_id,
                "buffering unrelated message"
            );
            self.pending.push_back(msg);
        }
    }

    pub fn keepalive(&mut self) -> Result<()> {
        self.writer.send_keepalive()?;
        Ok(())
    }

    fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    fn read_message(&mut self) -> Result<Box<dyn AnyMessage>> {
        loop {
            let frame = self
                .reader
                .read_frame()
                .map_err(|err| PeerError::from_read(err, "receive"))?;
            if frame.is_keepalive() {
                tracing::trace!(peer = %self.peer_id, "keepalive received");
                continue;
            }
            let mut msg = self.registry.decode_frame(&frame, &self.context)?;
            msg.message_envelope_mut().sender = self.peer_id.clone();
            tracing::debug!(
                peer = %self.peer_id,
                key = %frame.key,
                request_id = frame.request_id,
                message = msg.message_name(),
                "message received"
            );
            return Ok(msg);
        }
    }
}

fn downcast<M: Message>(msg: Box<dyn AnyMessage>, registry: &TypeRegistry) -> Result<M> {
    let found = msg.message_name();
    match msg.downcast::<M>() {
        Some(msg) => Ok(*msg),
        None => Err(PeerError::Unexpected {
            expected: M::NAME,
            found,
            key: registry.key_of::<M>()?,
        }),
    }
}

#[cfg(unix)]
fn split_stream(
    stream: UnixStream,
    handshake_config: &HandshakeConfig,
) -> Result<(FrameReader<UnixStream>, FrameWriter<UnixStream>)> {
    let frame_config = FrameConfig {
        max_payload_size: handshake_config.max_handshake_payload,
        read_timeout: Some(handshake_config.timeout),
        write_timeout: Some(handshake_config.timeout),
    };
    stream
        .set_read_timeout(frame_config.read_timeout)
        .map_err(storeproto_wire::WireError::Io)?;
    stream
        .set_write_timeout(frame_config.write_timeout)
        .map_err(storeproto_wire::WireError::Io)?;
    let reader_stream = stream.try_clone().map_err(storeproto_wire::WireError::Io)?;
    Ok((
        FrameReader::with_config(reader_stream, frame_config.clone()),
        FrameWriter::with_config(stream, frame_config),
    ))
}

#[cfg(unix)]
fn clear_timeouts(stream: &UnixStream) -> Result<()> {
    stream
        .set_read_timeout(None)
        .map_err(storeproto_wire::WireError::Io)?;
    stream
        .set_write_timeout(None)
        .map_err(storeproto_wire::WireError::Io)?;
    Ok(())
}

/// Open a client connection over a connected stream.
#[cfg(unix)]
pub fn connect(
    stream: UnixStream,
    registry: Arc<TypeRegistry>,
    handshake_config: &HandshakeConfig,
    config: ConnectionConfig,
) -> Result<Connection<UnixStream, UnixStream>> {
    let (mut reader, mut writer) = split_stream(stream, handshake_config)?;
    let handshake = handshake_client(&mut reader, &mut writer, &registry, handshake_config)?;
    clear_timeouts(writer.get_ref())?;
    Ok(Connection::from_parts(reader, writer, registry, handshake, config))
}

/// Accept a client connection on an accepted stream.
#[cfg(unix)]
pub fn accept(
    stream: UnixStream,
    registry: Arc<TypeRegistry>,
    handshake_config: &HandshakeConfig,
    config: ConnectionConfig,
) -> Result<Connection<UnixStream, UnixStream>> {
    let (mut reader, mut writer) = split_stream(stream, handshake_config)?;
    let handshake = handshake_server(&mut reader, &mut writer, &registry, handshake_config)?;
    clear_timeouts(writer.get_ref())?;
    Ok(Connection::from_parts(reader, writer, registry, handshake, config))
}

#[cfg(all(test, unix))]
mod tests {
    use std::thread;

    use storeproto_protocol::families::{core, main};
    use storeproto_protocol::records::ListStoreNode;
    use storeproto_protocol::{build_registry, Status};
    use storeproto_schema::{SchemaError, StreamField, WireType, WireWriter};
    use storeproto_wire::{MessageKey, WireError};

    use super::*;

    fn pair() -> (
        Connection<UnixStream, UnixStream>,
        thread::JoinHandle<Connection<UnixStream, UnixStream>>,
    ) {
        let registry = Arc::new(build_registry().unwrap());
        let (left, right) = UnixStream::pair().unwrap();

        let server_registry = Arc::clone(&registry);
        let server = thread::spawn(move || {
            let cfg = HandshakeConfig {
                peer_id: "client".to_string(),
                ..HandshakeConfig::default()
            };
            accept(left, server_registry, &cfg, ConnectionConfig::default()).unwrap()
        });

        let cfg = HandshakeConfig {
            peer_id: "server".to_string(),
            ..HandshakeConfig::default()
        };
        let client = connect(right, registry, &cfg, ConnectionConfig::default()).unwrap();
        (client, server)
    }

    #[test]
    fn request_response_roundtrip() {
        let (mut client, server) = pair();

        let server = thread::spawn(move || {
            let mut server = server.join().unwrap();
            let request: main::ListStoreRequest = server.recv_as().unwrap();
            assert_eq!(request.envelope.sender, "client");
            let mut response = main::ListStoreResponse::from(&request);
            response.error = Status::OK;
            response.nodes.push_back(ListStoreNode::new(request.path.clone(), 42));
            server.send(&response).unwrap();
        });

        let request = main::ListStoreRequest {
            storage_id: "s1".into(),
            path: "builds/app.bin".into(),
            ..main::ListStoreRequest::default()
        };
        let response: main::ListStoreResponse = client.request(&request).unwrap();
        assert!(response.error.is_ok());
        assert_eq!(response.nodes[0].name, "builds/app.bin");
        assert_eq!(response.envelope.sender, "server");
        assert_eq!(response.envelope.request_id, 2);

        server.join().unwrap();
    }

    #[test]
    fn keepalives_are_skipped() {
        let (mut client, server) = pair();

        let server = thread::spawn(move || {
            let mut server = server.join().unwrap();
            server.keepalive().unwrap();
            server.keepalive().unwrap();
            server
                .send(&core::Response::default().with_status(Status::OK, "ready"))
                .unwrap();
        });

        let response: core::Response = client.recv_as().unwrap();
        assert_eq!(response.message, "ready");
        server.join().unwrap();
    }

    #[test]
    fn unrelated_messages_wait_for_recv() {
        let (mut client, server) = pair();

        let server = thread::spawn(move || {
            let mut server = server.join().unwrap();
            let request: main::ListOSesRequest = server.recv_as().unwrap();
            // push a notification first, then the reply
            let mut notice = core::Response::default().with_status(Status::OK, "notice");
            notice.envelope.request_id = 99;
            server.send(&notice).unwrap();
            let mut reply = main::ListOSesResponse::from(&request);
            reply.error = Status::OK;
            reply.oses = vec!["linux".into(), "windows".into()];
            server.send(&reply).unwrap();
        });

        let reply: main::ListOSesResponse =
            client.request(&main::ListOSesRequest::default()).unwrap();
        assert_eq!(reply.oses, ["linux", "windows"]);

        let notice: core::Response = client.recv_as().unwrap();
        assert_eq!(notice.envelope.request_id, 99);
        assert_eq!(notice.message, "notice");
        server.join().unwrap();
    }

    #[test]
    fn wrong_type_is_unexpected() {
        let (mut client, server) = pair();

        let server = thread::spawn(move || {
            let mut server = server.join().unwrap();
            server.send(&core::Response::default()).unwrap();
        });

        let result = client.recv_as::<main::ListOSesResponse>();
        assert!(matches!(
            result,
            Err(PeerError::Unexpected {
                expected: "ListOSesResponse",
                found: "Response",
                ..
            })
        ));
        server.join().unwrap();
    }

    #[test]
    fn upload_streams_through_connection() {
        let (mut client, server) = pair();

        let server = thread::spawn(move || {
            let mut server = server.join().unwrap();
            let upload: main::UploadRequest = server.recv_as().unwrap();
            assert!(upload.file.is_complete());
            assert_eq!(upload.file.data().len(), 70 * 1024);
            server
                .send(&core::Response::from(&upload).with_status(Status::OK, ""))
                .unwrap();
        });

        let upload = main::UploadRequest {
            file: StreamField::from_bytes(vec![7u8; 70 * 1024]),
            ..main::UploadRequest::default()
        };
        let reply: core::Response = client.request(&upload).unwrap();
        assert!(reply.error.is_ok());
        server.join().unwrap();
    }

    #[test]
    fn malformed_message_does_not_disturb_the_next() {
        let (mut client, server) = pair();

        let server = thread::spawn(move || {
            let mut server = server.join().unwrap();

            // FetchAppRequest body with a field of wire type 1
            server
                .writer
                .send(MessageKey::new(2, 13), 5, &[0x00, 0x01, 0x09, 0x01])
                .unwrap();

            // CreateBuildRequest image_blob prefix over 1 MiB on a short body
            let mut body = WireWriter::new();
            body.put_key(0, WireType::Varint).unwrap();
            body.put_varint(1);
            body.put_key(6, WireType::Len).unwrap();
            body.put_varint(2 * 1024 * 1024);
            body.put_raw(&[0u8; 16]);
            server
                .writer
                .send(MessageKey::new(2, 10), 6, body.as_slice())
                .unwrap();

            let mut valid = main::FetchAppRequest {
                app_id: "editor".into(),
                os_id: "linux".into(),
                ..main::FetchAppRequest::default()
            };
            valid.envelope.request_id = 7;
            server.send(&valid).unwrap();
        });

        assert!(matches!(
            client.recv(),
            Err(PeerError::Schema(SchemaError::Wire(WireError::UnknownWireType(1))))
        ));
        match client.recv() {
            Err(PeerError::Schema(err)) => assert!(err.is_bound_exceeded(), "{err}"),
            other => panic!("expected a bound failure, got {other:?}"),
        }

        let request: main::FetchAppRequest = client.recv_as().unwrap();
        assert_eq!(request.app_id, "editor");
        assert_eq!(request.os_id, "linux");
        assert_eq!(request.envelope.request_id, 7);
        assert_eq!(request.envelope.sender, "server");
        server.join().unwrap();
    }

    #[test]
    fn peer_close_is_disconnected() {
        let (mut client, server) = pair();
        drop(server.join().unwrap());
        assert!(matches!(client.recv(), Err(PeerError::Disconnected(_))));
    }
}
