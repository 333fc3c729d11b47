//! One client and one server over a socket pair: init handshake, then a
//! couple of main-family requests.
//!
//! Run with:
//!   cargo run --example store-session

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;

use storeproto::peer::{accept, connect, ConnectionConfig, HandshakeConfig, Service};
use storeproto::protocol::families::main;
use storeproto::protocol::{build_registry, ErrorCode, Status};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(build_registry()?);
    let (client_stream, server_stream) = UnixStream::pair()?;

    let server_registry = Arc::clone(&registry);
    let server = thread::spawn(move || -> storeproto::peer::Result<()> {
        let config = HandshakeConfig {
            peer_id: "store-server".into(),
            ..HandshakeConfig::default()
        };
        let mut conn = accept(server_stream, server_registry, &config, ConnectionConfig::default())?;
        eprintln!("server: accepted {}", conn.peer_id());

        let request = conn.recv_as::<main::ListOSesRequest>()?;
        let mut reply = main::ListOSesResponse::from(&request);
        reply.error = Status::OK;
        reply.oses = vec!["linux".into(), "windows".into()];
        conn.send(&reply)?;

        let request = conn.recv_as::<main::FetchAppRequest>()?;
        let mut reply = main::FetchAppResponse::from(&request);
        reply.error = Status::from(ErrorCode::ApplicationInvalid);
        reply.message = format!("no application {:?}", request.app_id);
        conn.send(&reply)?;
        Ok(())
    });

    let config = HandshakeConfig {
        peer_id: "store-client".into(),
        service: Service::Main,
        ..HandshakeConfig::default()
    };
    let mut conn = connect(client_stream, registry, &config, ConnectionConfig::default())?;

    let oses: main::ListOSesResponse = conn.request(&main::ListOSesRequest::default())?;
    println!("oses: {}", oses.oses.join(", "));

    let app: main::FetchAppResponse = conn.request(&main::FetchAppRequest {
        app_id: "missing".into(),
        ..main::FetchAppRequest::default()
    })?;
    println!("fetch app: {} {}", app.error.condition(), app.message);

    server
        .join()
        .map_err(|_| "server thread panicked")??;
    Ok(())
}
