/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::ServerName;
use rustls::pki_types::UnixTime;
use tracing::debug;
use tracing::warn;

use super::error::XmppError;

const TLS_CHUNK_SIZE: usize = 8192;

/// How the connection is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plain text connection. Servers requiring STARTTLS are refused.
    Disabled,
    /// TLS handshake right after the TCP connection (XEP-0368 style ports).
    Direct,
    /// Upgrade with STARTTLS during the stream negotiation.
    #[default]
    StartTls,
}

pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Certificate verifier for `skip_verify` connections.
///
/// Signatures are still checked so the handshake is a real one, only the
/// certificate chain and the host name are not.
#[derive(Debug)]
struct NoCertificateVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Builds the client configuration for a single connection.
pub fn client_config(skip_verify: bool) -> Arc<ClientConfig> {
    if skip_verify {
        warn!("TLS certificate verification is disabled");
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification(provider)))
            .with_no_client_auth();
        return Arc::new(config);
    }
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Runs the TLS handshake over an established TCP connection.
pub fn handshake(
    mut tcp: TcpStream,
    config: Arc<ClientConfig>,
    server_name: &str,
) -> Result<TlsStream, XmppError> {
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|err| XmppError::Tls(format!("invalid server name {server_name}: {err}")))?;
    let mut conn = ClientConnection::new(config, name)
        .map_err(|err| XmppError::Tls(err.to_string()))?;
    while conn.is_handshaking() {
        conn.complete_io(&mut tcp)
            .map_err(|err| XmppError::Tls(err.to_string()))?;
    }
    debug!(
        "TLS established with {server_name}, protocol {:?}",
        conn.protocol_version()
    );
    Ok(StreamOwned::new(conn, tcp))
}

fn lock(conn: &Mutex<ClientConnection>) -> io::Result<MutexGuard<'_, ClientConnection>> {
    conn.lock()
        .map_err(|_| io::Error::other("TLS connection state is poisoned"))
}

/// Splits an established TLS stream into halves usable from two threads.
///
/// The rustls state is shared behind a mutex. The reader waits for socket
/// data without holding the mutex, so a blocked read never stops a write.
pub fn split(stream: TlsStream) -> io::Result<(TlsReader, TlsWriter, TcpStream)> {
    let StreamOwned { conn, sock } = stream;
    let conn = Arc::new(Mutex::new(conn));
    let reader = TlsReader {
        conn: Arc::clone(&conn),
        socket: sock.try_clone()?,
        pending: Vec::new(),
    };
    let writer = TlsWriter {
        conn,
        socket: sock.try_clone()?,
    };
    Ok((reader, writer, sock))
}

pub struct TlsReader {
    conn: Arc<Mutex<ClientConnection>>,
    socket: TcpStream,
    pending: Vec<u8>,
}

impl Read for TlsReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            {
                let mut conn = lock(&self.conn)?;
                match conn.reader().read(buf) {
                    Ok(nr_read) => return Ok(nr_read),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => (),
                    Err(err) => return Err(err),
                }
                if !self.pending.is_empty() {
                    let mut records = &self.pending[..];
                    let nr_used = conn.read_tls(&mut records)?;
                    self.pending.drain(..nr_used);
                    conn.process_new_packets()
                        .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
                    if conn.wants_write() {
                        conn.write_tls(&mut self.socket)?;
                    }
                    continue;
                }
            }
            let mut chunk = [0u8; TLS_CHUNK_SIZE];
            let nr_read = self.socket.read(&mut chunk)?;
            if nr_read == 0 {
                return Ok(0);
            }
            self.pending.extend_from_slice(&chunk[..nr_read]);
        }
    }
}

pub struct TlsWriter {
    conn: Arc<Mutex<ClientConnection>>,
    socket: TcpStream,
}

impl Write for TlsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut conn = lock(&self.conn)?;
        let nr_written = conn.writer().write(buf)?;
        while conn.wants_write() {
            conn.write_tls(&mut self.socket)?;
        }
        Ok(nr_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut conn = lock(&self.conn)?;
        conn.writer().flush()?;
        while conn.wants_write() {
            conn.write_tls(&mut self.socket)?;
        }
        self.socket.flush()
    }
}
