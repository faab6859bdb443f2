use std::{io, net::TcpStream, sync::Arc};

use log::*;
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    StreamOwned,
};

use super::{transport::CONNECT_TIMEOUT, ConnectErr};

pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

pub fn client_config(verify: bool) -> Arc<ClientConfig> {
    let config = if verify {
        // Mozilla's root certificates
        let root_store = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()
    };
    Arc::new(config)
}

/// wraps a connected socket in TLS and finishes the handshake. the returned stream is
/// nonblocking.
pub fn connect(stream: TcpStream, host: &str, verify: bool) -> Result<TlsStream, ConnectErr> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ConnectErr::InvalidServerName(host.to_string()))?;
    let mut client = ClientConnection::new(client_config(verify), server_name)?;

    // the handshake runs blocking so that certificate errors are reported by connect, and not by
    // the first read
    let mut stream = stream;
    stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;
    while client.is_handshaking() {
        client.complete_io(&mut stream).map_err(tls_or_network)?;
    }
    debug!(
        "TLS handshake with {} done, {:?}",
        host,
        client.protocol_version()
    );
    stream.set_read_timeout(None)?;
    stream.set_nonblocking(true)?;

    Ok(StreamOwned::new(client, stream))
}

// rustls reports handshake failures as io errors wrapping the TLS error
fn tls_or_network(e: io::Error) -> ConnectErr {
    match e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls) => ConnectErr::Tls(tls.clone()),
        None => ConnectErr::Network(e),
    }
}

/// accepts any certificate. only used when the user turned verification off.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        CryptoProvider::get_default()
            .map(|provider| {
                provider
                    .signature_verification_algorithms
                    .supported_schemes()
            })
            .unwrap_or_default()
    }
}
