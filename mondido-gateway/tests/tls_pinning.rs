//! TLS pinning against a live local server.
//!
//! A tokio-rustls server presents `server_a.pem`, a self-signed leaf outside
//! the webpki root set. Only a client pinned to that leaf may talk to it.

use std::sync::Arc;

use mondido_gateway::{
    GatewayError, MondidoClient,
    config::Credentials,
    pinning::PinKind,
    transport::HttpConfig,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        ServerConfig,
        crypto::ring,
        pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject},
    },
};

const SERVER_A: &str = include_str!("fixtures/server_a.pem");
const SERVER_A_KEY: &str = include_str!("fixtures/server_a.key");
const SERVER_A_SHA256: &str = include_str!("fixtures/server_a.sha256");
const SERVER_A_PUBKEY: &str = include_str!("fixtures/server_a_pubkey.pem");
const SERVER_B: &str = include_str!("fixtures/server_b.pem");
const SERVER_B_PUBKEY: &str = include_str!("fixtures/server_b_pubkey.pem");

const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
Content-Length: 29\r\n\
Connection: close\r\n\
\r\n\
{\"id\":17,\"status\":\"approved\"}";

/// Starts a one-response-per-connection TLS server and returns its port.
async fn spawn_server() -> u16 {
    let cert = CertificateDer::from_pem_slice(SERVER_A.as_bytes()).expect("certificate fixture");
    let key = PrivateKeyDer::from_pem_slice(SERVER_A_KEY.as_bytes()).expect("key fixture");
    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .expect("server config");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // rejected handshakes are expected
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tls.write_all(RESPONSE).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    port
}

async fn unstore_with(credentials: Credentials) -> mondido_gateway::Result<bool> {
    let port = spawn_server().await;
    let client = MondidoClient::with_http_config(credentials, &HttpConfig::default())?
        .with_base_url(format!("https://localhost:{port}/v1/"));
    let result = client.unstore("17").await?;
    Ok(result.success())
}

fn credentials() -> Credentials {
    Credentials::new("123", "token", "secret")
}

#[tokio::test]
async fn test_pinned_certificate_accepted() {
    let approved = unstore_with(credentials().with_pinned_certificate(SERVER_A))
        .await
        .expect("pinned certificate should be accepted");
    assert!(approved);
}

#[tokio::test]
async fn test_pinned_fingerprint_accepted() {
    let approved = unstore_with(credentials().with_pinned_certificate_fingerprint(SERVER_A_SHA256.trim()))
        .await
        .expect("pinned fingerprint should be accepted");
    assert!(approved);
}

#[tokio::test]
async fn test_pinned_public_key_accepted() {
    let approved = unstore_with(credentials().with_pinned_public_key(SERVER_A_PUBKEY))
        .await
        .expect("pinned public key should be accepted");
    assert!(approved);
}

#[tokio::test]
async fn test_wrong_certificate_is_violation() {
    let result = unstore_with(credentials().with_pinned_certificate(SERVER_B)).await;
    assert!(
        matches!(result, Err(GatewayError::PinningViolation(PinKind::Certificate))),
        "unexpected outcome: {result:?}"
    );
}

#[tokio::test]
async fn test_wrong_public_key_is_violation() {
    let result = unstore_with(credentials().with_pinned_public_key(SERVER_B_PUBKEY)).await;
    assert!(
        matches!(result, Err(GatewayError::PinningViolation(PinKind::PublicKey))),
        "unexpected outcome: {result:?}"
    );
}

#[tokio::test]
async fn test_unpinned_self_signed_is_not_trusted() {
    let approved = unstore_with(credentials()).await.expect("handshake failure is a result");
    assert!(!approved);
}
