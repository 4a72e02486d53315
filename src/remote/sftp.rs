//! SFTP transport over an SSH channel (russh + russh-sftp).
//!
//! `connect` performs the whole handshake: TCP connect, SSH key exchange,
//! password authentication and the `sftp` subsystem request. Any failure after
//! the TCP connection is up disconnects the channel before returning.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use russh_keys::key::PublicKey;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tracing::{debug, info};

use super::{RemoteFile, Session, Transport};
use crate::config::ConnectionConfig;
use crate::error::RemoteError;

/// SSH client callbacks.
///
/// Host keys are accepted without verification; the fingerprint is logged so
/// it can be checked by hand.
struct ClientHandler {
    endpoint: String,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            endpoint = %self.endpoint,
            fingerprint = %server_public_key.fingerprint(),
            "accepting server host key"
        );
        Ok(true)
    }
}

/// Open an authenticated SFTP session.
///
/// `timeout` bounds the TCP connect, handshake, authentication and subsystem
/// start together.
pub async fn connect(
    config: &ConnectionConfig,
    timeout: Option<Duration>,
) -> Result<Session<SftpTransport>, RemoteError> {
    let endpoint = config.endpoint();

    let transport = match timeout {
        Some(limit) => tokio::time::timeout(limit, establish(config))
            .await
            .map_err(|_| RemoteError::Connection {
                endpoint: endpoint.clone(),
                reason: format!("timed out after {limit:?}"),
            })??,
        None => establish(config).await?,
    };

    info!(endpoint = %endpoint, user = %config.username, "connected and authenticated");
    Ok(Session::new(endpoint, config.username.clone(), transport))
}

async fn establish(config: &ConnectionConfig) -> Result<SftpTransport, RemoteError> {
    let endpoint = config.endpoint();
    let handler = ClientHandler {
        endpoint: endpoint.clone(),
    };

    let ssh_config = Arc::new(client::Config::default());
    let mut handle = client::connect(ssh_config, (config.host.as_str(), config.port), handler)
        .await
        .map_err(|e| RemoteError::Connection {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
    debug!(endpoint = %endpoint, "SSH handshake complete");

    let authenticated = match handle
        .authenticate_password(config.username.as_str(), config.password.as_str())
        .await
    {
        Ok(accepted) => accepted,
        Err(e) => {
            disconnect_quietly(&handle).await;
            return Err(RemoteError::Connection {
                endpoint,
                reason: format!("authentication exchange failed: {e}"),
            });
        }
    };

    if !authenticated {
        disconnect_quietly(&handle).await;
        return Err(RemoteError::Authentication {
            username: config.username.clone(),
        });
    }

    match start_sftp(&handle).await {
        Ok(sftp) => Ok(SftpTransport { handle, sftp }),
        Err(e) => {
            disconnect_quietly(&handle).await;
            Err(e)
        }
    }
}

async fn start_sftp(handle: &Handle<ClientHandler>) -> Result<SftpSession, RemoteError> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| RemoteError::Protocol {
            operation: "open SSH channel",
            reason: e.to_string(),
        })?;

    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| RemoteError::Protocol {
            operation: "start sftp subsystem",
            reason: e.to_string(),
        })?;

    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| RemoteError::Protocol {
            operation: "initialize sftp session",
            reason: e.to_string(),
        })
}

async fn disconnect_quietly(handle: &Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
    {
        debug!(error = %e, "disconnect after failed setup");
    }
}

/// SFTP session plus the SSH channel carrying it.
pub struct SftpTransport {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
}

#[async_trait]
impl Transport for SftpTransport {
    type File = SftpFile;

    async fn open(&mut self, path: &str) -> Result<SftpFile, RemoteError> {
        let file = self.sftp.open(path).await.map_err(|e| open_error(e, path))?;
        Ok(SftpFile {
            inner: Box::pin(file),
        })
    }

    async fn shutdown(&mut self) -> Result<(), RemoteError> {
        // The channel is disconnected even when closing the SFTP session fails.
        let session = self
            .sftp
            .close()
            .await
            .map_err(|e| RemoteError::Teardown {
                resource: "sftp session",
                reason: e.to_string(),
            });

        let channel = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| RemoteError::Teardown {
                resource: "ssh channel",
                reason: e.to_string(),
            });

        session.and(channel)
    }
}

/// Remote file opened over SFTP.
pub struct SftpFile {
    inner: Pin<Box<File>>,
}

impl AsyncRead for SftpFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

#[async_trait]
impl RemoteFile for SftpFile {
    async fn close(&mut self) -> Result<(), RemoteError> {
        // Shutting down an SFTP file sends the CLOSE request for its handle.
        self.inner
            .shutdown()
            .await
            .map_err(|e| RemoteError::Teardown {
                resource: "remote file",
                reason: e.to_string(),
            })
    }
}

fn open_error(err: SftpError, path: &str) -> RemoteError {
    match &err {
        SftpError::Status(status) => {
            classify_status(&status.status_code, path, &status.error_message)
        }
        _ => RemoteError::Protocol {
            operation: "open remote file",
            reason: err.to_string(),
        },
    }
}

fn classify_status(code: &StatusCode, path: &str, message: &str) -> RemoteError {
    match code {
        StatusCode::NoSuchFile => RemoteError::NotFound {
            path: path.to_string(),
        },
        StatusCode::PermissionDenied => RemoteError::Permission {
            path: path.to_string(),
        },
        _ => RemoteError::Protocol {
            operation: "open remote file",
            reason: format!("{path}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config(port: u16) -> ConnectionConfig {
        ConnectionConfig {
            host: "127.0.0.1".into(),
            port,
            username: "stream_user".into(),
            password: "stream123".into(),
            remote_path: "customers.csv".into(),
        }
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(&StatusCode::NoSuchFile, "customers.csv", "no such file"),
            RemoteError::NotFound { path } if path == "customers.csv"
        ));
        assert!(matches!(
            classify_status(&StatusCode::PermissionDenied, "customers.csv", "denied"),
            RemoteError::Permission { .. }
        ));
        assert!(matches!(
            classify_status(&StatusCode::Failure, "customers.csv", "disk on fire"),
            RemoteError::Protocol { reason, .. } if reason.contains("disk on fire")
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect(&config(port), Some(Duration::from_secs(5))).await;
        assert!(matches!(result, Err(RemoteError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accept the connection and never answer the SSH version exchange.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let result = connect(&config(port), Some(Duration::from_millis(200))).await;
        match result {
            Err(RemoteError::Connection { reason, .. }) => assert!(reason.contains("timed out")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("handshake cannot succeed against a silent server"),
        }
        server.abort();
    }
}
