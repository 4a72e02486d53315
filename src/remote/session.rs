//! Session and stream lifecycle.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tracing::{debug, warn};

use super::{RemoteFile, Transport};
use crate::error::RemoteError;

/// Marker shared between a session and its streams.
///
/// The session holds the only strong reference; dropping it on close makes
/// every outstanding `Weak` fail to upgrade.
#[derive(Debug)]
struct Liveness;

/// One authenticated connection to a remote host.
pub struct Session<T: Transport> {
    endpoint: String,
    username: String,
    transport: Option<T>,
    liveness: Option<Arc<Liveness>>,
}

impl<T: Transport> Session<T> {
    /// Wrap an already authenticated transport.
    pub fn new(endpoint: impl Into<String>, username: impl Into<String>, transport: T) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            transport: Some(transport),
            liveness: Some(Arc::new(Liveness)),
        }
    }

    /// `host:port` of the remote side.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Open `path` as a forward-only stream bound to this session.
    pub async fn open_file(&mut self, path: &str) -> Result<RemoteStream<T::File>, RemoteError> {
        let (Some(transport), Some(liveness)) = (self.transport.as_mut(), self.liveness.as_ref())
        else {
            return Err(RemoteError::SessionClosed);
        };

        let file = transport.open(path).await?;
        debug!(endpoint = %self.endpoint, path, "remote file opened");

        Ok(RemoteStream {
            file,
            path: path.to_string(),
            session: Arc::downgrade(liveness),
            bytes_read: 0,
        })
    }

    /// Close the session, invalidating every stream derived from it.
    ///
    /// Closing an already closed session is a no-op.
    pub async fn close(&mut self) -> Result<(), RemoteError> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        self.liveness = None;

        transport.shutdown().await?;
        debug!(endpoint = %self.endpoint, "session closed");
        Ok(())
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!(endpoint = %self.endpoint, "session dropped without being closed");
        }
    }
}

/// Forward-only byte source for one remote file.
///
/// Reads fail with [`io::ErrorKind::NotConnected`] once the owning session has
/// been closed.
pub struct RemoteStream<F> {
    file: F,
    path: String,
    session: Weak<Liveness>,
    bytes_read: u64,
}

impl<F: RemoteFile> RemoteStream<F> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Total bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether the owning session is still open.
    pub fn is_valid(&self) -> bool {
        self.session.strong_count() > 0
    }

    /// Release the remote handle.
    ///
    /// If the session is already gone the handle went with it and there is
    /// nothing left to release.
    pub async fn close(mut self) -> Result<(), RemoteError> {
        if !self.is_valid() {
            debug!(path = %self.path, "stream outlived its session, nothing to close");
            return Ok(());
        }
        self.file.close().await?;
        debug!(path = %self.path, bytes = self.bytes_read, "remote file closed");
        Ok(())
    }
}

impl<F: RemoteFile> AsyncRead for RemoteStream<F> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.is_valid() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("session for {} is closed", this.path),
            )));
        }

        let before = buf.filled().len();
        let poll = Pin::new(&mut this.file).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            this.bytes_read += (buf.filled().len() - before) as u64;
        }
        poll
    }
}
