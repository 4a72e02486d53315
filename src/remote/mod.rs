//! Remote file access.
//!
//! ## Design
//!
//! The lifecycle rules live in [`Session`] and [`RemoteStream`], which are
//! generic over a [`Transport`]:
//! - `Transport` owns the encrypted channel and opens files on it
//! - `RemoteFile` is a forward-only byte source that can be closed
//! - `Session` tracks open/closed state and invalidates its streams on close
//!
//! [`sftp::SftpTransport`] is the production transport (SSH + SFTP via russh).

mod session;
pub mod sftp;

pub use session::{RemoteStream, Session};
pub use sftp::{connect, SftpFile, SftpTransport};

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::RemoteError;

/// An authenticated channel able to open remote files for reading.
#[async_trait]
pub trait Transport: Send {
    /// The file handle type this transport produces
    type File: RemoteFile;

    /// Open `path` for sequential reading.
    async fn open(&mut self, path: &str) -> Result<Self::File, RemoteError>;

    /// Release the file session and then the underlying channel.
    ///
    /// Called at most once, by [`Session::close`].
    async fn shutdown(&mut self) -> Result<(), RemoteError>;
}

/// A remote file handle opened for reading.
#[async_trait]
pub trait RemoteFile: AsyncRead + Unpin + Send {
    /// Release the remote handle.
    async fn close(&mut self) -> Result<(), RemoteError>;
}
