//! The concrete byte transport under the packet codec: TCP (always), Unix domain
//! sockets (`cfg(unix)`, mirroring `sqlx-core`'s own `#[cfg(unix)] UnixStream` gate),
//! and an optional TLS upgrade performed in place over either one.
//!
//! Grounded on `sqlx-core/src/net/tls/mod.rs`'s `MaybeTlsStream` shape, collapsed from
//! its rustls/native-tls dual-backend enum down to a single `tokio-native-tls` backend
//! (see DESIGN.md) and with named pipes left unimplemented per the external-interfaces
//! non-goal addendum.

use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use native_tls::TlsConnector as NativeTlsConnector;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio_native_tls::{TlsConnector, TlsStream};

use mason_core::{Error, Result};

pub(crate) enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    TlsOverTcp(TlsStream<TcpStream>),
    #[cfg(unix)]
    TlsOverUnix(TlsStream<UnixStream>),
    /// Transient state while `upgrade` owns the inner stream; never observed outside
    /// of a panicking bug, since `upgrade` always replaces it before returning.
    Upgrading,
}

impl Transport {
    pub(crate) async fn connect_tcp(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await.map_err(Error::Io)?;
        stream.set_nodelay(true).map_err(Error::Io)?;
        Ok(Self::Tcp(stream))
    }

    #[cfg(unix)]
    pub(crate) async fn connect_unix(path: &std::path::Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await.map_err(Error::Io)?;
        Ok(Self::Unix(stream))
    }

    pub(crate) fn is_tls(&self) -> bool {
        matches!(self, Self::TlsOverTcp(_) | Self::TlsOverUnix(_))
    }

    /// Performs the TLS handshake in place over the current stream. Called after the
    /// `SSLRequest` packet has been sent and before the `HandshakeResponse`.
    pub(crate) async fn upgrade(
        &mut self,
        host: &str,
        accept_invalid_certs: bool,
        accept_invalid_hostnames: bool,
    ) -> Result<()> {
        let mut builder = NativeTlsConnector::builder();
        builder.danger_accept_invalid_certs(accept_invalid_certs);
        builder.danger_accept_invalid_hostnames(accept_invalid_hostnames);
        let connector: TlsConnector = builder
            .build()
            .map_err(|e| Error::Tls(Box::new(e)))?
            .into();

        match mem::replace(self, Self::Upgrading) {
            Self::Tcp(stream) => {
                let tls = connector.connect(host, stream).await.map_err(|e| Error::Tls(Box::new(e)))?;
                *self = Self::TlsOverTcp(tls);
            }
            #[cfg(unix)]
            Self::Unix(stream) => {
                let tls = connector.connect(host, stream).await.map_err(|e| Error::Tls(Box::new(e)))?;
                *self = Self::TlsOverUnix(tls);
            }
            already_tls @ (Self::TlsOverTcp(_) | Self::TlsOverUnix(_)) => {
                *self = already_tls;
            }
            Self::Upgrading => unreachable!("upgrade is not reentrant"),
        }

        Ok(())
    }
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_read(cx, buf),
            Self::TlsOverTcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Self::TlsOverUnix(s) => Pin::new(s).poll_read(cx, buf),
            Self::Upgrading => unreachable!("upgrade is not reentrant"),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_write(cx, buf),
            Self::TlsOverTcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Self::TlsOverUnix(s) => Pin::new(s).poll_write(cx, buf),
            Self::Upgrading => unreachable!("upgrade is not reentrant"),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_flush(cx),
            Self::TlsOverTcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Self::TlsOverUnix(s) => Pin::new(s).poll_flush(cx),
            Self::Upgrading => unreachable!("upgrade is not reentrant"),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_shutdown(cx),
            Self::TlsOverTcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Self::TlsOverUnix(s) => Pin::new(s).poll_shutdown(cx),
            Self::Upgrading => unreachable!("upgrade is not reentrant"),
        }
    }
}
