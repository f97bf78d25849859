//! Byte-stream views of the negotiated connection
//!
//! Whatever transport the negotiator ends up on, callers get a
//! [`DuplexStream`] implementing tokio's `AsyncRead` and `AsyncWrite`.
//! On WebSocket every inbound binary or text message is concatenated into
//! the read side and every write becomes one binary message.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Transport a [`DuplexStream`] runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Baseline WebSocket connection
    WebSocket,
    /// Upgraded QUIC stream
    Quic,
}

pin_project! {
    /// WebSocket connection as a byte stream
    pub struct WsDuplex<S> {
        #[pin]
        inner: WebSocketStream<S>,
        pending: Bytes,
        eof: bool,
    }
}

impl<S> WsDuplex<S> {
    /// Wrap an established WebSocket
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self {
            inner,
            pending: Bytes::new(),
            eof: false,
        }
    }
}

impl<S> AsyncRead for WsDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut this = self.project();

        loop {
            if !this.pending.is_empty() {
                let n = buf.remaining().min(this.pending.len());
                buf.put_slice(&this.pending.split_to(n));
                return Poll::Ready(Ok(()));
            }

            if *this.eof {
                return Poll::Ready(Ok(()));
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(Message::Binary(data))) => *this.pending = data,
                Some(Ok(Message::Text(text))) => {
                    *this.pending = Bytes::copy_from_slice(text.as_bytes());
                }
                Some(Ok(Message::Close(_)))
                | Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed))
                | None => *this.eof = true,
                // ping, pong and raw frames carry no payload for the reader
                Some(Ok(_)) => {}
                Some(Err(e)) => return Poll::Ready(Err(io::Error::other(e))),
            }
        }
    }
}

impl<S> AsyncWrite for WsDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let mut this = self.project();
        ready!(Sink::<Message>::poll_ready(this.inner.as_mut(), cx)).map_err(io::Error::other)?;
        this.inner
            .as_mut()
            .start_send(Message::Binary(Bytes::copy_from_slice(buf)))
            .map_err(io::Error::other)?;

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Sink::<Message>::poll_flush(self.project().inner, cx).map_err(io::Error::other)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match ready!(Sink::<Message>::poll_close(self.project().inner, cx)) {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Poll::Ready(Ok(())),
            Err(e) => Poll::Ready(Err(io::Error::other(e))),
        }
    }
}

pin_project! {
    /// One bidirectional QUIC stream, owning its connection and endpoint
    pub struct QuicDuplex {
        #[pin]
        send: quinn::SendStream,
        #[pin]
        recv: quinn::RecvStream,
        connection: quinn::Connection,
        _endpoint: quinn::Endpoint,
    }
}

impl QuicDuplex {
    /// Bundle an opened stream with the connection and endpoint it needs
    pub fn new(
        send: quinn::SendStream,
        recv: quinn::RecvStream,
        connection: quinn::Connection,
        endpoint: quinn::Endpoint,
    ) -> Self {
        Self {
            send,
            recv,
            connection,
            _endpoint: endpoint,
        }
    }

    /// Underlying QUIC connection
    pub fn connection(&self) -> &quinn::Connection {
        &self.connection
    }
}

impl AsyncRead for QuicDuplex {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        AsyncRead::poll_read(self.project().recv, cx, buf)
    }
}

impl AsyncWrite for QuicDuplex {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        AsyncWrite::poll_write(self.project().send, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_flush(self.project().send, cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_shutdown(self.project().send, cx)
    }
}

/// Negotiated connection
pub enum DuplexStream {
    /// Stayed on the baseline WebSocket
    WebSocket(WsDuplex<MaybeTlsStream<TcpStream>>),
    /// Upgraded to a QUIC stream
    Quic(QuicDuplex),
}

impl DuplexStream {
    /// Transport this stream runs over
    pub fn transport(&self) -> Transport {
        match self {
            DuplexStream::WebSocket(_) => Transport::WebSocket,
            DuplexStream::Quic(_) => Transport::Quic,
        }
    }
}

impl std::fmt::Debug for DuplexStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DuplexStream").field(&self.transport()).finish()
    }
}

impl AsyncRead for DuplexStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DuplexStream::WebSocket(s) => Pin::new(s).poll_read(cx, buf),
            DuplexStream::Quic(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DuplexStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DuplexStream::WebSocket(s) => Pin::new(s).poll_write(cx, buf),
            DuplexStream::Quic(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DuplexStream::WebSocket(s) => Pin::new(s).poll_flush(cx),
            DuplexStream::Quic(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DuplexStream::WebSocket(s) => Pin::new(s).poll_shutdown(cx),
            DuplexStream::Quic(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream as Pipe};
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn pair() -> (WsDuplex<Pipe>, WebSocketStream<Pipe>) {
        let (a, b) = tokio::io::duplex(4096);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (WsDuplex::new(client), server)
    }

    #[tokio::test]
    async fn test_reads_concatenate_messages() {
        let (mut duplex, mut server) = pair().await;

        server.send(Message::Binary(Bytes::from_static(b"12:00"))).await.unwrap();
        server.send(Message::Ping(Bytes::new())).await.unwrap();
        server.send(Message::text("12:01")).await.unwrap();
        server.close(None).await.unwrap();

        let mut out = String::new();
        duplex.read_to_string(&mut out).await.unwrap();

        assert_eq!(out, "12:0012:01");
    }

    #[tokio::test]
    async fn test_small_reads_split_message() {
        let (mut duplex, mut server) = pair().await;

        server.send(Message::Binary(Bytes::from_static(b"abcdef"))).await.unwrap();

        let mut buf = [0u8; 4];
        let n = duplex.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abcd");

        let n = duplex.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ef");
    }

    #[tokio::test]
    async fn test_write_sends_binary_message() {
        use futures::StreamExt;

        let (mut duplex, mut server) = pair().await;

        duplex.write_all(b"hello").await.unwrap();
        duplex.flush().await.unwrap();

        let message = server.next().await.unwrap().unwrap();
        assert_eq!(message, Message::Binary(Bytes::from_static(b"hello")));
    }
}
