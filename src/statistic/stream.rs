//! Byte-counting stream wrapper

use super::TrafficMeter;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Wraps an outbound leg and attributes reads to downstream and writes to
/// upstream on the shared meter.
pub struct MeteredStream<S> {
    inner: S,
    meter: Arc<TrafficMeter>,
}

impl<S> MeteredStream<S> {
    pub fn new(inner: S, meter: Arc<TrafficMeter>) -> Self {
        MeteredStream { inner, meter }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for MeteredStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let result = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let bytes = (buf.filled().len() - before) as u64;
            if bytes > 0 {
                self.meter.record_down(bytes);
            }
        }
        result
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for MeteredStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let result = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &result {
            if *n > 0 {
                self.meter.record_up(*n as u64);
            }
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_metered_stream_counts_both_directions() {
        let meter = Arc::new(TrafficMeter::new());
        let (near, mut far) = tokio::io::duplex(64);
        let mut metered = MeteredStream::new(near, meter.clone());

        metered.write_all(b"hello").await.unwrap();
        metered.flush().await.unwrap();

        let mut buf = [0u8; 5];
        far.read_exact(&mut buf).await.unwrap();
        far.write_all(b"hi").await.unwrap();

        let mut back = [0u8; 2];
        metered.read_exact(&mut back).await.unwrap();

        assert_eq!(meter.total(), (5, 2));
    }

    #[tokio::test]
    async fn test_metering_against_scripted_peer() {
        let meter = Arc::new(TrafficMeter::new());
        let peer = tokio_test::io::Builder::new()
            .write(b"request")
            .read(b"response!")
            .build();
        let mut metered = MeteredStream::new(peer, meter.clone());

        metered.write_all(b"request").await.unwrap();
        let mut buf = [0u8; 9];
        metered.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf, b"response!");
        assert_eq!(meter.total(), (7, 9));
    }
}
