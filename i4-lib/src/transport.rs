//! Byte-stream source the sequencer reads from.
//!
//! Any tokio `AsyncRead` is a [`Transport`]: a `TcpStream` in production,
//! a byte slice or a `duplex` half in tests.

use crate::error::I4Error;
use bytes::{Bytes, BytesMut};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

pub trait Transport {
    /// Read `len` bytes.
    ///
    /// Fails with [`I4Error::TransportClosed`] if the stream ends before the
    /// first byte and with [`I4Error::Transport`] on I/O failure. If the stream
    /// ends part-way through, the short block is returned as is so the decoder
    /// reports it as malformed.
    fn read_block(&mut self, len: usize) -> impl Future<Output = Result<Bytes, I4Error>> + Send;
}

impl<R: AsyncRead + Unpin + Send> Transport for R {
    async fn read_block(&mut self, len: usize) -> Result<Bytes, I4Error> {
        let mut buf = BytesMut::zeroed(len);
        let mut filled = 0;

        while filled < len {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 && len > 0 {
            return Err(I4Error::TransportClosed);
        }
        if filled < len {
            trace!("Short read: wanted {} bytes, stream ended after {}", len, filled);
        }

        buf.truncate(filled);
        Ok(buf.freeze())
    }
}
