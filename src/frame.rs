/*
 * Created on Mon Jul 27 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Frame codec
//!
//! A framed packet on the wire is:
//!
//! ```text
//! START(4) | TYPE(1) | LEN(4, little-endian) | PAYLOAD(LEN) | END(4)
//! ```
//!
//! `START`/`END` are each four repetitions of a single configured byte.
//! `TYPE` is always [`TYPE_CONTAINER`]; any other value is dropped. A read
//! that doesn't land cleanly on a well-formed frame resyncs by continuing
//! to scan for the next run of four `START` bytes rather than erroring out
//! — this is what keeps the receive task alive across a peer sending
//! garbage, a truncated frame, or a mismatched tail.

use crate::error::{Error, NetResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The only `TYPE` byte this crate emits or accepts; any other value
/// causes the frame to be dropped and the reader to resync.
pub const TYPE_CONTAINER: u8 = 0x02;

/// A frame codec bound to a pair of sentinel bytes and a maximum payload
/// size. One instance is shared read-only between all sessions: the
/// sentinels are per-endpoint configuration, not per-connection state.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    start: u8,
    end: u8,
    max_len: u32,
}

impl FrameCodec {
    pub const fn new(start: u8, end: u8, max_len: u32) -> Self {
        Self { start, end, max_len }
    }

    /// Read one frame's payload. Returns `Ok(None)` on a clean end of
    /// stream encountered while hunting for the next `START` run (i.e.
    /// the peer simply closed the connection); any I/O error, including
    /// an end of stream in the middle of a frame, is propagated and
    /// should terminate the caller's receive loop.
    pub async fn read_frame<R: AsyncRead + Unpin>(&self, r: &mut R) -> NetResult<Option<Vec<u8>>> {
        loop {
            if !self.sync(r).await? {
                return Ok(None);
            }
            let ty = read_byte(r).await?;
            if ty != TYPE_CONTAINER {
                continue;
            }
            let mut len_buf = [0u8; 4];
            r.read_exact(&mut len_buf).await?;
            let len = u32::from_le_bytes(len_buf);
            if len > self.max_len {
                continue;
            }
            let mut payload = vec![0u8; len as usize];
            r.read_exact(&mut payload).await?;
            let mut tail = [0u8; 4];
            r.read_exact(&mut tail).await?;
            if tail != [self.end; 4] {
                continue;
            }
            return Ok(Some(payload));
        }
    }

    /// Advance `r` until four consecutive `start` bytes have been seen.
    /// `Ok(false)` means the stream ended cleanly before that happened.
    async fn sync<R: AsyncRead + Unpin>(&self, r: &mut R) -> NetResult<bool> {
        let mut run = 0u32;
        loop {
            let mut b = [0u8; 1];
            let n = r.read(&mut b).await?;
            if n == 0 {
                return Ok(false);
            }
            run = if b[0] == self.start { run + 1 } else { 0 };
            if run == 4 {
                return Ok(true);
            }
        }
    }

    /// Write one frame as a single contiguous buffer. A single
    /// `write_all` call keeps the five segments from being interleaved
    /// with another writer on the same socket; callers still need to
    /// serialize concurrent writers on one session through a lock, since
    /// this alone doesn't make two concurrent `write_frame` calls atomic
    /// with respect to each other.
    pub async fn write_frame<W: AsyncWrite + Unpin>(&self, w: &mut W, payload: &[u8]) -> NetResult<()> {
        if payload.len() > self.max_len as usize {
            return Err(Error::protocol(format!(
                "payload of {} bytes exceeds configured max frame size of {}",
                payload.len(),
                self.max_len
            )));
        }
        let mut buf = Vec::with_capacity(4 + 1 + 4 + payload.len() + 4);
        buf.extend(std::iter::repeat(self.start).take(4));
        buf.push(TYPE_CONTAINER);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        buf.extend(std::iter::repeat(self.end).take(4));
        w.write_all(&buf).await?;
        w.flush().await?;
        Ok(())
    }
}

async fn read_byte<R: AsyncRead + Unpin>(r: &mut R) -> NetResult<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b).await?;
    Ok(b[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(231, 67, 1024)
    }

    #[tokio::test]
    async fn round_trip() {
        let c = codec();
        let mut buf = Vec::new();
        c.write_frame(&mut buf, b"hello").await.unwrap();
        let mut cursor: &[u8] = &buf;
        let out = c.read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn len_zero_boundary() {
        let c = codec();
        let mut buf = Vec::new();
        c.write_frame(&mut buf, b"").await.unwrap();
        let mut cursor: &[u8] = &buf;
        let out = c.read_frame(&mut cursor).await.unwrap().unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn resyncs_past_junk_prefix() {
        let c = codec();
        let mut wire = vec![9, 9, 9, 231, 1, 2]; // junk, then a partial false-start
        let mut good = Vec::new();
        c.write_frame(&mut good, b"payload").await.unwrap();
        wire.extend(good);
        let mut cursor: &[u8] = &wire;
        let out = c.read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(out, b"payload");
    }

    #[tokio::test]
    async fn bad_type_byte_is_dropped_and_resyncs() {
        let c = codec();
        let mut wire = vec![231, 231, 231, 231, 0x05]; // wrong TYPE, no LEN/body follows
        let mut good = Vec::new();
        c.write_frame(&mut good, b"next").await.unwrap();
        wire.extend(good);
        let mut cursor: &[u8] = &wire;
        let out = c.read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(out, b"next");
    }

    #[tokio::test]
    async fn bad_tail_is_dropped_and_resyncs() {
        let c = codec();
        let mut wire = vec![231, 231, 231, 231, TYPE_CONTAINER, 2, 0, 0, 0, b'h', b'i', 0, 0, 0, 0];
        let mut good = Vec::new();
        c.write_frame(&mut good, b"ok").await.unwrap();
        wire.extend(good);
        let mut cursor: &[u8] = &wire;
        let out = c.read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(out, b"ok");
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected() {
        let c = FrameCodec::new(231, 67, 4);
        let mut buf = Vec::new();
        assert!(c.write_frame(&mut buf, b"too big for four").await.is_err());
    }

    #[tokio::test]
    async fn clean_eof_before_any_frame_returns_none() {
        let c = codec();
        let mut cursor: &[u8] = &[];
        assert!(c.read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_mid_frame_is_an_error() {
        let c = codec();
        let wire = vec![231, 231, 231, 231, TYPE_CONTAINER, 5, 0, 0, 0, b'h', b'i'];
        let mut cursor: &[u8] = &wire;
        assert!(c.read_frame(&mut cursor).await.is_err());
    }
}
