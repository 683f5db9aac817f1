//! Header block framing (RFC 7540 Section 4.3 and 6.10)
//!
//! A header block larger than the peer's maximum frame size leaves in one
//! HEADERS or PUSH_PROMISE frame followed by CONTINUATION frames. On the
//! receiving side the fragments are stitched back together and handed to
//! the HPACK decoder only once END_HEADERS arrives, so the dynamic table
//! changes for a whole block or not at all.

use super::error::{Error, Result};
use super::frames::{ContinuationFrame, Frame, HeadersFrame, PrioritySpec, PushPromiseFrame};
use bytes::{Bytes, BytesMut};

/// Default cap on a reassembled header block (256 KiB)
pub const DEFAULT_MAX_HEADER_BLOCK_SIZE: usize = 256 * 1024;

/// Split a HEADERS frame carrying a complete header block into frames no
/// larger than `max_frame_size`.
///
/// Padding and priority stay on the first frame and count against its size.
/// END_HEADERS is set on the last frame only.
pub fn fragment_header_block(headers: HeadersFrame, max_frame_size: usize) -> Result<Vec<Frame>> {
    let first_capacity = first_capacity(headers.overhead(), max_frame_size)?;
    let stream_id = headers.stream_id;
    let mut head = headers;
    let rest = split_block(&mut head.header_block, first_capacity);
    head.end_headers = rest.is_empty();

    let mut frames = vec![Frame::Headers(head)];
    push_continuations(&mut frames, stream_id, rest, max_frame_size);
    Ok(frames)
}

/// Same as [`fragment_header_block`] for a PUSH_PROMISE frame
pub fn fragment_push_promise(promise: PushPromiseFrame, max_frame_size: usize) -> Result<Vec<Frame>> {
    let first_capacity = first_capacity(promise.overhead(), max_frame_size)?;
    let stream_id = promise.stream_id;
    let mut head = promise;
    let rest = split_block(&mut head.header_block, first_capacity);
    head.end_headers = rest.is_empty();

    let mut frames = vec![Frame::PushPromise(head)];
    push_continuations(&mut frames, stream_id, rest, max_frame_size);
    Ok(frames)
}

fn first_capacity(overhead: usize, max_frame_size: usize) -> Result<usize> {
    if max_frame_size == 0 || overhead >= max_frame_size {
        return Err(Error::FrameSize(format!(
            "frame overhead of {} bytes leaves no room in {} byte frames",
            overhead, max_frame_size
        )));
    }
    Ok(max_frame_size - overhead)
}

/// Keep the first `capacity` bytes in `block`, return the remainder
fn split_block(block: &mut Bytes, capacity: usize) -> Bytes {
    if block.len() > capacity {
        block.split_off(capacity)
    } else {
        Bytes::new()
    }
}

fn push_continuations(frames: &mut Vec<Frame>, stream_id: u32, mut rest: Bytes, max_frame_size: usize) {
    while !rest.is_empty() {
        let chunk = rest.split_to(rest.len().min(max_frame_size));
        frames.push(Frame::Continuation(ContinuationFrame::new(
            stream_id,
            chunk,
            rest.is_empty(),
        )));
    }
}

/// Frame that opened a header block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderBlockKind {
    /// HEADERS frame
    Headers {
        /// END_STREAM of the HEADERS frame
        end_stream: bool,
        /// Priority carried by the HEADERS frame
        priority: Option<PrioritySpec>,
    },
    /// PUSH_PROMISE frame
    PushPromise {
        /// Stream reserved by the promise
        promised_stream_id: u32,
    },
}

/// A reassembled header block, ready for the HPACK decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Stream the block belongs to
    pub stream_id: u32,
    /// What opened the block
    pub kind: HeaderBlockKind,
    /// Concatenated fragments
    pub block: Bytes,
}

#[derive(Debug)]
struct Pending {
    stream_id: u32,
    kind: HeaderBlockKind,
    fragments: BytesMut,
}

/// Collects HEADERS/PUSH_PROMISE + CONTINUATION fragments per connection
///
/// While a block is open, any frame other than a CONTINUATION on the same
/// stream is a connection error of type PROTOCOL_ERROR. A block that grows
/// past `max_block_size` is dropped with [`Error::HeaderBlockTooLarge`].
#[derive(Debug)]
pub struct HeaderBlockAssembler {
    pending: Option<Pending>,
    max_block_size: usize,
}

impl HeaderBlockAssembler {
    /// Create an assembler with no block open and the default size cap
    pub fn new() -> Self {
        HeaderBlockAssembler::with_max_block_size(DEFAULT_MAX_HEADER_BLOCK_SIZE)
    }

    /// Create an assembler that buffers at most `max_block_size` bytes per block
    pub fn with_max_block_size(max_block_size: usize) -> Self {
        HeaderBlockAssembler {
            pending: None,
            max_block_size,
        }
    }

    /// Largest header block this assembler will buffer
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Change the cap; applies to fragments pushed from now on
    pub fn set_max_block_size(&mut self, max_block_size: usize) {
        self.max_block_size = max_block_size;
    }

    /// Stream whose block is waiting for CONTINUATION frames
    pub fn expecting_continuation(&self) -> Option<u32> {
        self.pending.as_ref().map(|pending| pending.stream_id)
    }

    /// Feed one received frame.
    ///
    /// Returns the completed block when this frame ends one. Frames that do
    /// not carry header block fragments pass through as `Ok(None)`.
    pub fn push(&mut self, frame: &Frame) -> Result<Option<HeaderBlock>> {
        if let Some(pending) = self.pending.as_mut() {
            let continuation = match frame {
                Frame::Continuation(cont) if cont.stream_id == pending.stream_id => cont,
                other => {
                    return Err(Error::Protocol(format!(
                        "expected CONTINUATION on stream {}, got {}",
                        pending.stream_id, other
                    )))
                }
            };

            let size = pending.fragments.len() + continuation.header_block.len();
            if size > self.max_block_size {
                self.pending = None;
                return Err(self.too_large(size));
            }

            pending.fragments.extend_from_slice(&continuation.header_block);
            if !continuation.end_headers {
                return Ok(None);
            }

            return Ok(self.pending.take().map(|done| HeaderBlock {
                stream_id: done.stream_id,
                kind: done.kind,
                block: done.fragments.freeze(),
            }));
        }

        let (stream_id, kind, fragment, end_headers) = match frame {
            Frame::Headers(headers) => (
                headers.stream_id,
                HeaderBlockKind::Headers {
                    end_stream: headers.end_stream,
                    priority: headers.priority,
                },
                &headers.header_block,
                headers.end_headers,
            ),
            Frame::PushPromise(promise) => (
                promise.stream_id,
                HeaderBlockKind::PushPromise {
                    promised_stream_id: promise.promised_stream_id,
                },
                &promise.header_block,
                promise.end_headers,
            ),
            Frame::Continuation(cont) => {
                return Err(Error::Protocol(format!(
                    "CONTINUATION on stream {} without an open header block",
                    cont.stream_id
                )))
            }
            _ => return Ok(None),
        };

        if fragment.len() > self.max_block_size {
            return Err(self.too_large(fragment.len()));
        }

        if end_headers {
            return Ok(Some(HeaderBlock {
                stream_id,
                kind,
                block: fragment.clone(),
            }));
        }

        tracing::trace!(stream_id, fragment = fragment.len(), "header block continues");
        self.pending = Some(Pending {
            stream_id,
            kind,
            fragments: BytesMut::from(&fragment[..]),
        });
        Ok(None)
    }

    fn too_large(&self, size: usize) -> Error {
        tracing::debug!(size, limit = self.max_block_size, "header block dropped");
        Error::HeaderBlockTooLarge {
            size,
            limit: self.max_block_size,
        }
    }
}

impl Default for HeaderBlockAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2::error::ErrorCode;
    use crate::h2::frames::{FrameType, PingFrame};

    fn block(len: usize) -> Bytes {
        (0..len).map(|i| i as u8).collect::<Vec<u8>>().into()
    }

    #[test]
    fn test_small_block_single_frame() {
        let frames = fragment_header_block(HeadersFrame::new(1, block(10), true, false), 16).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].flags().is_end_headers());
        assert!(frames[0].flags().is_end_stream());
    }

    #[test]
    fn test_large_block_uses_continuation() {
        let frames = fragment_header_block(HeadersFrame::new(1, block(40), false, true), 16).unwrap();
        let kinds: Vec<_> = frames.iter().map(|f| f.frame_type()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(FrameType::Headers),
                Some(FrameType::Continuation),
                Some(FrameType::Continuation)
            ]
        );
        assert!(!frames[0].flags().is_end_headers());
        assert!(!frames[1].flags().is_end_headers());
        assert!(frames[2].flags().is_end_headers());

        // END_STREAM stays on the HEADERS frame
        assert!(!frames[2].flags().is_end_stream());
    }

    #[test]
    fn test_overhead_counts_against_first_frame() {
        let headers = HeadersFrame::new(1, block(20), false, true)
            .with_priority(PrioritySpec::new(0, false, 15))
            .with_padding(2);
        let frames = fragment_header_block(headers, 16).unwrap();

        // 16 - (5 priority + 1 pad length + 2 padding) = 8 block bytes
        match &frames[0] {
            Frame::Headers(h) => assert_eq!(h.header_block.len(), 8),
            other => panic!("unexpected {}", other),
        }
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_overhead_too_large() {
        let headers = HeadersFrame::new(1, block(1), false, true).with_padding(20);
        assert!(fragment_header_block(headers, 16).is_err());
    }

    #[test]
    fn test_reassembly() {
        let whole = block(100);
        let frames = fragment_header_block(HeadersFrame::new(5, whole.clone(), true, true), 30).unwrap();
        assert_eq!(frames.len(), 4);

        let mut assembler = HeaderBlockAssembler::new();
        let mut done = None;
        for frame in &frames {
            assert!(done.is_none());
            done = assembler.push(frame).unwrap();
        }

        let done = done.unwrap();
        assert_eq!(done.stream_id, 5);
        assert_eq!(done.block, whole);
        assert_eq!(
            done.kind,
            HeaderBlockKind::Headers {
                end_stream: true,
                priority: None
            }
        );
        assert_eq!(assembler.expecting_continuation(), None);
    }

    #[test]
    fn test_push_promise_reassembly() {
        // 16 bytes after the promised stream ID, then 20 + 14
        let frames = fragment_push_promise(PushPromiseFrame::new(1, 2, block(50), true), 20).unwrap();
        assert_eq!(frames.len(), 3);

        let mut assembler = HeaderBlockAssembler::new();
        let done: Vec<_> = frames
            .iter()
            .filter_map(|frame| assembler.push(frame).unwrap())
            .collect();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].kind, HeaderBlockKind::PushPromise { promised_stream_id: 2 });
        assert_eq!(done[0].block, block(50));
    }

    #[test]
    fn test_interleaved_frame_rejected() {
        let frames = fragment_header_block(HeadersFrame::new(1, block(40), false, true), 16).unwrap();
        let mut assembler = HeaderBlockAssembler::new();
        assert!(assembler.push(&frames[0]).unwrap().is_none());
        assert_eq!(assembler.expecting_continuation(), Some(1));

        let err = assembler.push(&Frame::from(PingFrame::new([0; 8]))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn test_continuation_on_other_stream_rejected() {
        let mut assembler = HeaderBlockAssembler::new();
        assembler
            .push(&Frame::from(HeadersFrame::new(1, block(4), false, false)))
            .unwrap();
        let stray = Frame::from(ContinuationFrame::new(3, block(4), true));
        assert!(assembler.push(&stray).is_err());
    }

    #[test]
    fn test_unexpected_continuation_rejected() {
        let mut assembler = HeaderBlockAssembler::new();
        let stray = Frame::from(ContinuationFrame::new(1, block(4), true));
        assert!(matches!(assembler.push(&stray), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_block_size_cap_on_continuation() {
        let mut assembler = HeaderBlockAssembler::with_max_block_size(64);
        assembler
            .push(&Frame::from(HeadersFrame::new(1, block(16), false, false)))
            .unwrap();

        let more = Frame::from(ContinuationFrame::new(1, block(16), false));
        for _ in 0..3 {
            assert_eq!(assembler.push(&more).unwrap(), None);
        }

        // 80 bytes would be buffered
        let err = assembler.push(&more).unwrap_err();
        assert!(matches!(err, Error::HeaderBlockTooLarge { size: 80, limit: 64 }));
        assert_eq!(err.code(), ErrorCode::EnhanceYourCalm);
        assert_eq!(assembler.expecting_continuation(), None);
    }

    #[test]
    fn test_block_size_cap_on_first_fragment() {
        let mut assembler = HeaderBlockAssembler::new();
        assembler.set_max_block_size(8);
        assert_eq!(assembler.max_block_size(), 8);

        let headers = Frame::from(HeadersFrame::new(1, block(9), true, true));
        assert!(matches!(
            assembler.push(&headers),
            Err(Error::HeaderBlockTooLarge { size: 9, limit: 8 })
        ));

        let fits = Frame::from(HeadersFrame::new(1, block(8), true, true));
        assert!(assembler.push(&fits).unwrap().is_some());
    }

    #[test]
    fn test_other_frames_pass_through() {
        let mut assembler = HeaderBlockAssembler::new();
        assert_eq!(assembler.push(&Frame::from(PingFrame::new([1; 8]))).unwrap(), None);
    }
}
