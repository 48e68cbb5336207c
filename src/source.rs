// SPDX-License-Identifier: MIT

//! Pull-based byte sources feeding the decoder.
//!
//! A source yields chunks in arrival order and, once drained, reports whether
//! it finished cleanly. The distinction matters: a connection that drops mid
//! body also ends the chunk sequence, and only the completion state tells the
//! two apart.

use log::{debug, warn};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, SyncSender};

/// Default read size for [`ReaderSource`]
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// One piece of a body as delivered by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Bytes(Vec<u8>),
    Text(String),
}

impl Chunk {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Bytes(bytes) => bytes,
            Chunk::Text(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Bytes(bytes)
    }
}

impl From<&[u8]> for Chunk {
    fn from(bytes: &[u8]) -> Self {
        Chunk::Bytes(bytes.to_vec())
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(text.to_string())
    }
}

/// How a source finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every byte the producer intended to send was delivered
    Ended,
    /// The producer stopped early: dropped connection, short read, abort
    Aborted,
    /// The source cannot tell
    Unknown,
}

pub trait BodySource {
    /// Next chunk, blocking until one is available. `None` once drained.
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>>;

    /// Completion state. Only meaningful after `next_chunk` returned `None`.
    fn completion(&self) -> Completion;
}

impl<S: BodySource + ?Sized> BodySource for &mut S {
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>> {
        (**self).next_chunk()
    }

    fn completion(&self) -> Completion {
        (**self).completion()
    }
}

impl<S: BodySource + ?Sized> BodySource for Box<S> {
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>> {
        (**self).next_chunk()
    }

    fn completion(&self) -> Completion {
        (**self).completion()
    }
}

/// Source over an iterator of chunk results.
///
/// Reports [`Completion::Ended`] once the iterator is drained without error,
/// [`Completion::Aborted`] after it yielded an error.
pub struct IterSource<I> {
    chunks: I,
    completion: Completion,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = io::Result<Chunk>>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            completion: Completion::Unknown,
        }
    }

    /// Override the completion state reported after draining, e.g. to
    /// simulate a producer that never signalled its end.
    pub fn with_completion(self, completion: Completion) -> IterSourceWithCompletion<I> {
        IterSourceWithCompletion {
            inner: self,
            forced: completion,
        }
    }
}

/// Build an [`IterSource`] from infallible chunks
pub fn chunks<I, C>(items: I) -> IterSource<std::iter::Map<I::IntoIter, fn(C) -> io::Result<Chunk>>>
where
    I: IntoIterator<Item = C>,
    C: Into<Chunk>,
{
    let convert: fn(C) -> io::Result<Chunk> = |chunk| Ok(chunk.into());
    IterSource::new(items.into_iter().map(convert))
}

impl<I> BodySource for IterSource<I>
where
    I: Iterator<Item = io::Result<Chunk>>,
{
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>> {
        if self.completion != Completion::Unknown {
            return None;
        }
        match self.chunks.next() {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(e)) => {
                self.completion = Completion::Aborted;
                Some(Err(e))
            }
            None => {
                self.completion = Completion::Ended;
                None
            }
        }
    }

    fn completion(&self) -> Completion {
        self.completion
    }
}

/// [`IterSource`] whose final completion state is fixed by the caller
pub struct IterSourceWithCompletion<I> {
    inner: IterSource<I>,
    forced: Completion,
}

impl<I> BodySource for IterSourceWithCompletion<I>
where
    I: Iterator<Item = io::Result<Chunk>>,
{
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>> {
        self.inner.next_chunk()
    }

    fn completion(&self) -> Completion {
        match self.inner.completion() {
            Completion::Unknown => Completion::Unknown,
            _ => self.forced,
        }
    }
}

/// Source reading fixed-size chunks from any [`Read`].
///
/// With an expected length (typically from `Content-Length`) the source stops
/// after that many bytes and treats an earlier EOF as an aborted body.
/// Without one, EOF means the body ended.
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    expected_len: Option<u64>,
    bytes_read: u64,
    completion: Completion,
    done: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            expected_len: None,
            bytes_read: 0,
            completion: Completion::Unknown,
            done: false,
        }
    }

    /// Expect exactly `len` bytes
    pub fn expect_length(mut self, len: u64) -> Self {
        self.expected_len = Some(len);
        self
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn finish(&mut self, completion: Completion) {
        self.completion = completion;
        self.done = true;
    }
}

impl<R: Read> BodySource for ReaderSource<R> {
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>> {
        if self.done {
            return None;
        }

        let to_read = match self.expected_len {
            Some(expected) => {
                let remaining = expected.saturating_sub(self.bytes_read);
                if remaining == 0 {
                    self.finish(Completion::Ended);
                    return None;
                }
                remaining.min(self.chunk_size as u64) as usize
            }
            None => self.chunk_size,
        };

        let mut buffer = vec![0u8; to_read];
        loop {
            match self.reader.read(&mut buffer) {
                Ok(0) => {
                    match self.expected_len {
                        Some(expected) => {
                            warn!(
                                "Body ended after {} of {} expected bytes",
                                self.bytes_read, expected
                            );
                            self.finish(Completion::Aborted);
                        }
                        None => self.finish(Completion::Ended),
                    }
                    return None;
                }
                Ok(n) => {
                    buffer.truncate(n);
                    self.bytes_read += n as u64;
                    return Some(Ok(Chunk::Bytes(buffer)));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if e.kind() == io::ErrorKind::TimedOut {
                        warn!("Request body read timeout");
                    }
                    self.finish(Completion::Aborted);
                    return Some(Err(e));
                }
            }
        }
    }

    fn completion(&self) -> Completion {
        self.completion
    }
}

/// Message sent from a producer to a [`ChannelSource`]
#[derive(Debug)]
pub enum BodyFrame {
    Chunk(Chunk),
    /// The body is complete
    End,
    /// The producer gave up; the message becomes the read error
    Abort(String),
}

/// Receiving side of a bounded body channel.
///
/// `recv` blocks until the producer sends the next frame, so chunks are
/// observed in the order they were sent. A producer that disconnects without
/// sending [`BodyFrame::End`] leaves the source [`Completion::Aborted`].
pub struct ChannelSource {
    receiver: Receiver<BodyFrame>,
    completion: Completion,
    done: bool,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<BodyFrame>) -> Self {
        Self {
            receiver,
            completion: Completion::Unknown,
            done: false,
        }
    }
}

impl BodySource for ChannelSource {
    fn next_chunk(&mut self) -> Option<io::Result<Chunk>> {
        if self.done {
            return None;
        }
        match self.receiver.recv() {
            Ok(BodyFrame::Chunk(chunk)) => Some(Ok(chunk)),
            Ok(BodyFrame::End) => {
                self.completion = Completion::Ended;
                self.done = true;
                None
            }
            Ok(BodyFrame::Abort(message)) => {
                self.completion = Completion::Aborted;
                self.done = true;
                Some(Err(io::Error::new(io::ErrorKind::ConnectionAborted, message)))
            }
            Err(mpsc::RecvError) => {
                debug!("Body producer disconnected before signalling the end");
                self.completion = Completion::Aborted;
                self.done = true;
                None
            }
        }
    }

    fn completion(&self) -> Completion {
        self.completion
    }
}

/// Producer half of [`body_channel`]
#[derive(Debug, Clone)]
pub struct BodySender {
    sender: SyncSender<BodyFrame>,
}

impl BodySender {
    /// Send a chunk, blocking while the channel is full. Fails once the
    /// consumer is gone.
    pub fn send<C: Into<Chunk>>(&self, chunk: C) -> Result<(), io::Error> {
        self.send_frame(BodyFrame::Chunk(chunk.into()))
    }

    /// Mark the body as complete
    pub fn end(self) -> Result<(), io::Error> {
        self.send_frame(BodyFrame::End)
    }

    /// Abort the body with a reason surfaced to the consumer
    pub fn abort<S: Into<String>>(self, reason: S) -> Result<(), io::Error> {
        self.send_frame(BodyFrame::Abort(reason.into()))
    }

    fn send_frame(&self, frame: BodyFrame) -> Result<(), io::Error> {
        self.sender
            .send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "body consumer has gone away"))
    }
}

/// Bounded channel carrying a body from a producer thread to a decoder.
pub fn body_channel(capacity: usize) -> (BodySender, ChannelSource) {
    let (sender, receiver) = mpsc::sync_channel(capacity);
    (BodySender { sender }, ChannelSource::new(receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;

    fn drain<S: BodySource>(source: &mut S) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = source.next_chunk() {
            out.push(chunk.unwrap().as_bytes().to_vec());
        }
        out
    }

    #[test]
    fn test_iter_source_ends_cleanly() {
        let mut source = chunks(vec!["ab", "cd"]);
        assert_eq!(source.completion(), Completion::Unknown);
        assert_eq!(drain(&mut source), vec![b"ab".to_vec(), b"cd".to_vec()]);
        assert_eq!(source.completion(), Completion::Ended);
        assert!(source.next_chunk().is_none());
    }

    #[test]
    fn test_iter_source_error_aborts() {
        let items: Vec<io::Result<Chunk>> = vec![
            Ok(Chunk::from("ab")),
            Err(io::Error::other("boom")),
            Ok(Chunk::from("never")),
        ];
        let mut source = IterSource::new(items.into_iter());
        assert!(source.next_chunk().unwrap().is_ok());
        assert!(source.next_chunk().unwrap().is_err());
        assert!(source.next_chunk().is_none());
        assert_eq!(source.completion(), Completion::Aborted);
    }

    #[test]
    fn test_forced_completion() {
        let mut source = chunks(vec!["x"]).with_completion(Completion::Aborted);
        assert_eq!(source.completion(), Completion::Unknown);
        drain(&mut source);
        assert_eq!(source.completion(), Completion::Aborted);
    }

    #[test]
    fn test_reader_source_chunks() {
        let mut source = ReaderSource::with_chunk_size(Cursor::new(b"abcdefg".to_vec()), 3);
        let got = drain(&mut source);
        assert_eq!(got, vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]);
        assert_eq!(source.completion(), Completion::Ended);
        assert_eq!(source.bytes_read(), 7);
    }

    #[test]
    fn test_reader_source_short_body_is_aborted() {
        let mut source = ReaderSource::new(Cursor::new(b"abc".to_vec())).expect_length(10);
        drain(&mut source);
        assert_eq!(source.completion(), Completion::Aborted);
    }

    #[test]
    fn test_reader_source_stops_at_expected_length() {
        let mut source = ReaderSource::with_chunk_size(Cursor::new(b"abcdef".to_vec()), 4)
            .expect_length(5);
        let got = drain(&mut source);
        assert_eq!(got, vec![b"abcd".to_vec(), b"e".to_vec()]);
        assert_eq!(source.completion(), Completion::Ended);
    }

    #[test]
    fn test_channel_source_preserves_order() {
        let (sender, mut source) = body_channel(1);
        let producer = thread::spawn(move || {
            for part in ["ab", "cd", "ef"] {
                sender.send(part.as_bytes()).unwrap();
            }
            sender.end().unwrap();
        });

        let got = drain(&mut source);
        producer.join().unwrap();
        assert_eq!(got, vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()]);
        assert_eq!(source.completion(), Completion::Ended);
    }

    #[test]
    fn test_channel_source_disconnect_is_aborted() {
        let (sender, mut source) = body_channel(4);
        sender.send("partial").unwrap();
        drop(sender);

        drain(&mut source);
        assert_eq!(source.completion(), Completion::Aborted);
    }

    #[test]
    fn test_channel_source_abort_message() {
        let (sender, mut source) = body_channel(4);
        sender.abort("socket closed").unwrap();

        let err = source.next_chunk().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "socket closed");
        assert_eq!(source.completion(), Completion::Aborted);
    }
}
