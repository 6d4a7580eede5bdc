//! Incremental codec for an XMPP client stream.
//!
//! An XMPP session is a single XML document that stays open for the lifetime
//! of the connection. The codec never waits for that document to end: it
//! yields the opening `<stream:stream>` tag on its own, then every complete
//! top-level child (a stanza or a stream-level element such as
//! `<stream:features>`) as soon as its end tag has arrived.
//!
//! Reads from the transport rarely line up with element boundaries, so
//! incomplete input stays buffered and is re-examined when more bytes come.

use bytes::BytesMut;
use quick_xml::errors::SyntaxError;
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio_util::codec::{Decoder, Encoder};

use crate::element::{collect_attrs, Element};
use crate::error::{self, ProtocolError};

/// Largest partial element kept in the buffer before it is discarded.
pub const MAX_STANZA_BUFFER_SIZE: usize = 1024 * 1024;

/// One decoded unit of the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// The peer's `<stream:stream ...>` header.
    StreamOpen {
        /// Attributes of the stream header (`from`, `id`, `version`, ...).
        attrs: Vec<(String, String)>,
    },
    /// The peer closed its stream with `</stream:stream>`.
    StreamClose,
    /// A complete top-level element.
    Stanza(Stanza),
    /// Markup that can never become well-formed. The offending bytes have
    /// been dropped and decoding continues with whatever arrives next.
    Malformed {
        /// Parser diagnostic.
        reason: String,
    },
}

/// A complete top-level element together with its source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stanza {
    element: Element,
    raw: String,
}

impl Stanza {
    /// Parse a stanza from its complete source text.
    pub fn parse(raw: impl Into<String>) -> error::Result<Self> {
        let raw = raw.into();
        let element = Element::parse(&raw)?;
        Ok(Self { element, raw })
    }

    /// The parsed element tree.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// The element exactly as it appeared on the wire.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Local name of the top-level element (`message`, `iq`, `features`...).
    pub fn kind(&self) -> &str {
        self.element.local_name()
    }
}

/// Decoder for the inbound stream and encoder for outbound fragments.
///
/// Works both under `tokio_util::codec::Framed` and standalone through
/// [`StreamCodec::feed`].
#[derive(Debug)]
pub struct StreamCodec {
    max_len: usize,
    pending: BytesMut,
}

impl Default for StreamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCodec {
    /// Create a codec with the default buffering limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_len(MAX_STANZA_BUFFER_SIZE)
    }

    /// Create a codec that gives up on partial elements longer than `max_len`.
    #[must_use]
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            pending: BytesMut::new(),
        }
    }

    /// Append bytes and iterate over every frame completed so far.
    ///
    /// The returned iterator is lazy; frames it does not reach stay
    /// buffered and are produced by the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.pending.extend_from_slice(bytes);
        Frames { codec: self }
    }

    /// Number of bytes waiting for the rest of an element.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// Iterator returned by [`StreamCodec::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    codec: &'a mut StreamCodec,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        next_frame(&mut self.codec.pending, self.codec.max_len)
    }
}

impl Decoder for StreamCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Frame>> {
        // Anything handed to `feed` before the codec went under a Framed
        // comes first.
        if !self.pending.is_empty() {
            let mut carried = std::mem::take(&mut self.pending);
            carried.extend_from_slice(src);
            *src = carried;
        }
        Ok(next_frame(src, self.max_len))
    }
}

impl Encoder<String> for StreamCodec {
    type Error = ProtocolError;

    fn encode(&mut self, fragment: String, dst: &mut BytesMut) -> error::Result<()> {
        dst.extend_from_slice(fragment.as_bytes());
        Ok(())
    }
}

enum Scan {
    Open(usize, Vec<(String, String)>),
    Close(usize),
    Element(usize, usize),
    Incomplete(usize),
    Malformed(String),
}

fn next_frame(src: &mut BytesMut, max_len: usize) -> Option<Frame> {
    match scan(src) {
        Scan::Open(end, attrs) => {
            let _ = src.split_to(end);
            Some(Frame::StreamOpen { attrs })
        }
        Scan::Close(end) => {
            let _ = src.split_to(end);
            Some(Frame::StreamClose)
        }
        Scan::Element(start, end) => {
            let raw = src.split_to(end);
            let frame = match std::str::from_utf8(&raw[start..]) {
                Ok(text) => match Stanza::parse(text) {
                    Ok(stanza) => Frame::Stanza(stanza),
                    Err(err) => Frame::Malformed {
                        reason: err.to_string(),
                    },
                },
                Err(err) => Frame::Malformed {
                    reason: ProtocolError::from(err).to_string(),
                },
            };
            Some(frame)
        }
        Scan::Incomplete(skippable) => {
            let _ = src.split_to(skippable);
            if src.len() > max_len {
                let actual = src.len();
                src.clear();
                return Some(Frame::Malformed {
                    reason: ProtocolError::ElementTooLong {
                        actual,
                        limit: max_len,
                    }
                    .to_string(),
                });
            }
            None
        }
        Scan::Malformed(reason) => {
            src.clear();
            Some(Frame::Malformed { reason })
        }
    }
}

/// Locate the next top-level unit in `src` without consuming anything.
fn scan(src: &[u8]) -> Scan {
    let mut reader = Reader::from_reader(src);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut depth = 0usize;
    let mut element_start = 0usize;
    // End of the last prolog item or whitespace run seen between elements.
    let mut skippable = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event();
        let after = reader.buffer_position() as usize;

        match event {
            Ok(Event::Start(start)) => {
                if depth == 0 {
                    if is_stream_root(start.name().as_ref()) {
                        return match collect_attrs(&start) {
                            Ok(attrs) => Scan::Open(after, attrs),
                            Err(err) => Scan::Malformed(err.to_string()),
                        };
                    }
                    element_start = before;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) if depth == 0 => return Scan::Element(before, after),
            Ok(Event::End(end)) => {
                if depth == 0 {
                    if is_stream_root(end.name().as_ref()) {
                        return Scan::Close(after);
                    }
                    return Scan::Malformed(format!(
                        "unexpected end tag '{}' at top level",
                        String::from_utf8_lossy(end.name().as_ref())
                    ));
                }
                depth -= 1;
                if depth == 0 {
                    return Scan::Element(element_start, after);
                }
            }
            Ok(Event::Eof) => {
                return Scan::Incomplete(if depth == 0 { after } else { skippable });
            }
            Ok(_) => {
                if depth == 0 {
                    skippable = after;
                }
            }
            Err(quick_xml::Error::Syntax(
                SyntaxError::UnclosedTag
                | SyntaxError::UnclosedComment
                | SyntaxError::UnclosedCData
                | SyntaxError::UnclosedDoctype
                | SyntaxError::UnclosedPIOrXmlDecl,
            )) => {
                return Scan::Incomplete(skippable);
            }
            // The read stopped right after `<!`; quick-xml cannot tell a
            // comment from CDATA yet.
            Err(quick_xml::Error::Syntax(SyntaxError::InvalidBangMarkup))
                if is_partial_bang(&src[before.min(src.len())..]) =>
            {
                return Scan::Incomplete(skippable);
            }
            Err(err) => return Scan::Malformed(err.to_string()),
        }
    }
}

/// `tail` is the unfinished start of a comment, CDATA section or doctype.
fn is_partial_bang(tail: &[u8]) -> bool {
    const MARKERS: [&[u8]; 3] = [b"<![CDATA[", b"<!--", b"<!DOCTYPE"];
    let tail = tail.strip_prefix(b"<").unwrap_or(tail);
    !tail.is_empty()
        && MARKERS
            .iter()
            .any(|marker| marker[1..].len() > tail.len() && marker[1..].starts_with(tail))
}

fn is_stream_root(name: &[u8]) -> bool {
    name == b"stream:stream" || name == b"stream"
}
