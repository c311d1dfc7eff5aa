//! Wire protocol between the editor and the companion REPL
//!
//! Requests are YAIL forms wrapped in `process-repl-input`. Responses are
//! framed as `<<purpose:originId@@Success==payload>>`; the payload escapes
//! `&`, `<<` and `>>` so a frame never contains its own delimiters.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use yail_blocks::BlockId;

use crate::error::{Result, SyncError};

const FRAME_START: &[u8] = b"<<";
const FRAME_END: &[u8] = b">>";
const STATUS_SEPARATOR: &str = "@@";
const PAYLOAD_SEPARATOR: &str = "==";

/// Origin written when a request is not tied to a block.
const NO_ORIGIN: &str = "-1";

/// Whitespace and console prompts (`#|kawa:12|#`) may precede a frame.
static BENIGN_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(#\|kawa:\d+\|#\s*)*$").expect("valid prompt pattern"));

/// Why a request was sent. Echoed back in the response frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Full project (re)load.
    Load,
    /// A changed declaration.
    Block,
    /// The user asked to evaluate a block and see its value.
    DoIt,
    /// A designer property change.
    Property,
    /// Component added, removed or renamed.
    Component,
    Other(String),
}

impl Purpose {
    pub fn as_str(&self) -> &str {
        match self {
            Purpose::Load => "load",
            Purpose::Block => "block",
            Purpose::DoIt => "doit",
            Purpose::Property => "property",
            Purpose::Component => "component",
            Purpose::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "load" => Purpose::Load,
            "block" => Purpose::Block,
            "doit" => Purpose::DoIt,
            "property" => Purpose::Property,
            "component" => Purpose::Component,
            other => Purpose::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escape a payload for framing.
pub fn escape_payload(s: &str) -> String {
    s.replace('&', "&0").replace("<<", "&1").replace(">>", "&2")
}

/// Undo `escape_payload` in one left-to-right pass, so `&01` decodes to
/// `&1` rather than `<<`. Unknown escapes are kept as written.
pub fn unescape_payload(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('0') => {
                chars.next();
                out.push('&');
            }
            Some('1') => {
                chars.next();
                out.push_str("<<");
            }
            Some('2') => {
                chars.next();
                out.push_str(">>");
            }
            _ => out.push('&'),
        }
    }
    out
}

/// Wrap code for the REPL.
pub fn wrap_request(code: &str, purpose: &Purpose, origin: Option<BlockId>) -> String {
    let origin = origin.map(|id| id.to_string()).unwrap_or_else(|| NO_ORIGIN.to_string());
    format!("(process-repl-input \"{}:{}\" (begin {}))", purpose, origin, code)
}

/// A parsed response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplResponse {
    pub purpose: Purpose,
    pub origin: Option<BlockId>,
    pub success: bool,
    pub payload: String,
}

impl ReplResponse {
    /// Parse the text between `<<` and `>>`.
    pub fn parse(body: &str) -> Result<Self> {
        let (header, rest) = body
            .split_once(STATUS_SEPARATOR)
            .ok_or_else(|| SyncError::protocol(format!("missing '@@' in '{}'", body)))?;
        let (status, payload) = rest
            .split_once(PAYLOAD_SEPARATOR)
            .ok_or_else(|| SyncError::protocol(format!("missing '==' in '{}'", body)))?;
        let (purpose, origin) = header
            .rsplit_once(':')
            .ok_or_else(|| SyncError::protocol(format!("missing origin in '{}'", header)))?;

        let success = match status {
            "Success" => true,
            "Failure" => false,
            other => return Err(SyncError::protocol(format!("unknown status '{}'", other))),
        };
        let origin = match origin.parse::<i64>() {
            Ok(n) if n >= 0 => Some(BlockId(n as u64)),
            Ok(_) => None,
            Err(_) => return Err(SyncError::protocol(format!("bad origin id '{}'", origin))),
        };

        Ok(Self {
            purpose: Purpose::parse(purpose),
            origin,
            success,
            payload: unescape_payload(payload),
        })
    }

    /// Render as a frame, the way the companion does.
    pub fn to_frame(&self) -> String {
        format!(
            "<<{}:{}{}{}{}{}>>",
            self.purpose,
            self.origin.map(|id| id.to_string()).unwrap_or_else(|| NO_ORIGIN.to_string()),
            STATUS_SEPARATOR,
            if self.success { "Success" } else { "Failure" },
            PAYLOAD_SEPARATOR,
            escape_payload(&self.payload)
        )
    }
}

/// Something the decoder found in the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(ReplResponse),
    /// Text outside any frame that is not a console prompt.
    Noise(String),
    /// A complete frame that did not parse.
    Malformed(String),
}

/// Incremental response decoder. Partial frames carry over between pushes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed bytes and drain every complete frame.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Decoded> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            let Some(start) = find(&self.buffer, FRAME_START) else {
                break;
            };
            let leading = String::from_utf8_lossy(&self.buffer[..start]).into_owned();
            if !BENIGN_NOISE.is_match(&leading) {
                out.push(Decoded::Noise(leading));
            }
            self.buffer.drain(..start);

            let Some(len) = find(&self.buffer[FRAME_START.len()..], FRAME_END) else {
                break;
            };
            let end = FRAME_START.len() + len;
            let body = String::from_utf8_lossy(&self.buffer[FRAME_START.len()..end]).into_owned();
            self.buffer.drain(..end + FRAME_END.len());

            match ReplResponse::parse(&body) {
                Ok(frame) => out.push(Decoded::Frame(frame)),
                Err(err) => {
                    tracing::warn!(%err, "dropping malformed frame");
                    out.push(Decoded::Malformed(body));
                }
            }
        }
        out
    }

    /// Report whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<Decoded> {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
        (!BENIGN_NOISE.is_match(&rest)).then_some(Decoded::Noise(rest))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_table() {
        assert_eq!(escape_payload("a&b<<c>>d"), "a&0b&1c&2d");
        assert_eq!(unescape_payload("a&0b&1c&2d"), "a&b<<c>>d");
    }

    #[test]
    fn test_unescape_is_single_pass() {
        // An escaped '&' must not combine with the digit after it.
        assert_eq!(unescape_payload(&escape_payload("&1")), "&1");
        assert_eq!(unescape_payload("&01"), "&1");
    }

    #[test]
    fn test_wrap_request() {
        assert_eq!(
            wrap_request("(+ 1 2)", &Purpose::DoIt, Some(BlockId(7))),
            "(process-repl-input \"doit:7\" (begin (+ 1 2)))"
        );
        assert_eq!(
            wrap_request("(init)", &Purpose::Load, None),
            "(process-repl-input \"load:-1\" (begin (init)))"
        );
    }

    #[test]
    fn test_parse_frame() {
        let frame = ReplResponse::parse("doit:12@@Success==3").unwrap();
        assert_eq!(frame.purpose, Purpose::DoIt);
        assert_eq!(frame.origin, Some(BlockId(12)));
        assert!(frame.success);
        assert_eq!(frame.payload, "3");

        let failure = ReplResponse::parse("load:-1@@Failure==boom &1x&2").unwrap();
        assert_eq!(failure.origin, None);
        assert!(!failure.success);
        assert_eq!(failure.payload, "boom <<x>>");

        assert!(ReplResponse::parse("no separators").is_err());
        assert!(ReplResponse::parse("a:1@@Maybe==x").is_err());
    }

    #[test]
    fn test_decoder_carries_partial_frames() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"<<block:3@@Succ").is_empty());
        let out = decoder.push(b"ess==ok>><<doit:4@@Success==5>>");
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Decoded::Frame(f) if f.origin == Some(BlockId(3))));
        assert!(matches!(&out[1], Decoded::Frame(f) if f.payload == "5"));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_noise() {
        let mut decoder = FrameDecoder::new();
        let out = decoder.push(b"#|kawa:1|# \n<<doit:1@@Success==x>>");
        assert_eq!(out.len(), 1);

        let out = decoder.push(b"garbage<<doit:1@@Success==y>>");
        assert_eq!(out[0], Decoded::Noise("garbage".to_string()));
        assert!(matches!(&out[1], Decoded::Frame(_)));
    }

    #[test]
    fn test_frame_roundtrip_through_decoder() {
        let response = ReplResponse {
            purpose: Purpose::Block,
            origin: Some(BlockId(9)),
            success: false,
            payload: "bad <<thing>> & more".to_string(),
        };
        let mut decoder = FrameDecoder::new();
        let out = decoder.push(response.to_frame().as_bytes());
        assert_eq!(out, vec![Decoded::Frame(response)]);
    }
}
