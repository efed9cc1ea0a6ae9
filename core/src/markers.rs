#![deny(missing_docs)]

//! # Generated Region Markers
//!
//! The on-disk convention shared by the inventory scan and the merge writer:
//!
//! ```text
//! # >>> testsync:generated >>>
//! # testsync:endpoint GET /pet/{petId} fingerprint=<sha256> tests=positive options=<8 hex>
//! ...generated tests...
//! # <<< testsync:generated <<<
//! ```
//!
//! The comment prefix (`#`, `//`) comes from the active strategy. Everything
//! outside the begin/end pair belongs to the file's other maintainers.

use crate::contract::EndpointId;
use crate::fingerprint::Fingerprint;
use crate::generator::TestType;
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Token closing the begin marker line.
pub const BEGIN_TOKEN: &str = ">>> testsync:generated >>>";
/// Token closing the end marker line.
pub const END_TOKEN: &str = "<<< testsync:generated <<<";
/// Token introducing the identity line.
pub const ENDPOINT_TOKEN: &str = "testsync:endpoint";
/// Token introducing the obsolete annotation.
pub const OBSOLETE_TOKEN: &str = "testsync:obsolete";

/// Comment syntax for a target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    /// Line comment prefix (e.g. `#`).
    pub comment: &'static str,
}

impl MarkerStyle {
    /// Creates a style for a comment prefix.
    pub const fn new(comment: &'static str) -> Self {
        Self { comment }
    }

    /// The full begin marker line (no newline).
    pub fn begin_line(&self) -> String {
        format!("{} {}", self.comment, BEGIN_TOKEN)
    }

    /// The full end marker line (no newline).
    pub fn end_line(&self) -> String {
        format!("{} {}", self.comment, END_TOKEN)
    }

    /// The identity line recorded as the first line of a region.
    ///
    /// `options` is the digest of the generation flags the region was rendered with.
    pub fn identity_line(
        &self,
        id: &EndpointId,
        fp: &Fingerprint,
        tests: TestType,
        options: &str,
    ) -> String {
        format!(
            "{} {} {} fingerprint={} tests={} options={}",
            self.comment, ENDPOINT_TOKEN, id, fp, tests, options
        )
    }

    /// The obsolete annotation line.
    pub fn obsolete_line(&self) -> String {
        format!(
            "{} {} endpoint removed from contract; delete this file or restore the endpoint",
            self.comment, OBSOLETE_TOKEN
        )
    }

    /// Wraps region content (which must end with a newline) in begin/end markers.
    pub fn wrap(&self, inner: &str) -> String {
        let mut out = String::with_capacity(inner.len() + 64);
        out.push_str(&self.begin_line());
        out.push('\n');
        out.push_str(inner);
        if !inner.is_empty() && !inner.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.end_line());
        out.push('\n');
        out
    }

    /// Locates the generated region by exact marker match.
    ///
    /// Returns `None` when the begin marker is missing, or no end marker follows it.
    pub fn locate(&self, content: &str) -> Option<Region> {
        let begin = self.begin_line();
        let end = self.end_line();

        let mut begin_range: Option<Range<usize>> = None;
        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            let line_range = offset..offset + line.len();
            offset += line.len();
            let text = line.trim();
            match begin_range.clone() {
                None if text == begin => begin_range = Some(line_range),
                Some(b) if text == end => {
                    return Some(Region {
                        outer: b.start..line_range.end,
                        inner: b.end..line_range.start,
                    });
                }
                _ => {}
            }
        }
        None
    }
}

/// Byte ranges of a generated region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// From the first byte of the begin line to the last byte of the end line.
    pub outer: Range<usize>,
    /// Strictly between the begin line (incl. its newline) and the end line.
    pub inner: Range<usize>,
}

/// Metadata recovered from a region's identity line.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionHeader {
    /// Endpoint identity.
    pub endpoint: EndpointId,
    /// Stored fingerprint.
    pub fingerprint: Fingerprint,
    /// Recorded test-type tag, if present.
    pub test_type: Option<TestType>,
    /// Recorded generation-options digest, if present.
    pub options: Option<String>,
    /// Whether the region carries the obsolete annotation.
    pub obsolete: bool,
}

/// Parses the identity line (and obsolete flag) from region content.
pub fn parse_header(inner: &str) -> Option<RegionHeader> {
    static IDENTITY_RE: OnceLock<Regex> = OnceLock::new();
    let re = IDENTITY_RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:#|//|--|;)\s*testsync:endpoint\s+([A-Za-z]+)\s+(\S+)\s+fingerprint=([0-9a-f]{64})(?:\s+tests=([a-z]+))?(?:\s+options=([0-9a-f]{8}))?\s*$",
        )
        .expect("Invalid regex")
    });

    let mut obsolete = false;
    for line in inner.lines() {
        if line.contains(OBSOLETE_TOKEN) {
            obsolete = true;
            continue;
        }
        if let Some(caps) = re.captures(line) {
            let endpoint = EndpointId::new(&caps[1], &caps[2]);
            let fingerprint = caps[3].parse().ok()?;
            let test_type = caps.get(4).and_then(|m| m.as_str().parse().ok());
            let options = caps.get(5).map(|m| m.as_str().to_string());
            return Some(RegionHeader {
                endpoint,
                fingerprint,
                test_type,
                options,
                obsolete,
            });
        }
    }
    None
}
