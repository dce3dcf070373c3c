//! Content hashing (C2): a blake3-backed `ContentHash` and an
//! order-sensitive combinator over heterogeneous inputs.
//!
//! Grounded on `freshness/hash.rs` (`ContentHash`, streaming file hash)
//! and `utils/hash.rs` (`StableHasher`'s chained `update` calls, whose
//! own tests assert order sensitivity) from the teacher. The original
//! Python implementation hashes with MD5; REDESIGN FLAG in the spec
//! notes the concrete algorithm is unconstrained as long as it is
//! deterministic and collision-resistant enough for cache correctness,
//! so this crate uses blake3 throughout, as the teacher does.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// A 32-byte blake3 digest, displayed and stored as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf)?;
        Ok(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// One input fed to [`hash_items`]. Order of items in the slice is
/// significant: `hash_items(&[A, B])` differs from `hash_items(&[B, A])`.
pub enum HashItem<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
    /// A file on disk, hashed by streaming its contents in chunks
    /// rather than reading it whole — mirrors `freshness/hash.rs`'s
    /// chunked file digest.
    File(&'a Path),
}

/// Combine a sequence of items into one content hash. Used for atomic
/// builder fingerprints: `(class_name, args, input hashes)`.
///
/// `Text` and `Bytes` of equal logical content hash identically — they
/// share the same one-byte tag below, so `hash_items(&[Text("x")]) ==
/// hash_items(&[Bytes(b"x")])`. `File` gets its own tag: it's read from
/// disk in chunks rather than handed inline, and keeping it distinct
/// also preserves a boundary between an inline item and a file item
/// that happen to share a byte prefix.
///
/// A PDF file is normalized before hashing (its `/CreationDate`,
/// `/ModDate`, and `/Producer` entries are blanked) so two PDFs that
/// differ only in embedded generation metadata hash identically; this
/// keeps builders whose output is a re-rendered PDF (e.g. `Pdfcrop`)
/// stable across repeated runs with unchanged visual content.
pub fn hash_items(items: &[HashItem<'_>]) -> io::Result<ContentHash> {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        hasher.update(&[item_tag(item)]);
        match item {
            HashItem::Bytes(b) => {
                hasher.update(b);
            }
            HashItem::Text(s) => {
                hasher.update(s.as_bytes());
            }
            HashItem::File(path) => {
                hash_file_into(&mut hasher, path)?;
            }
        }
    }
    Ok(ContentHash(*hasher.finalize().as_bytes()))
}

fn item_tag(item: &HashItem<'_>) -> u8 {
    match item {
        HashItem::Bytes(_) | HashItem::Text(_) => 0,
        HashItem::File(_) => 1,
    }
}

fn hash_file_into(hasher: &mut blake3::Hasher, path: &Path) -> io::Result<()> {
    if is_pdf(path) {
        let bytes = std::fs::read(path)?;
        let normalized = strip_pdf_metadata(&bytes);
        hasher.update(&normalized);
        return Ok(());
    }
    let mut file = File::open(path)?;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

fn is_pdf(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("pdf")) == Some(true)
}

/// Blank out the value of `/CreationDate`, `/ModDate`, and `/Producer`
/// entries in an (uncompressed) PDF object stream. This is a best
/// effort normalization: PDFs with compressed object streams or these
/// keys inside binary streams are left untouched, which only means
/// such PDFs fall back to ordinary byte-for-byte hashing.
fn strip_pdf_metadata(bytes: &[u8]) -> Vec<u8> {
    const KEYS: [&[u8]; 3] = [b"/CreationDate", b"/ModDate", b"/Producer"];
    let mut out = bytes.to_vec();
    for key in KEYS {
        let mut search_from = 0;
        while let Some(rel) = find(&out[search_from..], key) {
            let key_start = search_from + rel;
            let value_start = key_start + key.len();
            if let Some(value_end) = find_paren_value_end(&out, value_start) {
                for b in out.iter_mut().take(value_end).skip(value_start) {
                    if *b != b'(' && *b != b')' {
                        *b = b'0';
                    }
                }
                search_from = value_end;
            } else {
                search_from = value_start;
            }
        }
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Given the offset right after a PDF dictionary key, find the end of
/// a `(...)` literal-string value, skipping whitespace before `(`.
fn find_paren_value_end(bytes: &[u8], mut pos: usize) -> Option<usize> {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if bytes.get(pos) != Some(&b'(') {
        return None;
    }
    let mut depth = 0i32;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
