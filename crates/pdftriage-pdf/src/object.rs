use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte range inside the buffer an object was parsed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start: start as u64, end: end as u64 }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns the slice this span covers, if it lies inside `bytes`.
    pub fn slice<'b>(&self, bytes: &'b [u8]) -> Option<&'b [u8]> {
        let start = usize::try_from(self.start).ok()?;
        let end = usize::try_from(self.end).ok()?;
        if start > end || end > bytes.len() {
            return None;
        }
        Some(&bytes[start..end])
    }
}

/// Indirect object identifier (`12 0 R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjRef {
    pub obj: u32,
    pub gen: u16,
}

impl ObjRef {
    pub fn new(obj: u32, gen: u16) -> Self {
        Self { obj, gen }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.obj, self.gen)
    }
}

/// A name with `#xx` escapes resolved. `decoded` keeps the leading `/`.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfName {
    pub span: Span,
    pub decoded: Vec<u8>,
}

impl PdfName {
    /// Case-insensitive comparison; producers in the wild disagree on case.
    pub fn is(&self, name: &[u8]) -> bool {
        self.decoded.eq_ignore_ascii_case(name)
    }

    /// Name without the leading slash, lossily decoded.
    pub fn bare(&self) -> String {
        let raw = self.decoded.strip_prefix(b"/").unwrap_or(&self.decoded);
        String::from_utf8_lossy(raw).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrEncoding {
    Literal,
    Hex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfStr {
    pub span: Span,
    pub encoding: StrEncoding,
    pub bytes: Vec<u8>,
}

impl PdfStr {
    /// Decodes a PDF text string: UTF-16BE or UTF-8 when a BOM is present,
    /// otherwise each byte is taken as a single character.
    pub fn to_text(&self) -> String {
        decode_text_string(&self.bytes)
    }
}

pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            body.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(body).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfDict {
    pub span: Span,
    pub entries: Vec<(PdfName, PdfObj)>,
}

impl PdfDict {
    /// First value stored under `key`. Duplicate keys are kept in `entries`
    /// but lookups follow the first occurrence.
    pub fn get(&self, key: &[u8]) -> Option<&PdfObj> {
        self.entries.iter().find(|(k, _)| k.is(key)).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn has_name(&self, key: &[u8], value: &[u8]) -> bool {
        self.name(key).map(|n| n.is(value)).unwrap_or(false)
    }

    pub fn name(&self, key: &[u8]) -> Option<&PdfName> {
        match &self.get(key)?.atom {
            PdfAtom::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn int(&self, key: &[u8]) -> Option<i64> {
        match self.get(key)?.atom {
            PdfAtom::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn boolean(&self, key: &[u8]) -> Option<bool> {
        match self.get(key)?.atom {
            PdfAtom::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn string(&self, key: &[u8]) -> Option<&PdfStr> {
        match &self.get(key)?.atom {
            PdfAtom::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDict,
    /// Raw (still encoded, possibly encrypted) data in the source buffer.
    pub data_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PdfAtom {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Name(PdfName),
    Str(PdfStr),
    Array(Vec<PdfObj>),
    Dict(PdfDict),
    Stream(PdfStream),
    Ref(ObjRef),
}

impl PdfAtom {
    pub fn type_name(&self) -> &'static str {
        match self {
            PdfAtom::Null => "null",
            PdfAtom::Bool(_) => "boolean",
            PdfAtom::Int(_) => "integer",
            PdfAtom::Real(_) => "real",
            PdfAtom::Name(_) => "name",
            PdfAtom::Str(_) => "string",
            PdfAtom::Array(_) => "array",
            PdfAtom::Dict(_) => "dictionary",
            PdfAtom::Stream(_) => "stream",
            PdfAtom::Ref(_) => "reference",
        }
    }

    /// Dictionary view; streams expose their dictionary.
    pub fn as_dict(&self) -> Option<&PdfDict> {
        match self {
            PdfAtom::Dict(d) => Some(d),
            PdfAtom::Stream(st) => Some(&st.dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PdfObj]> {
        match self {
            PdfAtom::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&PdfStr> {
        match self {
            PdfAtom::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfAtom::Name(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfObj {
    pub span: Span,
    pub atom: PdfAtom,
}

impl PdfObj {
    pub fn as_reference(&self) -> Option<ObjRef> {
        match self.atom {
            PdfAtom::Ref(r) => Some(r),
            _ => None,
        }
    }
}
