use anyhow::{anyhow, Result};
use tracing::{debug, trace, warn};

use crate::graph::{ObjEntry, ObjProvenance};
use crate::interrupt::{Interrupted, ParseInterrupt};
use crate::lexer::{hex_digit, is_regular, is_whitespace, Cursor};
use crate::object::{ObjRef, PdfAtom, PdfDict, PdfName, PdfObj, PdfStr, PdfStream, Span, StrEncoding};

const MAX_ARRAY_ELEMENTS: usize = 100_000;
const MAX_DICT_ENTRIES: usize = 10_000;
const MAX_PARSE_DEPTH: usize = 64;

/// Recursive-descent parser for PDF objects. It never panics on hostile
/// input; structural damage is either tolerated or reported as an error for
/// the object being parsed.
pub struct Parser<'a> {
    cur: Cursor<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { cur: Cursor::new(bytes, pos) }
    }

    pub fn position(&self) -> usize {
        self.cur.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.cur.pos = pos;
    }

    pub fn skip_trivia(&mut self) {
        self.cur.skip_trivia();
    }

    pub fn eat_keyword(&mut self, kw: &[u8]) -> bool {
        self.cur.eat_keyword(kw)
    }

    pub fn parse_object(&mut self) -> Result<PdfObj> {
        self.parse_at_depth(0)
    }

    fn parse_at_depth(&mut self, depth: usize) -> Result<PdfObj> {
        if depth >= MAX_PARSE_DEPTH {
            warn!(
                security = true,
                domain = "pdf.parser",
                kind = "parse_depth_exceeded",
                offset = self.cur.pos,
                max_depth = MAX_PARSE_DEPTH,
                "Object nesting depth exceeded"
            );
            return Err(anyhow!("parse depth exceeded"));
        }
        self.cur.skip_trivia();
        let start = self.cur.pos;
        let b = self.cur.peek().ok_or_else(|| anyhow!("unexpected end of input"))?;
        let atom = match b {
            b'/' => PdfAtom::Name(self.parse_name()),
            b'<' if self.cur.peek_at(1) == Some(b'<') => {
                let dict = self.parse_dict(depth)?;
                if self.stream_follows() {
                    PdfAtom::Stream(self.parse_stream(dict)?)
                } else {
                    PdfAtom::Dict(dict)
                }
            }
            b'<' => PdfAtom::Str(self.parse_hex_string()),
            b'(' => PdfAtom::Str(self.parse_literal_string()),
            b'[' => PdfAtom::Array(self.parse_array(depth)?),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number_or_ref()?,
            b't' | b'f' | b'n' => self.parse_keyword_atom()?,
            other => return Err(anyhow!("unexpected byte 0x{other:02x} at offset {start}")),
        };
        Ok(PdfObj { span: self.cur.span_since(start), atom })
    }

    fn parse_keyword_atom(&mut self) -> Result<PdfAtom> {
        if self.cur.eat_keyword(b"true") {
            Ok(PdfAtom::Bool(true))
        } else if self.cur.eat_keyword(b"false") {
            Ok(PdfAtom::Bool(false))
        } else if self.cur.eat_keyword(b"null") {
            Ok(PdfAtom::Null)
        } else {
            Err(anyhow!("unexpected token at offset {}", self.cur.pos))
        }
    }

    fn parse_number_or_ref(&mut self) -> Result<PdfAtom> {
        let first = self.read_number()?;
        if let Number::Int(value) = first {
            let after_first = self.cur.pos;
            if let Some(reference) = self.ref_tail(value) {
                return Ok(PdfAtom::Ref(reference));
            }
            self.cur.pos = after_first;
        }
        Ok(match first {
            Number::Int(i) => PdfAtom::Int(i),
            Number::Real(f) => PdfAtom::Real(f),
        })
    }

    /// Tries to read `<gen> R` after an object number.
    fn ref_tail(&mut self, obj: i64) -> Option<ObjRef> {
        let obj = u32::try_from(obj).ok()?;
        self.cur.skip_trivia();
        let gen = u16::try_from(self.cur.read_unsigned()?).ok()?;
        self.cur.skip_trivia();
        self.cur.eat_keyword(b"R").then_some(ObjRef { obj, gen })
    }

    fn read_number(&mut self) -> Result<Number> {
        let start = self.cur.pos;
        if matches!(self.cur.peek(), Some(b'+' | b'-')) {
            self.cur.pos += 1;
        }
        let mut seen_dot = false;
        let mut digits = 0usize;
        while let Some(b) = self.cur.peek() {
            match b {
                b'0'..=b'9' => digits += 1,
                b'.' if !seen_dot => seen_dot = true,
                _ => break,
            }
            self.cur.pos += 1;
        }
        if digits == 0 {
            self.cur.pos = start;
            return Err(anyhow!("malformed number at offset {start}"));
        }
        let text = std::str::from_utf8(&self.cur.bytes[start..self.cur.pos])?;
        if seen_dot {
            return Ok(Number::Real(text.parse::<f64>()?));
        }
        match text.parse::<i64>() {
            Ok(i) => Ok(Number::Int(i)),
            Err(_) => Ok(Number::Real(text.parse::<f64>()?)),
        }
    }

    fn parse_array(&mut self, depth: usize) -> Result<Vec<PdfObj>> {
        self.cur.bump();
        let mut items = Vec::new();
        loop {
            self.cur.skip_trivia();
            match self.cur.peek() {
                None => break,
                Some(b']') => {
                    self.cur.bump();
                    break;
                }
                _ => {}
            }
            if items.len() >= MAX_ARRAY_ELEMENTS {
                warn!(
                    security = true,
                    domain = "pdf.parser",
                    kind = "array_size_limit_exceeded",
                    max_elements = MAX_ARRAY_ELEMENTS,
                    "Array size limit exceeded"
                );
                return Err(anyhow!("array size limit exceeded"));
            }
            items.push(self.parse_at_depth(depth + 1)?);
        }
        Ok(items)
    }

    fn parse_dict(&mut self, depth: usize) -> Result<PdfDict> {
        let start = self.cur.pos;
        self.cur.eat(b"<<");
        let mut entries = Vec::new();
        loop {
            self.cur.skip_trivia();
            if self.cur.eat(b">>") {
                break;
            }
            match self.cur.peek() {
                None => break,
                Some(b'/') => {}
                Some(_) => {
                    self.skip_stray_token();
                    continue;
                }
            }
            let key = self.parse_name();
            self.cur.skip_trivia();
            let value_start = self.cur.pos;
            let value = if self.cur.starts_with(b">>") {
                null_at(value_start)
            } else {
                match self.parse_at_depth(depth + 1) {
                    Ok(v) => v,
                    Err(err) => {
                        trace!(offset = value_start, error = %err, "Dictionary value replaced with null");
                        if self.cur.pos == value_start {
                            self.skip_stray_token();
                        }
                        null_at(value_start)
                    }
                }
            };
            if entries.len() >= MAX_DICT_ENTRIES {
                warn!(
                    security = true,
                    domain = "pdf.parser",
                    kind = "dict_size_limit_exceeded",
                    max_entries = MAX_DICT_ENTRIES,
                    "Dictionary size limit exceeded"
                );
                return Err(anyhow!("dict size limit exceeded"));
            }
            entries.push((key, value));
        }
        Ok(PdfDict { span: self.cur.span_since(start), entries })
    }

    fn skip_stray_token(&mut self) {
        self.cur.bump();
        while self.cur.peek().is_some_and(is_regular) {
            self.cur.pos += 1;
        }
    }

    fn parse_name(&mut self) -> PdfName {
        let start = self.cur.pos;
        self.cur.bump();
        let body_start = self.cur.pos;
        while self.cur.peek().is_some_and(is_regular) {
            self.cur.pos += 1;
        }
        PdfName {
            span: self.cur.span_since(start),
            decoded: decode_name(&self.cur.bytes[body_start..self.cur.pos]),
        }
    }

    fn parse_literal_string(&mut self) -> PdfStr {
        let start = self.cur.pos;
        self.cur.bump();
        let mut depth = 1usize;
        let mut out = Vec::new();
        while let Some(b) = self.cur.bump() {
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => self.read_escape(&mut out),
                _ => out.push(b),
            }
        }
        PdfStr { span: self.cur.span_since(start), encoding: StrEncoding::Literal, bytes: out }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) {
        let Some(next) = self.cur.bump() else {
            return;
        };
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'\r' => {
                self.cur.eat(b"\n");
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u16::from(next - b'0');
                for _ in 0..2 {
                    match self.cur.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u16::from(d - b'0');
                            self.cur.pos += 1;
                        }
                        _ => break,
                    }
                }
                // High-order overflow is ignored, as readers do.
                out.push((value & 0xff) as u8);
            }
            other => out.push(other),
        }
    }

    fn parse_hex_string(&mut self) -> PdfStr {
        let start = self.cur.pos;
        self.cur.bump();
        let mut nibbles = Vec::new();
        while let Some(b) = self.cur.bump() {
            if b == b'>' {
                break;
            }
            if let Some(v) = hex_digit(b) {
                nibbles.push(v);
            }
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0);
        }
        let bytes = nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect();
        PdfStr { span: self.cur.span_since(start), encoding: StrEncoding::Hex, bytes }
    }

    fn stream_follows(&mut self) -> bool {
        let mark = self.cur.pos;
        self.cur.skip_trivia();
        let found = self.cur.starts_with(b"stream");
        self.cur.pos = mark;
        found
    }

    fn parse_stream(&mut self, dict: PdfDict) -> Result<PdfStream> {
        self.cur.skip_trivia();
        self.cur.eat(b"stream");
        if !self.cur.eat(b"\r\n") && !self.cur.eat(b"\n") {
            self.cur.eat(b"\r");
        }
        let bytes = self.cur.bytes;
        let data_start = self.cur.pos;
        let declared_end = match dict.int(b"/Length").and_then(|n| usize::try_from(n).ok()) {
            Some(len) => match data_start.checked_add(len) {
                Some(end) => Some(end),
                None => {
                    warn!(
                        security = true,
                        domain = "pdf.parser",
                        kind = "stream_length_overflow",
                        start = data_start,
                        length = len,
                        "Stream length overflow"
                    );
                    return Err(anyhow!("stream length overflow"));
                }
            },
            None => None,
        };
        // A declared length is only trusted when `endstream` actually follows it.
        let data_end = match declared_end {
            Some(end) if end <= bytes.len() && endstream_follows(bytes, end) => end,
            _ => find_endstream(bytes, data_start).unwrap_or(bytes.len()),
        };
        self.cur.pos = data_end;
        self.cur.skip_trivia();
        if !self.cur.eat(b"endstream") {
            trace!(offset = data_end, "Stream without endstream keyword");
        }
        Ok(PdfStream { dict, data_span: Span::new(data_start, data_end) })
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Real(f64),
}

fn null_at(pos: usize) -> PdfObj {
    PdfObj { span: Span::new(pos, pos), atom: PdfAtom::Null }
}

fn decode_name(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 1);
    out.push(b'/');
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(h), Some(l)) = (hex_digit(raw[i + 1]), hex_digit(raw[i + 2])) {
                out.push((h << 4) | l);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

fn endstream_follows(bytes: &[u8], pos: usize) -> bool {
    let mut cur = Cursor::new(bytes, pos);
    while cur.peek().is_some_and(is_whitespace) {
        cur.pos += 1;
    }
    cur.starts_with(b"endstream")
}

/// Locates `endstream` and trims the end-of-line marker that precedes it.
fn find_endstream(bytes: &[u8], start: usize) -> Option<usize> {
    let rel = memchr::memmem::find(bytes.get(start..)?, b"endstream")?;
    let mut end = start + rel;
    if end > start && bytes[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    Some(end)
}

/// Parses `N G obj ... endobj` starting at `offset`. Returns the entry and the
/// position just past it.
pub fn parse_indirect_object_at(bytes: &[u8], offset: usize) -> Result<(ObjEntry, usize)> {
    let mut p = Parser::new(bytes, offset);
    p.cur.skip_trivia();
    let header_start = p.cur.pos;
    let obj = p
        .cur
        .read_unsigned()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| anyhow!("missing object number"))?;
    p.cur.skip_trivia();
    let gen = p
        .cur
        .read_unsigned()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| anyhow!("missing generation number"))?;
    p.cur.skip_trivia();
    if !p.cur.eat_keyword(b"obj") {
        return Err(anyhow!("missing obj keyword"));
    }
    let body = p.parse_object()?;
    let body_end = p.cur.pos;
    p.cur.skip_trivia();
    if !p.cur.eat_keyword(b"endobj") {
        // Resume right after the body so the next object is still found.
        trace!(obj, gen, offset = body_end, "Indirect object without endobj");
        p.cur.pos = body_end;
    }
    let full_end = p.cur.pos;
    let entry = ObjEntry {
        reference: ObjRef { obj, gen },
        atom: body.atom,
        full_span: Span::new(header_start, full_end),
        provenance: ObjProvenance::Indirect,
    };
    Ok((entry, full_end))
}

/// The interrupt is polled once per this many bytes of scanned input.
const INTERRUPT_POLL_BYTES: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct ObjectScan {
    pub objects: Vec<ObjEntry>,
    /// Set when `max_objects` stopped the scan early.
    pub truncated: bool,
    pub interrupted: Option<Interrupted>,
}

/// Linear scan for indirect objects, independent of any cross-reference data.
pub fn scan_indirect_objects(bytes: &[u8], max_objects: usize, interrupt: &ParseInterrupt) -> ObjectScan {
    let mut scan = ObjectScan::default();
    let mut i = 0usize;
    let mut next_poll = 0usize;
    while i + 7 < bytes.len() {
        if i >= next_poll {
            if let Some(reason) = interrupt.check() {
                debug!(offset = i, objects = scan.objects.len(), %reason, "Indirect object scan interrupted");
                scan.interrupted = Some(reason);
                break;
            }
            next_poll = i + INTERRUPT_POLL_BYTES;
        }
        if max_objects > 0 && scan.objects.len() >= max_objects {
            warn!(
                security = true,
                domain = "pdf.parser",
                kind = "max_objects_reached",
                max_objects,
                "Max objects reached during indirect scan"
            );
            scan.truncated = true;
            break;
        }
        let starts_number = bytes[i].is_ascii_digit() && (i == 0 || !bytes[i - 1].is_ascii_digit());
        if !starts_number {
            i += 1;
            continue;
        }
        match parse_indirect_object_at(bytes, i) {
            Ok((entry, end_pos)) => {
                trace!(
                    domain = "pdf.parser",
                    obj = entry.reference.obj,
                    gen = entry.reference.gen,
                    end_pos,
                    "Parsed indirect object"
                );
                scan.objects.push(entry);
                i = end_pos.max(i + 1);
            }
            Err(_) => i += 1,
        }
    }
    scan
}
