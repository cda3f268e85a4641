use std::collections::HashSet;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::graph::ObjEntry;
use crate::object::{PdfAtom, PdfDict};
use crate::parser::{parse_indirect_object_at, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    Table,
    Stream,
}

#[derive(Debug)]
pub struct XrefSection {
    pub offset: u64,
    pub kind: XrefKind,
    pub trailer: PdfDict,
}

/// Cross-reference sections reachable from `startxref`, newest first.
#[derive(Debug, Default)]
pub struct XrefChain {
    pub sections: Vec<XrefSection>,
    /// The chain pointed somewhere that is not a cross-reference section.
    pub broken: bool,
}

impl XrefChain {
    pub fn trailers(&self) -> impl Iterator<Item = &PdfDict> {
        self.sections.iter().map(|s| &s.trailer)
    }
}

pub fn find_startxrefs(bytes: &[u8]) -> Vec<u64> {
    let mut out = Vec::new();
    for pos in memchr::memmem::find_iter(bytes, b"startxref") {
        let mut p = Parser::new(bytes, pos + b"startxref".len());
        p.skip_trivia();
        let start = p.position();
        let digits = bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();
        if let Some(value) = std::str::from_utf8(&bytes[start..start + digits])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            out.push(value);
        }
    }
    out
}

pub fn parse_xref_chain(bytes: &[u8], startxref: u64) -> XrefChain {
    let mut chain = XrefChain::default();
    let mut next = Some(startxref);
    let mut seen = HashSet::new();
    while let Some(off) = next {
        if !seen.insert(off) {
            warn!(
                security = true,
                domain = "pdf.xref",
                kind = "xref_loop_detected",
                offset = off,
                "Detected xref loop"
            );
            break;
        }
        let offset = match usize::try_from(off) {
            Ok(o) if o < bytes.len() => o,
            _ => {
                warn!(
                    security = true,
                    domain = "pdf.xref",
                    kind = "xref_offset_oob",
                    offset = off,
                    bytes_len = bytes.len(),
                    "Xref offset out of range"
                );
                chain.broken = true;
                break;
            }
        };
        let parsed = if bytes[offset..].starts_with(b"xref") {
            parse_xref_table(bytes, offset).map(|t| (XrefKind::Table, t))
        } else {
            parse_xref_stream(bytes, offset).map(|t| (XrefKind::Stream, t))
        };
        match parsed {
            Ok((kind, trailer)) => {
                debug!(offset = off, kind = ?kind, "Parsed xref section");
                next = prev_offset(&trailer);
                chain.sections.push(XrefSection { offset: off, kind, trailer });
            }
            Err(err) => {
                warn!(
                    security = true,
                    domain = "pdf.xref",
                    kind = "xref_section_unreadable",
                    offset = off,
                    error = %err,
                    "Xref section could not be read"
                );
                chain.broken = true;
                break;
            }
        }
    }
    chain
}

fn parse_xref_table(bytes: &[u8], offset: usize) -> Result<PdfDict> {
    let body_start = offset + b"xref".len();
    let rel = memchr::memmem::find(&bytes[body_start..], b"trailer")
        .ok_or_else(|| anyhow!("trailer keyword not found"))?;
    let mut p = Parser::new(bytes, body_start + rel + b"trailer".len());
    match p.parse_object()?.atom {
        PdfAtom::Dict(d) => Ok(d),
        other => Err(anyhow!("trailer is a {}, not a dictionary", other.type_name())),
    }
}

fn parse_xref_stream(bytes: &[u8], offset: usize) -> Result<PdfDict> {
    let (entry, _) = parse_indirect_object_at(bytes, offset)?;
    match entry.atom {
        PdfAtom::Stream(st) if st.dict.has_name(b"/Type", b"/XRef") => Ok(st.dict),
        _ => Err(anyhow!("object at offset is not an xref stream")),
    }
}

fn prev_offset(trailer: &PdfDict) -> Option<u64> {
    trailer.int(b"/Prev").and_then(|v| u64::try_from(v).ok())
}

/// Trailer candidates for files whose xref chain is unusable: every
/// `trailer` dictionary in the file and every xref stream dictionary,
/// newest (last in file) first.
pub fn recover_trailers(bytes: &[u8], objects: &[ObjEntry]) -> Vec<PdfDict> {
    let mut found: Vec<(u64, PdfDict)> = Vec::new();
    for pos in memchr::memmem::find_iter(bytes, b"trailer") {
        let mut p = Parser::new(bytes, pos + b"trailer".len());
        if let Ok(obj) = p.parse_object() {
            if let PdfAtom::Dict(d) = obj.atom {
                found.push((pos as u64, d));
            }
        }
    }
    for entry in objects {
        if let PdfAtom::Stream(st) = &entry.atom {
            if st.dict.has_name(b"/Type", b"/XRef") {
                found.push((entry.full_span.start, st.dict.clone()));
            }
        }
    }
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.into_iter().map(|(_, d)| d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startxref_values_are_collected_in_file_order() {
        let data = b"startxref\n12\n%%EOF\nstartxref\r\n 345\n%%EOF";
        assert_eq!(find_startxrefs(data), vec![12, 345]);
    }

    #[test]
    fn prev_loop_terminates() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        let chain = parse_xref_chain(data, 0);
        assert_eq!(chain.sections.len(), 1);
        assert!(!chain.broken);
    }

    #[test]
    fn offset_out_of_range_marks_chain_broken() {
        let chain = parse_xref_chain(b"%PDF-1.4\n", 9_999);
        assert!(chain.sections.is_empty());
        assert!(chain.broken);
    }
}
