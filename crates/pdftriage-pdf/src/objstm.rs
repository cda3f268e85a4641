use std::borrow::Cow;

use tracing::{debug, warn};

use crate::crypt::StandardSecurity;
use crate::decode::decode_stream_data;
use crate::graph::{ObjEntry, ObjProvenance};
use crate::interrupt::{Interrupted, ParseInterrupt};
use crate::object::{ObjRef, PdfAtom, PdfStream};
use crate::parser::Parser;

const MAX_OBJSTM_COUNT: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct ObjStmLimits {
    /// Decoded size cap for a single object stream.
    pub max_stream_bytes: usize,
    /// Decoded size cap across all object streams.
    pub max_total_bytes: usize,
    /// Overall object budget, counting objects found by the indirect scan.
    pub max_objects: usize,
}

#[derive(Debug, Default)]
pub struct ObjStmExpansion {
    pub objects: Vec<ObjEntry>,
    /// Expansion stopped because a count or byte budget ran out.
    pub budget_exhausted: bool,
    pub interrupted: Option<Interrupted>,
}

/// Pulls compressed objects out of every `/Type /ObjStm` stream in `objects`.
pub fn expand_object_streams(
    bytes: &[u8],
    objects: &[ObjEntry],
    security: Option<&StandardSecurity>,
    limits: &ObjStmLimits,
    interrupt: &ParseInterrupt,
) -> ObjStmExpansion {
    let mut expansion = ObjStmExpansion::default();
    let mut decoded_total = 0usize;
    let mut streams_seen = 0usize;
    for entry in objects {
        let PdfAtom::Stream(st) = &entry.atom else {
            continue;
        };
        if !st.dict.has_name(b"/Type", b"/ObjStm") {
            continue;
        }
        if let Some(reason) = interrupt.check() {
            debug!(streams = streams_seen, %reason, "Object stream expansion interrupted");
            expansion.interrupted = Some(reason);
            break;
        }
        streams_seen += 1;
        if streams_seen > MAX_OBJSTM_COUNT {
            warn!(
                security = true,
                domain = "pdf.object_stream",
                kind = "objstm_count_exceeded",
                max_objstm_count = MAX_OBJSTM_COUNT,
                "ObjStm expansion halted due to count limit"
            );
            expansion.budget_exhausted = true;
            break;
        }
        if limits.max_total_bytes > 0 && decoded_total >= limits.max_total_bytes {
            warn!(
                security = true,
                domain = "pdf.object_stream",
                kind = "objstm_decode_budget_reached",
                max_total_decoded_bytes = limits.max_total_bytes,
                "ObjStm expansion halted due to decode budget"
            );
            expansion.budget_exhausted = true;
            break;
        }
        let Some(data) = decoded_object_stream(bytes, entry.reference, st, security, limits) else {
            continue;
        };
        decoded_total = decoded_total.saturating_add(data.len());
        let exhausted = unpack(entry.reference, st, &data, objects.len(), limits, &mut expansion.objects);
        if exhausted {
            expansion.budget_exhausted = true;
            break;
        }
    }
    debug!(
        streams = streams_seen,
        objects = expansion.objects.len(),
        decoded_total,
        "Expanded object streams"
    );
    expansion
}

fn decoded_object_stream(
    bytes: &[u8],
    container: ObjRef,
    st: &PdfStream,
    security: Option<&StandardSecurity>,
    limits: &ObjStmLimits,
) -> Option<Vec<u8>> {
    let raw = st.data_span.slice(bytes)?;
    let raw: Cow<'_, [u8]> = match security {
        Some(sec) => Cow::Owned(sec.decrypt(container, raw)),
        None => Cow::Borrowed(raw),
    };
    match decode_stream_data(&raw, &st.dict, limits.max_stream_bytes) {
        Ok(decoded) => Some(decoded.data),
        Err(err) => {
            debug!(obj = container.obj, error = %err, "Object stream could not be decoded");
            None
        }
    }
}

/// Parses the `/N` objects of one decoded stream into `out`. Returns true
/// when the object budget ran out.
fn unpack(
    container: ObjRef,
    st: &PdfStream,
    data: &[u8],
    scanned: usize,
    limits: &ObjStmLimits,
    out: &mut Vec<ObjEntry>,
) -> bool {
    let (Some(n), Some(first)) = (
        st.dict.int(b"/N").and_then(|v| usize::try_from(v).ok()),
        st.dict.int(b"/First").and_then(|v| usize::try_from(v).ok()),
    ) else {
        return false;
    };
    if first >= data.len() {
        return false;
    }
    let header = header_pairs(&data[..first], n);
    for (obj_num, offset) in header {
        if limits.max_objects > 0 && scanned + out.len() >= limits.max_objects {
            warn!(
                security = true,
                domain = "pdf.object_stream",
                kind = "max_objects_total_reached",
                max_objects_total = limits.max_objects,
                "ObjStm expansion halted due to object budget"
            );
            return true;
        }
        if obj_num == container.obj {
            warn!(
                security = true,
                domain = "pdf.object_stream",
                kind = "objstm_recursive_reference",
                obj = obj_num,
                "Detected recursive ObjStm reference"
            );
            continue;
        }
        let Some(start) = first.checked_add(offset).filter(|s| *s < data.len()) else {
            continue;
        };
        let Ok(parsed) = Parser::new(data, start).parse_object() else {
            continue;
        };
        // Streams cannot live inside object streams; a nested one is bogus.
        if matches!(parsed.atom, PdfAtom::Stream(_)) {
            warn!(
                security = true,
                domain = "pdf.object_stream",
                kind = "objstm_nested_stream",
                obj = obj_num,
                "ObjStm entry holds a stream object"
            );
            continue;
        }
        out.push(ObjEntry {
            reference: ObjRef { obj: obj_num, gen: 0 },
            atom: parsed.atom,
            full_span: st.data_span,
            provenance: ObjProvenance::ObjStm(container),
        });
    }
    false
}

fn header_pairs(header: &[u8], n: usize) -> Vec<(u32, usize)> {
    let mut numbers = Vec::with_capacity(n.min(4096) * 2);
    let mut p = crate::lexer::Cursor::new(header, 0);
    while numbers.len() < n.saturating_mul(2) {
        p.skip_trivia();
        match p.read_unsigned() {
            Some(v) => numbers.push(v),
            None => break,
        }
    }
    numbers
        .chunks_exact(2)
        .filter_map(|pair| Some((u32::try_from(pair[0]).ok()?, usize::try_from(pair[1]).ok()?)))
        .collect()
}
