use std::collections::HashMap;

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use crate::crypt::{unlock, StandardSecurity, Unlock};
use crate::interrupt::{Interrupted, ParseInterrupt};
use crate::object::{ObjRef, PdfAtom, PdfDict, PdfObj, Span};
use crate::objstm::{expand_object_streams, ObjStmLimits};
use crate::parser::scan_indirect_objects;
use crate::xref::{find_startxrefs, parse_xref_chain, recover_trailers};

/// Chained references are followed at most this many hops.
const MAX_REF_HOPS: usize = 8;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Rebuild trailers from a raw scan when the xref chain is unusable.
    pub recover_xref: bool,
    /// Cap on parsed objects, indirect and compressed. Zero disables it.
    pub max_objects: usize,
    pub max_objstm_bytes: usize,
    pub max_objstm_total_bytes: usize,
    /// Credential tried against the standard security handler.
    pub password: Option<Vec<u8>>,
    pub interrupt: ParseInterrupt,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            recover_xref: true,
            max_objects: 500_000,
            max_objstm_bytes: 32 * 1024 * 1024,
            max_objstm_total_bytes: 256 * 1024 * 1024,
            password: None,
            interrupt: ParseInterrupt::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjEntry {
    pub reference: ObjRef,
    pub atom: PdfAtom,
    /// Where the object sits in the file; for compressed objects this is
    /// the containing stream's data.
    pub full_span: Span,
    pub provenance: ObjProvenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjProvenance {
    Indirect,
    ObjStm(ObjRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReason {
    /// No password was supplied and the empty user password did not work.
    CredentialRequired,
    WrongCredential,
    /// The handler is not one this crate can decrypt.
    UnsupportedHandler(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionState {
    Clear,
    Unlocked { revision: u8, owner_authenticated: bool },
    Locked(LockReason),
}

#[derive(Debug)]
pub struct ObjectGraph<'a> {
    pub bytes: &'a [u8],
    pub objects: Vec<ObjEntry>,
    pub index: HashMap<ObjRef, Vec<usize>>,
    /// Trailer dictionaries, newest first.
    pub trailers: Vec<PdfDict>,
    /// Trailers came from a raw scan rather than the xref chain.
    pub xref_recovered: bool,
    /// An object or object-stream budget stopped parsing early.
    pub objects_truncated: bool,
    /// The deadline in [`ParseInterrupt`] passed; the graph holds what was
    /// parsed before it.
    pub deadline_exceeded: bool,
    pub encryption: EncryptionState,
}

impl<'a> ObjectGraph<'a> {
    /// Most recent definition of `reference`. Later definitions override
    /// earlier ones, as with incremental updates.
    pub fn get_object(&self, reference: ObjRef) -> Option<&ObjEntry> {
        self.index
            .get(&reference)
            .and_then(|v| v.last().copied())
            .and_then(|idx| self.objects.get(idx))
    }

    /// Follows references until a direct value is reached. `None` means the
    /// reference dangles or the chain is too long.
    pub fn resolve<'g>(&'g self, obj: &'g PdfObj) -> Option<&'g PdfAtom> {
        let mut atom = &obj.atom;
        for _ in 0..MAX_REF_HOPS {
            match atom {
                PdfAtom::Ref(r) => atom = &self.get_object(*r)?.atom,
                direct => return Some(direct),
            }
        }
        None
    }

    pub fn resolve_dict<'g>(&'g self, obj: &'g PdfObj) -> Option<&'g PdfDict> {
        self.resolve(obj)?.as_dict()
    }

    /// First value for `key` among the trailers, newest first.
    pub fn trailer_value(&self, key: &[u8]) -> Option<&PdfObj> {
        self.trailers.iter().find_map(|t| t.get(key))
    }
}

pub fn parse_pdf<'a>(bytes: &'a [u8], options: &ParseOptions) -> Result<ObjectGraph<'a>> {
    let parse_span = tracing::info_span!(
        "parse_pdf",
        bytes_len = bytes.len(),
        recover_xref = options.recover_xref
    );
    let _parse_guard = parse_span.enter();
    info!("Parsing PDF object graph");

    let startxrefs = find_startxrefs(bytes);
    let chain = match startxrefs.last() {
        Some(&offset) => parse_xref_chain(bytes, offset),
        None => Default::default(),
    };
    debug!(startxrefs = startxrefs.len(), sections = chain.sections.len(), "Parsed xref chain");

    let scan = scan_indirect_objects(bytes, options.max_objects, &options.interrupt);
    let mut deadline_exceeded = match scan.interrupted {
        Some(Interrupted::Cancelled) => return Err(Interrupted::Cancelled.into()),
        Some(Interrupted::DeadlineExceeded) => true,
        None => false,
    };
    let objects = scan.objects;
    if objects.is_empty() {
        if deadline_exceeded {
            return Err(Interrupted::DeadlineExceeded.into());
        }
        return Err(anyhow!("no indirect objects found"));
    }
    let mut objects_truncated = scan.truncated;

    let mut trailers: Vec<PdfDict> = chain.trailers().cloned().collect();
    let chain_usable = !chain.broken && trailers.iter().any(|t| t.contains_key(b"/Root"));
    let mut xref_recovered = false;
    if !chain_usable && options.recover_xref {
        warn!(
            security = true,
            domain = "pdf.xref",
            kind = "xref_recovery",
            sections = chain.sections.len(),
            "Cross-reference chain unusable; recovering trailers from raw scan"
        );
        trailers.extend(recover_trailers(bytes, &objects));
        xref_recovered = true;
    }

    let mut graph = ObjectGraph {
        bytes,
        index: build_index(&objects),
        objects,
        trailers,
        xref_recovered,
        objects_truncated,
        deadline_exceeded,
        encryption: EncryptionState::Clear,
    };

    let security = apply_encryption(&mut graph, options.password.as_deref());
    if matches!(graph.encryption, EncryptionState::Locked(_)) {
        info!(objects = graph.objects.len(), "Document is locked; skipping object streams");
        return Ok(graph);
    }

    let limits = ObjStmLimits {
        max_stream_bytes: options.max_objstm_bytes,
        max_total_bytes: options.max_objstm_total_bytes,
        max_objects: options.max_objects,
    };
    let expansion = expand_object_streams(bytes, &graph.objects, security.as_ref(), &limits, &options.interrupt);
    match expansion.interrupted {
        Some(Interrupted::Cancelled) => return Err(Interrupted::Cancelled.into()),
        Some(Interrupted::DeadlineExceeded) => deadline_exceeded = true,
        None => {}
    }
    objects_truncated |= expansion.budget_exhausted;
    graph.objects.extend(expansion.objects);
    graph.index = build_index(&graph.objects);
    graph.objects_truncated = objects_truncated;
    graph.deadline_exceeded = deadline_exceeded;

    info!(
        objects = graph.objects.len(),
        trailers = graph.trailers.len(),
        recovered = graph.xref_recovered,
        "Parsed PDF object graph"
    );
    Ok(graph)
}

fn build_index(objects: &[ObjEntry]) -> HashMap<ObjRef, Vec<usize>> {
    let mut index: HashMap<ObjRef, Vec<usize>> = HashMap::new();
    for (i, entry) in objects.iter().enumerate() {
        index.entry(entry.reference).or_default().push(i);
    }
    index
}

/// Authenticates against `/Encrypt` when present and decrypts every string
/// of every indirect object in place.
fn apply_encryption(graph: &mut ObjectGraph<'_>, password: Option<&[u8]>) -> Option<StandardSecurity> {
    let encrypt_obj = graph.trailer_value(b"/Encrypt")?.clone();
    let encrypt_ref = encrypt_obj.as_reference();
    let Some(encrypt) = graph.resolve_dict(&encrypt_obj).cloned() else {
        warn!(
            security = true,
            domain = "pdf.encryption",
            kind = "encrypt_dict_unresolved",
            "Trailer /Encrypt does not resolve to a dictionary"
        );
        graph.encryption =
            EncryptionState::Locked(LockReason::UnsupportedHandler("unresolvable /Encrypt".into()));
        return None;
    };
    let file_id = graph
        .trailer_value(b"/ID")
        .and_then(|id| id.atom.as_array())
        .and_then(|items| items.first())
        .and_then(|first| first.atom.as_str())
        .map(|s| s.bytes.clone())
        .unwrap_or_default();
    let security = match unlock(&encrypt, &file_id, password) {
        Unlock::Unlocked(sec) => sec,
        Unlock::WrongPassword => {
            let reason = if password.is_some() {
                LockReason::WrongCredential
            } else {
                LockReason::CredentialRequired
            };
            info!(reason = ?reason, "Encrypted document could not be unlocked");
            graph.encryption = EncryptionState::Locked(reason);
            return None;
        }
        Unlock::Unsupported(what) => {
            warn!(
                security = true,
                domain = "pdf.encryption",
                kind = "unsupported_encryption",
                handler = %what,
                "Unsupported encryption"
            );
            graph.encryption = EncryptionState::Locked(LockReason::UnsupportedHandler(what));
            return None;
        }
    };
    for entry in &mut graph.objects {
        if Some(entry.reference) == encrypt_ref || entry.provenance != ObjProvenance::Indirect {
            continue;
        }
        if let PdfAtom::Stream(st) = &entry.atom {
            if st.dict.has_name(b"/Type", b"/XRef") {
                continue;
            }
        }
        let key = security.object_key(entry.reference);
        decrypt_strings(&mut entry.atom, &key);
    }
    graph.encryption = EncryptionState::Unlocked {
        revision: security.revision(),
        owner_authenticated: security.owner_authenticated(),
    };
    Some(security)
}

fn decrypt_strings(atom: &mut PdfAtom, key: &[u8]) {
    match atom {
        PdfAtom::Str(s) => s.bytes = crate::crypt::rc4(key, &s.bytes),
        PdfAtom::Array(items) => {
            for item in items {
                decrypt_strings(&mut item.atom, key);
            }
        }
        PdfAtom::Dict(d) => {
            for (_, value) in &mut d.entries {
                decrypt_strings(&mut value.atom, key);
            }
        }
        PdfAtom::Stream(st) => {
            for (_, value) in &mut st.dict.entries {
                decrypt_strings(&mut value.atom, key);
            }
        }
        _ => {}
    }
}
