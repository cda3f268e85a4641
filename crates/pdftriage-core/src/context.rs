use pdftriage_pdf::{ParseInterrupt, ParseOptions};

/// Byte and object ceilings applied while the low-level object graph is built.
#[derive(Debug, Clone)]
pub struct ParseLimits {
    pub max_objects: usize,
    /// Decoded size cap for one object stream.
    pub max_decode_bytes: usize,
    /// Decoded size cap across all object streams of a document.
    pub max_total_decoded_bytes: usize,
    pub max_document_bytes: usize,
    pub recover_xref: bool,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_objects: 500_000,
            max_decode_bytes: 32 * 1024 * 1024,
            max_total_decoded_bytes: 256 * 1024 * 1024,
            max_document_bytes: 256 * 1024 * 1024,
            recover_xref: true,
        }
    }
}

/// Explicit parser handle passed into the loader. Holds no per-document
/// state, so one context serves any number of runs, concurrently or not.
#[derive(Debug, Clone, Default)]
pub struct ParserContext {
    limits: ParseLimits,
}

impl ParserContext {
    pub fn new(limits: ParseLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    pub(crate) fn parse_options(&self, password: Option<&[u8]>, interrupt: ParseInterrupt) -> ParseOptions {
        ParseOptions {
            recover_xref: self.limits.recover_xref,
            max_objects: self.limits.max_objects,
            max_objstm_bytes: self.limits.max_decode_bytes,
            max_objstm_total_bytes: self.limits.max_total_decoded_bytes,
            password: password.map(<[u8]>::to_vec),
            interrupt,
        }
    }
}
