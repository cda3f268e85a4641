//! Tolerant PDF object parsing for untrusted input.
//!
//! The parser recovers what it can from damaged files, bounds every
//! allocation driven by document content, and never panics on bad input.

pub mod crypt;
pub mod decode;
pub mod graph;
pub mod interrupt;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

pub use crate::graph::{
    parse_pdf, EncryptionState, LockReason, ObjEntry, ObjProvenance, ObjectGraph, ParseOptions,
};
pub use crate::interrupt::{Interrupted, ParseInterrupt};
pub use crate::object::{ObjRef, PdfAtom, PdfDict, PdfName, PdfObj, PdfStr, Span};
