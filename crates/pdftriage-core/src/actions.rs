use pdftriage_pdf::{ObjectGraph, PdfAtom, PdfDict, PdfObj};
use tracing::trace;

use crate::model::{Action, ActionKind, Annotation};

/// Reads an action dictionary by its `/S` type. Nothing is evaluated.
pub(crate) fn action_from_dict(graph: &ObjectGraph<'_>, dict: &PdfDict) -> Action {
    let Some(kind) = dict.name(b"/S") else {
        // Some producers omit /S on script actions and rely on /JS alone.
        if dict.contains_key(b"/JS") {
            return Action::Script;
        }
        return Action::Unknown("missing".into());
    };
    match kind.decoded.to_ascii_lowercase().as_slice() {
        b"/uri" => Action::Uri(uri_target(graph, dict).unwrap_or_default()),
        b"/javascript" => Action::Script,
        b"/launch" => Action::Launch,
        b"/submitform" => Action::SubmitForm,
        b"/goto" | b"/named" | b"/thread" => Action::InternalNavigation,
        _ => Action::Unknown(kind.bare()),
    }
}

/// Follows one reference from an `/A` value to its action dictionary.
pub(crate) fn resolve_action(graph: &ObjectGraph<'_>, obj: &PdfObj) -> Action {
    match graph.resolve_dict(obj) {
        Some(dict) => action_from_dict(graph, dict),
        None => {
            trace!(target_type = obj.atom.type_name(), "Action value does not resolve to a dictionary");
            Action::Unknown("unresolved".into())
        }
    }
}

/// Link actions: `/A` wins over `/Dest`, so at most one is ever kept.
fn link_action(graph: &ObjectGraph<'_>, dict: &PdfDict) -> Option<Action> {
    if let Some(a) = dict.get(b"/A") {
        return Some(resolve_action(graph, a));
    }
    dict.get(b"/Dest").map(|_| Action::InternalNavigation)
}

pub(crate) fn annotation_from_dict(graph: &ObjectGraph<'_>, dict: &PdfDict) -> Annotation {
    match dict.name(b"/Subtype") {
        Some(subtype) if subtype.is(b"/Link") => Annotation::Link { action: link_action(graph, dict) },
        Some(subtype) if subtype.is(b"/Widget") => {
            Annotation::Widget { action: dict.get(b"/A").map(|a| resolve_action(graph, a)) }
        }
        Some(subtype) => Annotation::Other { subtype: subtype.bare() },
        None => Annotation::Other { subtype: "unknown".into() },
    }
}

/// Best-effort kind of a catalog `/OpenAction`, which is either an action
/// dictionary or an explicit destination array.
pub(crate) fn open_action_kind(graph: &ObjectGraph<'_>, obj: &PdfObj) -> ActionKind {
    match graph.resolve(obj) {
        Some(PdfAtom::Array(_)) => ActionKind::InternalNavigation,
        Some(atom) => match atom.as_dict() {
            Some(dict) => action_from_dict(graph, dict).kind(),
            None => ActionKind::Unknown,
        },
        None => ActionKind::Unknown,
    }
}

fn uri_target(graph: &ObjectGraph<'_>, dict: &PdfDict) -> Option<String> {
    let value = graph.resolve(dict.get(b"/URI")?)?;
    let text = value.as_str()?.to_text();
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    Some(trimmed.to_string())
}
