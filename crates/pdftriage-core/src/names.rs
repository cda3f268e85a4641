use std::collections::HashSet;

use pdftriage_pdf::object::decode_text_string;
use pdftriage_pdf::{ObjRef, ObjectGraph, PdfAtom, PdfDict, PdfObj};
use tracing::warn;

const MAX_NAME_TREE_DEPTH: usize = 32;
const MAX_NAME_TREE_ENTRIES: usize = 100_000;

#[derive(Debug, Default)]
pub(crate) struct NameTreeWalk<'g> {
    /// Leaf `(key, value)` pairs in tree order.
    pub entries: Vec<(Vec<u8>, &'g PdfObj)>,
    pub truncated: bool,
}

/// Collects the leaves of the name tree rooted at `root`. Malformed nodes,
/// cycles and over-deep branches are skipped and flagged as truncation.
pub(crate) fn walk_name_tree<'g>(graph: &'g ObjectGraph<'g>, root: &'g PdfObj) -> NameTreeWalk<'g> {
    let mut walk = NameTreeWalk::default();
    let mut seen = HashSet::new();
    walk_node(graph, root, &mut walk, &mut seen, 0);
    walk
}

fn walk_node<'g>(
    graph: &'g ObjectGraph<'g>,
    obj: &'g PdfObj,
    walk: &mut NameTreeWalk<'g>,
    seen: &mut HashSet<ObjRef>,
    depth: usize,
) {
    if depth > MAX_NAME_TREE_DEPTH {
        warn!(
            security = true,
            domain = "pdf.name_tree",
            kind = "name_tree_depth_exceeded",
            depth,
            "Name tree depth exceeded maximum; skipping branch"
        );
        walk.truncated = true;
        return;
    }
    if let Some(r) = obj.as_reference() {
        if !seen.insert(r) {
            warn!(
                security = true,
                domain = "pdf.name_tree",
                kind = "name_tree_cycle_detected",
                obj = r.obj,
                gen = r.gen,
                "Name tree cycle detected; skipping branch"
            );
            walk.truncated = true;
            return;
        }
    }
    let Some(node) = graph.resolve_dict(obj) else {
        walk.truncated = true;
        return;
    };
    if let Some(PdfAtom::Array(items)) = node.get(b"/Names").and_then(|n| graph.resolve(n)) {
        collect_leaves(graph, items, walk);
    }
    if let Some(PdfAtom::Array(kids)) = node.get(b"/Kids").and_then(|k| graph.resolve(k)) {
        for kid in kids {
            if walk.entries.len() >= MAX_NAME_TREE_ENTRIES {
                break;
            }
            walk_node(graph, kid, walk, seen, depth + 1);
        }
    }
}

fn collect_leaves<'g>(graph: &'g ObjectGraph<'g>, items: &'g [PdfObj], walk: &mut NameTreeWalk<'g>) {
    if items.len() % 2 != 0 {
        walk.truncated = true;
    }
    for pair in items.chunks_exact(2) {
        if walk.entries.len() >= MAX_NAME_TREE_ENTRIES {
            warn!(
                security = true,
                domain = "runtime.budget",
                kind = "name_tree_entry_budget",
                max_entries = MAX_NAME_TREE_ENTRIES,
                "Name tree entry budget exhausted"
            );
            walk.truncated = true;
            return;
        }
        match graph.resolve(&pair[0]).and_then(PdfAtom::as_str) {
            Some(key) => walk.entries.push((key.bytes.clone(), &pair[1])),
            None => walk.truncated = true,
        }
    }
}

/// Display name of an embedded file: the filespec's `/UF`, then `/F`,
/// then the tree key itself.
pub(crate) fn embedded_file_name(graph: &ObjectGraph<'_>, key: &[u8], value: &PdfObj) -> String {
    let from_spec = graph.resolve_dict(value).and_then(|spec| filespec_name(graph, spec));
    from_spec.unwrap_or_else(|| decode_text_string(key))
}

fn filespec_name(graph: &ObjectGraph<'_>, spec: &PdfDict) -> Option<String> {
    [b"/UF".as_slice(), b"/F".as_slice()].into_iter().find_map(|key| {
        let text = graph.resolve(spec.get(key)?)?.as_str()?.to_text();
        (!text.is_empty()).then_some(text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdftriage_pdf::{parse_pdf, ParseOptions};

    fn names_root<'g>(graph: &'g ObjectGraph<'g>, tree: &[u8]) -> &'g PdfObj {
        let root = graph.trailer_value(b"/Root").expect("root");
        let catalog = graph.resolve_dict(root).expect("catalog");
        let names = catalog.get(b"/Names").and_then(|n| graph.resolve_dict(n)).expect("names");
        names.get(tree).expect("tree")
    }

    #[test]
    fn embedded_names_prefer_unicode_then_file_then_key() {
        let body = "%PDF-1.7\n\
            1 0 obj << /Type /Catalog /Names << /EmbeddedFiles 2 0 R >> >> endobj\n\
            2 0 obj << /Kids [3 0 R] >> endobj\n\
            3 0 obj << /Names [(a) << /F (plain.txt) /UF <FEFF00E9002E006500780065> >> (b) << /F (b.pdf) >> (c) 9 0 R] >> endobj\n\
            trailer << /Root 1 0 R >>\n";
        let graph = parse_pdf(body.as_bytes(), &ParseOptions::default()).expect("graph");
        let walk = walk_name_tree(&graph, names_root(&graph, b"/EmbeddedFiles"));
        let names: Vec<String> =
            walk.entries.iter().map(|(key, value)| embedded_file_name(&graph, key, value)).collect();
        assert_eq!(names, vec!["\u{e9}.exe".to_string(), "b.pdf".into(), "c".into()]);
    }

    #[test]
    fn self_referencing_kids_terminate() {
        let body = "%PDF-1.7\n\
            1 0 obj << /Type /Catalog /Names << /JavaScript 2 0 R >> >> endobj\n\
            2 0 obj << /Kids [2 0 R 3 0 R] >> endobj\n\
            3 0 obj << /Names [(init) 4 0 R] >> endobj\n\
            trailer << /Root 1 0 R >>\n";
        let graph = parse_pdf(body.as_bytes(), &ParseOptions::default()).expect("graph");
        let walk = walk_name_tree(&graph, names_root(&graph, b"/JavaScript"));
        assert_eq!(walk.entries.len(), 1);
        assert!(walk.truncated);
    }
}
