#![no_main]
use libfuzzer_sys::fuzz_target;
use pdftriage_pdf::parser::Parser;

// Filter chains with predictors, fed through the same entry point the
// object-stream expander uses.
const DICTS: &[&[u8]] = &[
    b"<< /Filter /FlateDecode >>",
    b"<< /Filter /LZWDecode /DecodeParms << /Predictor 12 /Columns 4 >> >>",
    b"<< /Filter [/ASCIIHexDecode /FlateDecode] >>",
    b"<< /Filter [/ASCII85Decode /RunLengthDecode] >>",
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let raw = DICTS[selector as usize % DICTS.len()];
    let Ok(obj) = Parser::new(raw, 0).parse_object() else {
        return;
    };
    if let Some(dict) = obj.atom.as_dict() {
        let _ = pdftriage_pdf::decode::decode_stream_data(payload, dict, 1_000_000);
    }
});
