#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = pdftriage_pdf::parse_pdf(
        data,
        &pdftriage_pdf::ParseOptions {
            recover_xref: true,
            max_objstm_bytes: 1_000_000,
            max_objects: 20_000,
            max_objstm_total_bytes: 5_000_000,
            ..pdftriage_pdf::ParseOptions::default()
        },
    );
});
