#![no_main]
use libfuzzer_sys::fuzz_target;
use pdftriage_core::{analyze, AnalysisOptions, AnalysisOutcome, ParseLimits, ParserContext, RawDocument};

fuzz_target!(|data: &[u8]| {
    let ctx = ParserContext::new(ParseLimits {
        max_objects: 20_000,
        max_decode_bytes: 1_000_000,
        max_total_decoded_bytes: 5_000_000,
        ..ParseLimits::default()
    });
    let options = AnalysisOptions { max_pages: 200, max_annotations: 2_000, ..AnalysisOptions::default() };
    if let AnalysisOutcome::Scored(result) = analyze(&ctx, RawDocument::new(data), &options) {
        assert!(result.score <= 100);
        assert_eq!(result.risk_level, pdftriage_core::RiskLevel::from_score(result.score));
    }
});
