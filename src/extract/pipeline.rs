use scraper::Html;

use crate::error::ExtractionFailure;
use crate::extract::normalizer::normalize;
use crate::extract::selector::{extract, CompiledSelector, RawExtraction};
use crate::types::NormalizedPrice;

/// Parse a fetched page. The HTML parser itself recovers from any markup, so a
/// document is malformed only when it is not UTF-8 text, is blank, or contains
/// no markup at all.
pub fn parse_document(raw: &[u8]) -> Result<Html, ExtractionFailure> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ExtractionFailure::MalformedDocument(format!("not valid UTF-8: {e}")))?;
    if text.trim().is_empty() {
        return Err(ExtractionFailure::MalformedDocument("empty document".to_string()));
    }
    if !text.contains('<') {
        return Err(ExtractionFailure::MalformedDocument("no markup found".to_string()));
    }
    Ok(Html::parse_document(text))
}

/// Bytes to price: parse, select, normalize. Each stage short-circuits with its own failure.
pub fn run(raw: &[u8], rules: &[CompiledSelector]) -> Result<NormalizedPrice, ExtractionFailure> {
    let doc = parse_document(raw)?;
    let text = match extract(&doc, rules) {
        RawExtraction::Matched { text, .. } => text,
        RawExtraction::NoMatch => {
            return Err(ExtractionFailure::SelectorNoMatch(
                rules.iter().map(|r| r.to_string()).collect(),
            ))
        }
    };
    normalize(&text).map_err(|reason| ExtractionFailure::UnparsablePrice { raw: text, reason })
}
