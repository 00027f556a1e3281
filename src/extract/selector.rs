use scraper::{Html, Selector};
use tracing::debug;

use crate::error::SelectorError;
use crate::extract::xpath::PathQuery;
use crate::types::{SelectorKind, SelectorRule};

/// A selector rule in executable form.
#[derive(Debug, Clone)]
pub enum CompiledRule {
    Css(Selector),
    XPath(PathQuery),
}

pub fn compile(rule: &SelectorRule) -> Result<CompiledRule, SelectorError> {
    match rule.kind {
        SelectorKind::Css => Selector::parse(&rule.expression)
            .map(CompiledRule::Css)
            .map_err(|e| SelectorError::Css {
                expression: rule.expression.clone(),
                message: e.to_string(),
            }),
        SelectorKind::XPath => PathQuery::parse(&rule.expression).map(CompiledRule::XPath),
    }
}

impl CompiledRule {
    /// Trimmed text of the first match, or `None` when nothing matched or the text is blank.
    pub fn first_text(&self, doc: &Html) -> Option<String> {
        let text = match self {
            CompiledRule::Css(selector) => doc.select(selector).next().map(|el| {
                if el.value().name() == "meta" {
                    el.value().attr("content").unwrap_or_default().to_string()
                } else {
                    el.text().collect::<String>()
                }
            }),
            CompiledRule::XPath(query) => query.first_string(doc),
        }?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// A classified rule together with its compiled form. Built once when the
/// catalogue is validated and evaluated as-is on every run.
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    pub rule: SelectorRule,
    compiled: CompiledRule,
}

impl CompiledSelector {
    pub fn new(rule: SelectorRule) -> Result<Self, SelectorError> {
        let compiled = compile(&rule)?;
        Ok(Self { rule, compiled })
    }

    /// Classify and compile a raw selector string.
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        Self::new(SelectorRule::classify(raw))
    }
}

impl std::fmt::Display for CompiledSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.rule.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawExtraction {
    /// `rule` is the index of the rule that produced `text`.
    Matched { rule: usize, text: String },
    NoMatch,
}

/// Evaluate `selectors` in order and return the first non-empty match.
pub fn extract(doc: &Html, selectors: &[CompiledSelector]) -> RawExtraction {
    for (index, selector) in selectors.iter().enumerate() {
        match selector.compiled.first_text(doc) {
            Some(text) => {
                debug!(rule = %selector, text = %text, "[EXTRACT] Rule matched");
                return RawExtraction::Matched { rule: index, text };
            }
            None => debug!(rule = %selector, "[EXTRACT] Rule did not match"),
        }
    }
    RawExtraction::NoMatch
}
