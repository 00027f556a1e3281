//! Path-query (XPath 1.0 subset) evaluation over a parsed HTML tree.
//!
//! Supported:
//! - absolute `/a/b`, `//a`, relative `./a`, `../a`, bare `a/b` (relative to `<html>`)
//! - steps: element name, `*`, `.`, `..`, terminal `@attr`, terminal `text()`
//! - predicates: `[2]`, `[last()]`, `[@a]`, `[@a='v']`, `[contains(@a,'v')]`,
//!   `[contains(text(),'v')]`, `[contains(.,'v')]`, `[text()='v']`, `[.='v']`,
//!   conjunctions joined with `and`, and chained `[..][..]`
//! - a parenthesized path with predicates over the whole node-set: `(//span)[1]`
//!
//! Node-sets are kept in document order.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

use crate::error::SelectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    /// `//`: descendant-or-self, then the step.
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, el: &ElementRef<'_>) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Named(name) => el.value().name().eq_ignore_ascii_case(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    HasAttr(String),
    AttrEq(String, String),
    AttrContains(String, String),
    TextEq(String),
    TextContains(String),
}

impl Condition {
    fn holds_for_element(&self, el: &ElementRef<'_>) -> bool {
        match self {
            Condition::HasAttr(name) => el.value().attr(name).is_some(),
            Condition::AttrEq(name, v) => el.value().attr(name) == Some(v.as_str()),
            Condition::AttrContains(name, v) => {
                el.value().attr(name).is_some_and(|a| a.contains(v.as_str()))
            }
            Condition::TextEq(v) => string_value(el) == *v,
            Condition::TextContains(v) => string_value(el).contains(v.as_str()),
        }
    }

    fn holds_for_text(&self, text: &str) -> bool {
        match self {
            Condition::TextEq(v) => text == v,
            Condition::TextContains(v) => text.contains(v.as_str()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    /// 1-based.
    Position(usize),
    Last,
    All(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Element {
        axis: Axis,
        test: NameTest,
        predicates: Vec<Predicate>,
    },
    SelfNode,
    Parent,
    Attribute { axis: Axis, name: String },
    Text { axis: Axis },
}

impl Step {
    fn is_terminal(&self) -> bool {
        matches!(self, Step::Attribute { .. } | Step::Text { .. })
    }
}

/// A compiled path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    absolute: bool,
    steps: Vec<Step>,
    /// Predicates applied to the whole result of a parenthesized path.
    set_predicates: Vec<Predicate>,
}

/// A node selected by a path query.
#[derive(Debug, Clone)]
pub enum PathMatch<'a> {
    Element(ElementRef<'a>),
    /// Attribute value or text node content.
    Text(String),
}

impl PathMatch<'_> {
    /// XPath string value: all descendant text for elements.
    pub fn string_value(&self) -> String {
        match self {
            PathMatch::Element(el) => string_value(el),
            PathMatch::Text(s) => s.clone(),
        }
    }
}

#[derive(Clone, Copy)]
enum Context<'a> {
    Document,
    Element(ElementRef<'a>),
}

impl PathQuery {
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        Parser::new(expression).parse_query()
    }

    /// All matches in document order.
    pub fn evaluate<'a>(&self, doc: &'a Html) -> Vec<PathMatch<'a>> {
        let root = doc.root_element();
        let document_order: Vec<ElementRef<'a>> =
            root.descendants().filter_map(ElementRef::wrap).collect();

        let mut current: Vec<Context<'a>> = if self.absolute {
            vec![Context::Document]
        } else {
            vec![Context::Element(root)]
        };

        let mut matches: Option<Vec<PathMatch<'a>>> = None;
        for step in &self.steps {
            match step {
                Step::SelfNode => {}
                Step::Parent => {
                    let parents: Vec<ElementRef<'a>> = current
                        .iter()
                        .filter_map(|ctx| match ctx {
                            Context::Element(el) => el.parent().and_then(ElementRef::wrap),
                            Context::Document => None,
                        })
                        .collect();
                    current = in_document_order(&document_order, &parents)
                        .into_iter()
                        .map(Context::Element)
                        .collect();
                }
                Step::Element { axis, test, predicates } => {
                    let mut selected = Vec::new();
                    for ctx in &current {
                        for siblings in child_groups(root, *ctx, *axis) {
                            let tested: Vec<ElementRef<'a>> =
                                siblings.into_iter().filter(|el| test.matches(el)).collect();
                            selected.extend(apply_element_predicates(tested, predicates));
                        }
                    }
                    current = in_document_order(&document_order, &selected)
                        .into_iter()
                        .map(Context::Element)
                        .collect();
                }
                Step::Attribute { axis, name } => {
                    let values = scope_elements(root, &current, *axis)
                        .into_iter()
                        .filter_map(|el| el.value().attr(name).map(|v| PathMatch::Text(v.to_string())))
                        .collect();
                    matches = Some(values);
                }
                Step::Text { axis } => {
                    matches = Some(text_nodes(root, &current, *axis));
                }
            }
        }

        let matches = matches.unwrap_or_else(|| {
            current
                .into_iter()
                .filter_map(|ctx| match ctx {
                    Context::Element(el) => Some(PathMatch::Element(el)),
                    Context::Document => None,
                })
                .collect()
        });

        apply_set_predicates(matches, &self.set_predicates)
    }

    /// String value of the first matched node, if any.
    pub fn first_string(&self, doc: &Html) -> Option<String> {
        self.evaluate(doc).first().map(PathMatch::string_value)
    }
}

fn string_value(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

/// Groups of element siblings the step's node test runs over, one group per parent.
/// Positional predicates are relative to each group.
fn child_groups<'a>(root: ElementRef<'a>, ctx: Context<'a>, axis: Axis) -> Vec<Vec<ElementRef<'a>>> {
    let children = |el: ElementRef<'a>| el.children().filter_map(ElementRef::wrap).collect::<Vec<_>>();
    match (ctx, axis) {
        (Context::Document, Axis::Child) => vec![vec![root]],
        (Context::Element(el), Axis::Child) => vec![children(el)],
        (Context::Document, Axis::Descendant) => {
            let mut groups = vec![vec![root]];
            groups.extend(root.descendants().filter_map(ElementRef::wrap).map(children));
            groups
        }
        (Context::Element(el), Axis::Descendant) => {
            el.descendants().filter_map(ElementRef::wrap).map(children).collect()
        }
    }
}

/// Elements whose attributes an `@attr` step reads.
fn scope_elements<'a>(root: ElementRef<'a>, current: &[Context<'a>], axis: Axis) -> Vec<ElementRef<'a>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for ctx in current {
        let scope: Vec<ElementRef<'a>> = match (ctx, axis) {
            (Context::Document, Axis::Child) => Vec::new(),
            (Context::Element(el), Axis::Child) => vec![*el],
            (Context::Document, Axis::Descendant) => {
                root.descendants().filter_map(ElementRef::wrap).collect()
            }
            (Context::Element(el), Axis::Descendant) => {
                el.descendants().filter_map(ElementRef::wrap).collect()
            }
        };
        for el in scope {
            if seen.insert(el.id()) {
                out.push(el);
            }
        }
    }
    out
}

fn text_nodes<'a>(root: ElementRef<'a>, current: &[Context<'a>], axis: Axis) -> Vec<PathMatch<'a>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for ctx in current {
        let base = match ctx {
            Context::Document => root,
            Context::Element(el) => *el,
        };
        let nodes: Vec<_> = match (ctx, axis) {
            (Context::Document, Axis::Child) => Vec::new(),
            (Context::Element(_), Axis::Child) => base.children().collect(),
            (_, Axis::Descendant) => base.descendants().collect(),
        };
        for node in nodes {
            if let Some(text) = node.value().as_text() {
                if seen.insert(node.id()) {
                    out.push(PathMatch::Text(text.to_string()));
                }
            }
        }
    }
    out
}

fn in_document_order<'a>(order: &[ElementRef<'a>], selected: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
    let wanted: HashSet<_> = selected.iter().map(|el| el.id()).collect();
    order.iter().filter(|el| wanted.contains(&el.id())).copied().collect()
}

fn apply_element_predicates<'a>(
    mut nodes: Vec<ElementRef<'a>>,
    predicates: &[Predicate],
) -> Vec<ElementRef<'a>> {
    for predicate in predicates {
        nodes = match predicate {
            Predicate::Position(n) => nodes.get(n - 1).copied().into_iter().collect(),
            Predicate::Last => nodes.last().copied().into_iter().collect(),
            Predicate::All(conditions) => nodes
                .into_iter()
                .filter(|el| conditions.iter().all(|c| c.holds_for_element(el)))
                .collect(),
        };
    }
    nodes
}

fn apply_set_predicates<'a>(mut matches: Vec<PathMatch<'a>>, predicates: &[Predicate]) -> Vec<PathMatch<'a>> {
    for predicate in predicates {
        matches = match predicate {
            Predicate::Position(n) => matches.into_iter().nth(n - 1).into_iter().collect(),
            Predicate::Last => matches.pop().into_iter().collect(),
            Predicate::All(conditions) => matches
                .into_iter()
                .filter(|m| match m {
                    PathMatch::Element(el) => conditions.iter().all(|c| c.holds_for_element(el)),
                    PathMatch::Text(t) => conditions.iter().all(|c| c.holds_for_text(t)),
                })
                .collect(),
        };
    }
    matches
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'s> {
    source: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self { source, chars: source.chars().collect(), pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError::XPath {
            expression: self.source.to_string(),
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn looking_at(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.looking_at(s) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), SelectorError> {
        if self.eat(s) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{s}'")))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_query(mut self) -> Result<PathQuery, SelectorError> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.error("empty path"));
        }

        let query = if self.eat("(") {
            let mut inner = self.parse_path()?;
            self.skip_ws();
            self.expect(")")?;
            inner.set_predicates = self.parse_predicates()?;
            inner
        } else {
            self.parse_path()?
        };

        self.skip_ws();
        if !self.at_end() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(query)
    }

    fn parse_path(&mut self) -> Result<PathQuery, SelectorError> {
        let (absolute, mut axis) = if self.eat("//") {
            (true, Axis::Descendant)
        } else if self.eat("/") {
            (true, Axis::Child)
        } else {
            (false, Axis::Child)
        };

        let mut steps = Vec::new();
        loop {
            if steps.last().is_some_and(Step::is_terminal) {
                return Err(self.error("attribute and text() steps must come last"));
            }
            steps.push(self.parse_step(axis)?);

            if self.eat("//") {
                axis = Axis::Descendant;
            } else if self.eat("/") {
                axis = Axis::Child;
            } else {
                break;
            }
        }

        Ok(PathQuery { absolute, steps, set_predicates: Vec::new() })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, SelectorError> {
        if self.eat("..") {
            return Ok(Step::Parent);
        }
        if self.eat(".") {
            return Ok(Step::SelfNode);
        }
        if self.eat("@") {
            let name = self.parse_name()?;
            return Ok(Step::Attribute { axis, name });
        }
        if self.eat("text()") {
            return Ok(Step::Text { axis });
        }
        let test = if self.eat("*") {
            NameTest::Any
        } else {
            NameTest::Named(self.parse_name()?.to_ascii_lowercase())
        };
        let predicates = self.parse_predicates()?;
        Ok(Step::Element { axis, test, predicates })
    }

    fn parse_name(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_predicates(&mut self) -> Result<Vec<Predicate>, SelectorError> {
        let mut predicates = Vec::new();
        while self.eat("[") {
            self.skip_ws();
            let predicate = if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                let position = self.parse_position()?;
                Predicate::Position(position)
            } else if self.eat("last()") {
                Predicate::Last
            } else {
                let mut conditions = vec![self.parse_condition()?];
                loop {
                    self.skip_ws();
                    if !self.eat("and") {
                        break;
                    }
                    self.skip_ws();
                    conditions.push(self.parse_condition()?);
                }
                Predicate::All(conditions)
            };
            self.skip_ws();
            self.expect("]")?;
            predicates.push(predicate);
        }
        Ok(predicates)
    }

    fn parse_position(&mut self) -> Result<usize, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        match digits.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(self.error("positions start at 1")),
        }
    }

    fn parse_condition(&mut self) -> Result<Condition, SelectorError> {
        if self.eat("contains(") {
            self.skip_ws();
            let subject = self.parse_subject()?;
            self.skip_ws();
            self.expect(",")?;
            self.skip_ws();
            let needle = self.parse_literal()?;
            self.skip_ws();
            self.expect(")")?;
            return Ok(match subject {
                Subject::Attr(name) => Condition::AttrContains(name, needle),
                Subject::Text => Condition::TextContains(needle),
            });
        }

        let subject = self.parse_subject()?;
        self.skip_ws();
        if self.eat("=") {
            self.skip_ws();
            let value = self.parse_literal()?;
            return Ok(match subject {
                Subject::Attr(name) => Condition::AttrEq(name, value),
                Subject::Text => Condition::TextEq(value),
            });
        }
        match subject {
            Subject::Attr(name) => Ok(Condition::HasAttr(name)),
            Subject::Text => Err(self.error("expected '=' after text()")),
        }
    }

    fn parse_subject(&mut self) -> Result<Subject, SelectorError> {
        if self.eat("@") {
            return Ok(Subject::Attr(self.parse_name()?));
        }
        if self.eat("text()") || self.eat(".") {
            return Ok(Subject::Text);
        }
        Err(self.error("expected '@attr', 'text()' or '.'"))
    }

    fn parse_literal(&mut self) -> Result<String, SelectorError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.at_end() {
            return Err(self.error("unterminated string"));
        }
        let literal = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(literal)
    }
}

enum Subject {
    Attr(String),
    Text,
}
