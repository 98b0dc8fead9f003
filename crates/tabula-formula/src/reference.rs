//! Reference extraction
//!
//! A formula mixes ordinary expression syntax with several reference forms:
//!
//! | Syntax | Reference |
//! |--------|-----------|
//! | `[Field]` | [`Reference::LocalField`] |
//! | `Sheet.Field` | [`Reference::CrossSheetField`] |
//! | `Sheet.[Field(2)]` | [`Reference::FixedValue`] |
//! | `COUNT([Field])`, `COUNT(Value)`, `COUNT(Sheet.Value)` | [`Aggregate::CountField`] / [`Aggregate::CountLiteral`] |
//! | `LOOKUP(Sheet, Col, FilterCol, FilterVal)` | [`Aggregate::Lookup`] |
//! | `HAS_VALUE(Sheet, Col, Val)` | [`Aggregate::HasValue`] |
//!
//! [`parse_references`] extracts them in a fixed order, most specific form
//! first, and leaves a template of [`Segment`]s in which every extracted
//! reference is an opaque slot. Later passes only ever see the remaining
//! text, so `Sheet.[Col(2)]` can never be re-read as `Sheet.Col`.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Match, Regex};

use crate::error::{FormulaError, FormulaResult};

/// `Sheet.[Field(Index)]`
static FIXED_VALUE: OnceLock<Regex> = OnceLock::new();
/// `COUNT(...)`, `LOOKUP(...)`, `HAS_VALUE(...)` with single-level content
static AGGREGATE_CALL: OnceLock<Regex> = OnceLock::new();
/// `[Field]`
static LOCAL_FIELD: OnceLock<Regex> = OnceLock::new();
/// `Sheet.Field`, where the field may contain single spaces or hyphens
/// followed by a word that does not start with a digit
static CROSS_SHEET_FIELD: OnceLock<Regex> = OnceLock::new();

fn fixed_value_regex() -> &'static Regex {
    FIXED_VALUE.get_or_init(|| {
        Regex::new(r"\b(\w+)\.\[([\w\s-]+)\((\d+)\)\]").expect("valid fixed value pattern")
    })
}

fn aggregate_call_regex() -> &'static Regex {
    AGGREGATE_CALL.get_or_init(|| {
        // Bracketed names and quoted strings match first so calls inside them are skipped
        Regex::new(r#"(?i)\[[^\]]*\]|"[^"]*"|'[^']*'|\b(COUNT|LOOKUP|HAS_VALUE)\s*\(([^()]*)\)"#)
            .expect("valid aggregate pattern")
    })
}

fn local_field_regex() -> &'static Regex {
    LOCAL_FIELD.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("valid field pattern"))
}

fn cross_sheet_field_regex() -> &'static Regex {
    CROSS_SHEET_FIELD.get_or_init(|| {
        Regex::new(r"\b(\w+)\.(\w+(?:[ -][^\W\d]\w*)*)").expect("valid cross-sheet pattern")
    })
}

/// Words that end a multi-word `Sheet.Field` name
const OPERATOR_WORDS: [&str; 3] = ["and", "or", "not"];

/// A whole-table function call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// `COUNT(Value)` or `COUNT(Sheet.Value)`: cells equal to a literal
    CountLiteral {
        sheet: Option<String>,
        literal: String,
    },
    /// `COUNT([Field])`: frequency of the current row's value
    CountField(String),
    /// `LOOKUP(Sheet, Col, FilterCol, FilterVal)`
    Lookup {
        sheet: String,
        get_column: String,
        filter_column: String,
        filter_value: String,
    },
    /// `HAS_VALUE(Sheet, Col, Val)`
    HasValue {
        sheet: String,
        column: String,
        value: String,
    },
}

impl Aggregate {
    /// Whether the result depends on the row being evaluated
    pub fn is_row_dependent(&self) -> bool {
        matches!(self, Aggregate::CountField(_))
    }
}

/// A mention of table data inside a formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Current sheet, current row
    LocalField(String),
    /// Another sheet, row-aligned by index
    CrossSheetField { sheet: String, field: String },
    /// Another sheet, one fixed row
    FixedValue {
        sheet: String,
        field: String,
        index: usize,
    },
    /// Whole-table function call
    Aggregate(Aggregate),
}

impl Reference {
    /// Sheet named by the reference, if any
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::LocalField(_) => None,
            Reference::CrossSheetField { sheet, .. } | Reference::FixedValue { sheet, .. } => {
                Some(sheet)
            }
            Reference::Aggregate(Aggregate::CountLiteral { sheet, .. }) => sheet.as_deref(),
            Reference::Aggregate(Aggregate::CountField(_)) => None,
            Reference::Aggregate(Aggregate::Lookup { sheet, .. })
            | Reference::Aggregate(Aggregate::HasValue { sheet, .. }) => Some(sheet),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::LocalField(field) => write!(f, "[{}]", field),
            Reference::CrossSheetField { sheet, field } => write!(f, "{}.{}", sheet, field),
            Reference::FixedValue {
                sheet,
                field,
                index,
            } => write!(f, "{}.[{}({})]", sheet, field, index),
            Reference::Aggregate(Aggregate::CountLiteral { sheet, literal }) => match sheet {
                Some(sheet) => write!(f, "COUNT({}.{})", sheet, literal),
                None => write!(f, "COUNT({})", literal),
            },
            Reference::Aggregate(Aggregate::CountField(field)) => write!(f, "COUNT([{}])", field),
            Reference::Aggregate(Aggregate::Lookup {
                sheet,
                get_column,
                filter_column,
                filter_value,
            }) => write!(
                f,
                "LOOKUP({}, {}, {}, \"{}\")",
                sheet, get_column, filter_column, filter_value
            ),
            Reference::Aggregate(Aggregate::HasValue {
                sheet,
                column,
                value,
            }) => write!(f, "HAS_VALUE({}, {}, \"{}\")", sheet, column, value),
        }
    }
}

/// A piece of the formula template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Expression text still to be tokenized
    Text(String),
    /// Quoted string literal from the source (quotes removed)
    Literal(String),
    /// Slot bound to `references[index]`
    Ref(usize),
}

/// A formula split into references and a slot template
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormula {
    source: String,
    references: Vec<Reference>,
    segments: Vec<Segment>,
}

impl ParsedFormula {
    /// Original formula text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct references in order of extraction
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Template segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Rebuild expression text, filling every slot with `fill(index)`
    ///
    /// Quoted literals are re-quoted with double quotes.
    pub fn render<F>(&self, mut fill: F) -> String
    where
        F: FnMut(usize) -> String,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Literal(text) => {
                    out.push('"');
                    out.push_str(text);
                    out.push('"');
                }
                Segment::Ref(index) => out.push_str(&fill(*index)),
            }
        }
        out
    }
}

impl fmt::Display for ParsedFormula {
    /// Formula text with references in canonical form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.render(|index| self.references[index].to_string());
        f.write_str(&text)
    }
}

/// Extract every reference from a formula
///
/// Only unbalanced `[]` or `()` outside string literals are rejected. Any
/// other unrecognised text is left in the template for the expression
/// parser to reject when the formula is evaluated.
///
/// # Example
/// ```rust
/// use tabula_formula::{parse_references, Reference};
///
/// let parsed = parse_references("Stock.[Qty(2)] + Stock.Qty * 3.14").unwrap();
/// assert_eq!(parsed.references().len(), 2);
/// assert!(matches!(parsed.references()[0], Reference::FixedValue { index: 2, .. }));
/// ```
pub fn parse_references(formula: &str) -> FormulaResult<ParsedFormula> {
    check_balance(formula)?;

    let mut parser = ReferenceParser::default();
    let segments = vec![Segment::Text(formula.to_string())];

    let segments = parser.split(segments, fixed_value_regex(), |whole, caps| {
        let sheet = &caps[1];
        if is_numeric_token(sheet) {
            return Extraction::Skip(past_dot(caps));
        }
        Extraction::Ref(
            Reference::FixedValue {
                sheet: sheet.to_string(),
                field: caps[2].to_string(),
                // An index too large for usize is out of bounds for any table
                index: caps[3].parse().unwrap_or(usize::MAX),
            },
            whole.end(),
        )
    });

    let segments = parser.split(segments, aggregate_call_regex(), |whole, caps| {
        match (caps.get(1), caps.get(2)) {
            (Some(name), Some(content)) => match parse_aggregate(name.as_str(), content.as_str()) {
                Some(aggregate) => Extraction::Ref(Reference::Aggregate(aggregate), whole.end()),
                None => Extraction::Skip(whole.end()),
            },
            _ => Extraction::Skip(whole.end()),
        }
    });

    let segments = split_literals(segments);

    let segments = parser.split(segments, local_field_regex(), |whole, caps| {
        Extraction::Ref(Reference::LocalField(caps[1].to_string()), whole.end())
    });

    let segments = parser.split(segments, cross_sheet_field_regex(), |_, caps| {
        let (Some(sheet), Some(field)) = (caps.get(1), caps.get(2)) else {
            return Extraction::Skip(past_dot(caps));
        };
        if is_numeric_token(sheet.as_str()) {
            // A decimal literal; the match may have run into the next `Sheet.Field`
            return Extraction::Skip(past_dot(caps));
        }
        let name = trim_operator_words(field.as_str());
        Extraction::Ref(
            Reference::CrossSheetField {
                sheet: sheet.as_str().to_string(),
                field: name.to_string(),
            },
            field.start() + name.len(),
        )
    });

    log::trace!(
        "Parsed '{}' into {} references",
        formula,
        parser.references.len()
    );

    Ok(ParsedFormula {
        source: formula.to_string(),
        references: parser.references,
        segments: merge_text(segments),
    })
}

/// Outcome of one regex match in an extraction pass
enum Extraction {
    /// A reference and the end offset of the text it consumed
    Ref(Reference, usize),
    /// Leave the match as text and resume scanning at this offset
    Skip(usize),
}

/// Offset just past the `.` following the sheet group
fn past_dot(caps: &Captures<'_>) -> usize {
    caps.get(1)
        .or_else(|| caps.get(0))
        .map_or(1, |m| m.end() + 1)
}

#[derive(Default)]
struct ReferenceParser {
    references: Vec<Reference>,
}

impl ReferenceParser {
    fn intern(&mut self, reference: Reference) -> usize {
        match self.references.iter().position(|r| *r == reference) {
            Some(index) => index,
            None => {
                self.references.push(reference);
                self.references.len() - 1
            }
        }
    }

    /// Run one extraction pass over the text segments
    ///
    /// `extract` sees the whole match and its groups; offsets it returns
    /// are relative to the slice being scanned.
    fn split<F>(&mut self, segments: Vec<Segment>, re: &Regex, mut extract: F) -> Vec<Segment>
    where
        F: FnMut(Match<'_>, &Captures<'_>) -> Extraction,
    {
        let mut out = Vec::with_capacity(segments.len());

        for segment in segments {
            let Segment::Text(text) = segment else {
                out.push(segment);
                continue;
            };

            let mut pos = 0;
            let mut last = 0;
            while pos < text.len() {
                let Some(caps) = re.captures(&text[pos..]) else {
                    break;
                };
                let Some(whole) = caps.get(0) else {
                    break;
                };
                let start = pos + whole.start();

                match extract(whole, &caps) {
                    Extraction::Ref(reference, end) => {
                        if start > last {
                            out.push(Segment::Text(text[last..start].to_string()));
                        }
                        out.push(Segment::Ref(self.intern(reference)));
                        last = pos + end;
                        pos = last;
                    }
                    Extraction::Skip(resume) => pos += resume.max(whole.start() + 1),
                }
            }

            if last < text.len() {
                out.push(Segment::Text(text[last..].to_string()));
            }
        }

        out
    }
}

fn parse_aggregate(name: &str, content: &str) -> Option<Aggregate> {
    match name.to_uppercase().as_str() {
        "COUNT" => parse_count(content),
        "LOOKUP" => match split_args(content).as_slice() {
            [sheet, get_column, filter_column, filter_value] => Some(Aggregate::Lookup {
                sheet: sheet.clone(),
                get_column: get_column.clone(),
                filter_column: filter_column.clone(),
                filter_value: filter_value.clone(),
            }),
            _ => None,
        },
        "HAS_VALUE" => match split_args(content).as_slice() {
            [sheet, column, value] => Some(Aggregate::HasValue {
                sheet: sheet.clone(),
                column: column.clone(),
                value: value.clone(),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn parse_count(content: &str) -> Option<Aggregate> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(field) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        if !field.contains(']') {
            return Some(Aggregate::CountField(field.to_string()));
        }
    }

    let unquoted = unquote(trimmed);
    if unquoted.len() == trimmed.len() {
        // Unquoted `Sheet.Value`; a numeric prefix is a decimal literal
        if let Some((sheet, value)) = trimmed.split_once('.') {
            let sheet = sheet.trim();
            if !sheet.is_empty()
                && !is_numeric_token(sheet)
                && sheet.chars().all(|c| c.is_alphanumeric() || c == '_')
            {
                return Some(Aggregate::CountLiteral {
                    sheet: Some(sheet.to_string()),
                    literal: unquote(value.trim()).to_string(),
                });
            }
        }
    }

    Some(Aggregate::CountLiteral {
        sheet: None,
        literal: unquoted.to_string(),
    })
}

fn split_args(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(|arg| unquote(arg.trim()).trim().to_string())
        .collect()
}

/// Strip one pair of matching surrounding quotes
fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// A token made only of digits is a number, never a sheet name
fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn trim_operator_words(field: &str) -> &str {
    let mut end = 0;
    for (offset, word) in word_offsets(field) {
        if offset > 0
            && field[..offset].ends_with(' ')
            && OPERATOR_WORDS.contains(&word.to_lowercase().as_str())
        {
            break;
        }
        end = offset + word.len();
    }
    field[..end].trim_end()
}

/// Words of a field name with their byte offsets; spaces and hyphens separate
fn word_offsets(field: &str) -> impl Iterator<Item = (usize, &str)> {
    field
        .split(|c: char| c == ' ' || c == '-')
        .scan(0usize, |offset, word| {
            let start = *offset;
            *offset += word.len() + 1;
            Some((start, word))
        })
}

/// Split quoted string literals out of text segments
///
/// Quotes inside `[...]` belong to a field name. An unterminated quote is
/// left as text.
fn split_literals(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());

    for segment in segments {
        let Segment::Text(text) = segment else {
            out.push(segment);
            continue;
        };

        let mut last = 0;
        let mut depth = 0usize;
        let mut chars = text.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '"' | '\'' if depth == 0 => {
                    let Some(len) = text[i + 1..].find(c) else {
                        break;
                    };
                    if i > last {
                        out.push(Segment::Text(text[last..i].to_string()));
                    }
                    let end = i + 1 + len;
                    out.push(Segment::Literal(text[i + 1..end].to_string()));
                    last = end + 1;
                    // Skip to the closing quote
                    for (j, _) in chars.by_ref() {
                        if j == end {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }

        if last < text.len() {
            out.push(Segment::Text(text[last..].to_string()));
        }
    }

    out
}

fn merge_text(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match (out.last_mut(), segment) {
            (Some(Segment::Text(prev)), Segment::Text(text)) => prev.push_str(&text),
            (_, segment) => out.push(segment),
        }
    }
    out
}

/// Reject unmatched `[]` or `()` outside string literals
fn check_balance(formula: &str) -> FormulaResult<()> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut quote: Option<char> = None;
    let mut in_brackets = false;

    for (i, c) in formula.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if !in_brackets => quote = Some(c),
            '[' | '(' => {
                stack.push((c, i));
                in_brackets = stack.iter().any(|(open, _)| *open == '[');
            }
            ']' | ')' => {
                let expected = if c == ']' { '[' } else { '(' };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(FormulaError::Parse(format!(
                            "'{}' at position {} closed by '{}' at position {}",
                            open, at, c, i
                        )))
                    }
                    None => {
                        return Err(FormulaError::Parse(format!(
                            "Unmatched '{}' at position {}",
                            c, i
                        )))
                    }
                }
                in_brackets = stack.iter().any(|(open, _)| *open == '[');
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, at)) => Err(FormulaError::Parse(format!(
            "Unclosed '{}' at position {}",
            open, at
        ))),
        None => Ok(()),
    }
}
