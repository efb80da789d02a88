//! CSS-like selector subset for element matching
//!
//! Supports what dropdown hosts need to describe "don't treat clicks in here
//! as outside": selector lists, compound selectors and the descendant
//! combinator.
//!
//! # Supported Syntax
//!
//! - Type and universal selectors: `ul`, `*`
//! - ID selectors: `#menu`
//! - Class selectors: `.submenu`
//! - Attribute selectors: `[data-popover]`, `[role=menu]`, `[role="menu"]`
//! - Descendant combinator: `.menu .item`
//! - Selector lists: `.submenu, [data-popover]`
//!
//! ```ignore
//! use perch_core::selector::Selector;
//!
//! let selector = Selector::parse(".cascade-panel, [data-nested]")?;
//! assert!(doc.closest(target, &selector).is_some());
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
    Finish, IResult,
};
use smallvec::SmallVec;

use crate::error::DomError;

/// Element view used for selector matching
///
/// Implemented by the document model; kept as a trait so the matcher does not
/// depend on how elements are stored.
pub trait SelectorSubject: Sized {
    fn tag_name(&self) -> &str;
    fn element_id(&self) -> Option<&str>;
    fn has_class(&self, class: &str) -> bool;
    fn attribute(&self, name: &str) -> Option<&str>;
    fn parent_element(&self) -> Option<Self>;
}

/// A parsed selector list
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    source: String,
    alternatives: Vec<ComplexSelector>,
}

/// Compound selectors joined by descendant combinators, left to right
#[derive(Clone, Debug, PartialEq)]
struct ComplexSelector {
    compounds: Vec<CompoundSelector>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: SmallVec<[String; 2]>,
    attributes: SmallVec<[AttributeSelector; 1]>,
}

#[derive(Clone, Debug, PartialEq)]
struct AttributeSelector {
    name: String,
    value: Option<String>,
}

enum SimpleSelector<'a> {
    Id(&'a str),
    Class(&'a str),
    Attribute(&'a str, Option<&'a str>),
}

impl Selector {
    /// Parse selector text
    pub fn parse(source: &str) -> Result<Self, DomError> {
        match all_consuming(delimited(multispace0, selector_list, multispace0))(source).finish() {
            Ok((_, alternatives)) => Ok(Self {
                source: source.trim().to_string(),
                alternatives,
            }),
            Err(err) => {
                let offset = source.len() - err.input.len();
                Err(DomError::InvalidSelector {
                    selector: source.to_string(),
                    reason: format!("unexpected input at offset {offset} ({:?})", err.code),
                })
            }
        }
    }

    /// The trimmed source text this selector was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether an element matches any alternative in the list
    pub fn matches<S: SelectorSubject>(&self, subject: &S) -> bool {
        self.alternatives.iter().any(|complex| complex.matches(subject))
    }
}

impl ComplexSelector {
    fn matches<S: SelectorSubject>(&self, subject: &S) -> bool {
        let Some((last, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(subject) {
            return false;
        }

        // Descendant combinators only: nearest matching ancestor is always a valid pick
        let mut cursor = subject.parent_element();
        for compound in rest.iter().rev() {
            loop {
                let Some(ancestor) = cursor else {
                    return false;
                };
                cursor = ancestor.parent_element();
                if compound.matches(&ancestor) {
                    break;
                }
            }
        }
        true
    }
}

impl CompoundSelector {
    fn matches<S: SelectorSubject>(&self, subject: &S) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(subject.tag_name()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if subject.element_id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| subject.has_class(class)) {
            return false;
        }
        self.attributes.iter().all(|attr| match (&attr.value, subject.attribute(&attr.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// Parse an identifier (alphanumeric, hyphen, underscore)
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

/// Parse an attribute value: bare identifier or single/double quoted string
fn attribute_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        identifier,
    ))(input)
}

/// Parse `[name]` or `[name=value]`
fn attribute_selector(input: &str) -> IResult<&str, SimpleSelector<'_>> {
    let (input, _) = char('[')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = opt(preceded(pair(char('='), multispace0), attribute_value))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, SimpleSelector::Attribute(name, value)))
}

fn simple_selector(input: &str) -> IResult<&str, SimpleSelector<'_>> {
    alt((
        map(preceded(char('#'), identifier), SimpleSelector::Id),
        map(preceded(char('.'), identifier), SimpleSelector::Class),
        attribute_selector,
    ))(input)
}

fn compound_selector(input: &str) -> IResult<&str, CompoundSelector> {
    let (input, type_selector) = opt(alt((tag("*"), identifier)))(input)?;
    let (input, parts) = many0(simple_selector)(input)?;

    if type_selector.is_none() && parts.is_empty() {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify)));
    }

    let mut compound = CompoundSelector {
        tag: type_selector.map(str::to_string),
        ..CompoundSelector::default()
    };
    for part in parts {
        match part {
            SimpleSelector::Id(id) => compound.id = Some(id.to_string()),
            SimpleSelector::Class(class) => compound.classes.push(class.to_string()),
            SimpleSelector::Attribute(name, value) => compound.attributes.push(AttributeSelector {
                name: name.to_string(),
                value: value.map(str::to_string),
            }),
        }
    }
    Ok((input, compound))
}

fn complex_selector(input: &str) -> IResult<&str, ComplexSelector> {
    map(separated_list1(multispace1, compound_selector), |compounds| {
        ComplexSelector { compounds }
    })(input)
}

fn selector_list(input: &str) -> IResult<&str, Vec<ComplexSelector>> {
    separated_list1(delimited(multispace0, char(','), multispace0), complex_selector)(input)
}
