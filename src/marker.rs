//! Marker and relation-rule configuration
//!
//! Markers and rules are declared by the page as elements carrying `data-*`
//! attributes (`.marker[data-s][data-res]...`, `.relation[data-b][data-d][data-r]`).
//! They are read once and never mutated by the engine.

use std::fmt;
use std::str::FromStr;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::attr::{Attrs, AttrsExt};
use crate::node::{Document, Element};

/// Marker code with its trailing `_<variant>` suffix stripped
///
/// Only an all-digit suffix counts as a variant, so `NAMED_ENTITY` keeps
/// its underscore while `PER_12` groups under `PER`.
pub fn base_code(code: &str) -> &str {
    match code.rsplit_once('_') {
        Some((base, variant))
            if !base.is_empty() && !variant.is_empty() && variant.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => code,
    }
}

// =============================================================================
// Restriction
// =============================================================================

/// Comparison of a restriction clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionOp {
    /// `ge`: at least
    Ge,
    /// `gs`: more than
    Gs,
    /// `le`: at most
    Le,
    /// `ls`: fewer than
    Ls,
    /// `eq`: exactly
    Eq,
}

impl RestrictionOp {
    /// Check a count against a threshold
    pub fn holds(self, count: usize, value: usize) -> bool {
        match self {
            Self::Ge => count >= value,
            Self::Gs => count > value,
            Self::Le => count <= value,
            Self::Ls => count < value,
            Self::Eq => count == value,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::Ge => "ge",
            Self::Gs => "gs",
            Self::Le => "le",
            Self::Ls => "ls",
            Self::Eq => "eq",
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Self::Ge => "at least",
            Self::Gs => "more than",
            Self::Le => "at most",
            Self::Ls => "fewer than",
            Self::Eq => "exactly",
        }
    }
}

/// How an unmet restriction is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// `s`: the action is blocked
    #[serde(rename = "s")]
    Strict,
    /// `i`: the user is asked whether to proceed anyway
    #[serde(rename = "i")]
    Info,
}

/// One count restriction, written `{op}{N}{severity}` (e.g. `ge2s`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Restriction {
    pub op: RestrictionOp,
    pub value: usize,
    pub severity: Severity,
}

impl Restriction {
    /// Check if `count` satisfies the restriction
    pub fn holds(&self, count: usize) -> bool {
        self.op.holds(count, self.value)
    }

    /// Human-readable requirement, e.g. `at least 2`
    pub fn requirement(&self) -> String {
        format!("{} {}", self.op.phrase(), self.value)
    }

    /// Parse `&`-joined clauses, skipping empty ones
    pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
        s.split('&')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for Restriction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid restriction: {s}");
        let s = s.trim();
        if !s.is_ascii() || s.len() < 4 {
            return Err(invalid());
        }
        let (op, rest) = s.split_at(2);
        let (value, severity) = rest.split_at(rest.len() - 1);
        let op = match op {
            "ge" => RestrictionOp::Ge,
            "gs" => RestrictionOp::Gs,
            "le" => RestrictionOp::Le,
            "ls" => RestrictionOp::Ls,
            "eq" => RestrictionOp::Eq,
            _ => return Err(invalid()),
        };
        let severity = match severity {
            "s" => Severity::Strict,
            "i" => Severity::Info,
            _ => return Err(invalid()),
        };
        let value = value.parse().map_err(|_| invalid())?;
        Ok(Self { op, value, severity })
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Strict => 's',
            Severity::Info => 'i',
        };
        write!(f, "{}{}{}", self.op.code(), self.value, severity)
    }
}

// =============================================================================
// Marker
// =============================================================================

/// What a marker labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// An arbitrary substring of the document
    #[default]
    Span,
    /// The whole input, selected as a unit
    Text,
}

/// A configured annotation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Short code including the variant suffix (`data-s`)
    pub code: CompactString,
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    #[serde(default)]
    pub scope: Scope,
    /// May be submitted without being part of a relation
    #[serde(default)]
    pub independent: bool,
    #[serde(default)]
    pub shortcut: Option<String>,
    /// Maximum labels of this marker per input (`data-mmpi`)
    #[serde(default)]
    pub max_per_input: Option<usize>,
    /// Hash of the submitted label being re-marked in edit mode (`data-h`)
    #[serde(default)]
    pub hash: Option<String>,
    /// Extra values stored with every label of this marker (`data-meta`)
    #[serde(default)]
    pub meta: FxHashMap<CompactString, String>,
}

impl Marker {
    /// Create a span marker with no restrictions
    pub fn new(code: impl Into<CompactString>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            color: None,
            text_color: None,
            restrictions: Vec::new(),
            scope: Scope::Span,
            independent: false,
            shortcut: None,
            max_per_input: None,
            hash: None,
            meta: FxHashMap::default(),
        }
    }

    /// Read a marker from its declaring element's attributes
    ///
    /// Malformed restriction clauses are dropped with a warning.
    pub fn from_attrs(attrs: &Attrs, name: impl Into<String>) -> Option<Self> {
        let code = attrs.data("s")?;
        let restrictions = match attrs.data("res").map(Restriction::parse_list) {
            Some(Ok(list)) => list,
            Some(Err(err)) => {
                tracing::warn!(marker = code, "{err}");
                Vec::new()
            }
            None => Vec::new(),
        };
        Some(Self {
            code: code.into(),
            name: name.into(),
            color: attrs.data("color").map(str::to_owned),
            text_color: attrs.data("text-color").map(str::to_owned),
            restrictions,
            scope: match attrs.data("scope") {
                Some("text") => Scope::Text,
                _ => Scope::Span,
            },
            independent: attrs.flag("data-indep"),
            shortcut: attrs.data("shortcut").filter(|s| !s.is_empty()).map(str::to_owned),
            max_per_input: attrs.data("mmpi").and_then(|v| v.trim().parse().ok()).filter(|&n| n > 0),
            hash: attrs.data("h").filter(|h| !h.is_empty()).map(str::to_owned),
            meta: attrs.data("meta").map(|raw| parse_meta(code, raw)).unwrap_or_default(),
        })
    }

    /// Add a restriction (builder)
    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    /// Set the independence flag (builder)
    pub fn independent(mut self, independent: bool) -> Self {
        self.independent = independent;
        self
    }

    /// Set the per-input maximum (builder)
    pub fn with_max(mut self, max: usize) -> Self {
        self.max_per_input = Some(max);
        self
    }

    /// Attach the hash of a submitted label (builder)
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Add an extra value stored with each label (builder)
    pub fn with_meta(mut self, key: impl Into<CompactString>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Set the colors (builder)
    pub fn with_colors(mut self, color: impl Into<String>, text_color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self.text_color = Some(text_color.into());
        self
    }

    /// Code with the variant suffix stripped
    pub fn base_code(&self) -> &str {
        base_code(&self.code)
    }
}

/// Parse a `data-meta` JSON object; non-string values keep their JSON text
fn parse_meta(code: &str, raw: &str) -> FxHashMap<CompactString, String> {
    match serde_json::from_str::<FxHashMap<CompactString, serde_json::Value>>(raw) {
        Ok(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect(),
        Err(err) => {
            tracing::warn!(marker = code, %err, "ignoring malformed marker metadata");
            FxHashMap::default()
        }
    }
}

// =============================================================================
// RelationRule
// =============================================================================

/// Edge direction of a relation rule (`data-d`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// `0`: from the first type to the second
    #[default]
    #[serde(rename = "0")]
    Forward,
    /// `1`: from the second type to the first
    #[serde(rename = "1")]
    Backward,
    /// `2`: undirected
    #[serde(rename = "2")]
    Bidirectional,
}

impl Direction {
    /// Parse the `data-d` value
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(Self::Forward),
            "1" => Some(Self::Backward),
            "2" => Some(Self::Bidirectional),
            _ => None,
        }
    }

    #[inline]
    pub fn is_bidirectional(self) -> bool {
        matches!(self, Self::Bidirectional)
    }
}

/// A pair of marker base codes a rule connects
pub type TypePair = (CompactString, CompactString);

/// A relation rule: which marker pairs it links and in which direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRule {
    /// Rule identifier (`data-r`)
    pub id: CompactString,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Allowed type pairs (`data-b`, `a-:-b|c-:-d`)
    pub between: Vec<TypePair>,
    #[serde(default)]
    pub direction: Direction,
}

impl RelationRule {
    /// Create a rule
    pub fn new(id: impl Into<CompactString>, between: &[(&str, &str)], direction: Direction) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            between: between
                .iter()
                .map(|(a, b)| (CompactString::from(*a), CompactString::from(*b)))
                .collect(),
            direction,
        }
    }

    /// Read a rule from its declaring element's attributes
    pub fn from_attrs(attrs: &Attrs, name: impl Into<String>) -> Option<Self> {
        let id = attrs.data("r")?;
        let between = parse_between(attrs.data("b")?);
        if between.is_empty() {
            return None;
        }
        Some(Self {
            id: id.into(),
            name: name.into(),
            between,
            direction: attrs.data("d").and_then(Direction::from_code).unwrap_or_default(),
        })
    }

    /// Set the display name (builder)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check if the rule connects base codes `a` and `b` (order-insensitive)
    pub fn connects(&self, a: &str, b: &str) -> bool {
        self.between
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Check if a marker base code takes part in any pair of this rule
    pub fn involves(&self, code: &str) -> bool {
        self.between.iter().any(|(x, y)| x == code || y == code)
    }
}

/// Parse `a-:-b|c-:-d` into type pairs, skipping malformed entries
pub fn parse_between(value: &str) -> Vec<TypePair> {
    value
        .split('|')
        .filter_map(|pair| {
            let (a, b) = pair.split_once("-:-")?;
            let (a, b) = (a.trim(), b.trim());
            (!a.is_empty() && !b.is_empty()).then(|| (base_code(a).into(), base_code(b).into()))
        })
        .collect()
}

// =============================================================================
// MarkerSet
// =============================================================================

/// All markers and relation rules of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerSet {
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub rules: Vec<RelationRule>,
}

impl MarkerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker (builder)
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Add a relation rule (builder)
    pub fn rule(mut self, rule: RelationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Discover `.marker` and `.relation` elements in a page document
    pub fn from_document(doc: &Document) -> Self {
        let mut set = Self::new();
        for elem in doc.iter_elements() {
            if elem.attrs.has_class("marker") {
                if let Some(marker) = Marker::from_attrs(&elem.attrs, declared_name(elem)) {
                    set.markers.push(marker);
                }
            } else if elem.attrs.has_class("relation")
                && let Some(rule) = RelationRule::from_attrs(&elem.attrs, declared_name(elem))
            {
                set.rules.push(rule);
            }
        }
        tracing::debug!(markers = set.markers.len(), rules = set.rules.len(), "discovered marker set");
        set
    }

    /// Marker by exact code
    pub fn get(&self, code: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.code == code)
    }

    /// Marker by exact code, falling back to the first marker sharing its base code
    pub fn resolve(&self, code: &str) -> Option<&Marker> {
        self.get(code)
            .or_else(|| self.markers.iter().find(|m| m.base_code() == base_code(code)))
    }

    /// Relation rule by identifier
    pub fn rule_by_id(&self, id: &str) -> Option<&RelationRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Markers that label spans
    pub fn span_markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(|m| m.scope == Scope::Span)
    }
}

/// Name of a marker or rule: the text of a nested `.name` element, else the element text
fn declared_name(elem: &Element) -> String {
    elem.children_elements()
        .find(|child| child.attrs.has_class("name"))
        .unwrap_or(elem)
        .text_content()
        .trim()
        .to_string()
}
