//! Non-span inputs: radio groups, checkboxes, free text, numbers and ranges
//!
//! Values are kept per field with the optional `data-h` hash the server
//! uses to tell an edited value from a new one. Serialization merges
//! same-named radios and checkboxes into separator-joined strings.

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::attr::AttrsExt;
use crate::node::{Document, Element};

/// Name suffix of a radio group holding an outer category of another group
pub const OUTER_CATEGORY_SUFFIX: &str = "_ocat";

// =============================================================================
// Fields
// =============================================================================

/// Input control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Radio,
    Checkbox,
    /// `<input type="text">`
    ShortText,
    /// `<textarea>`
    LongText,
    Number,
    Range,
}

impl FieldKind {
    /// Kinds whose value is an option chosen among siblings
    #[inline]
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Radio | Self::Checkbox)
    }

    fn from_input(elem: &Element) -> Option<Self> {
        match elem.tag.as_str() {
            "textarea" => Some(Self::LongText),
            "input" => match elem.get_attr("type").unwrap_or("text") {
                "radio" => Some(Self::Radio),
                "checkbox" => Some(Self::Checkbox),
                "number" => Some(Self::Number),
                "range" => Some(Self::Range),
                "text" => Some(Self::ShortText),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One input control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Input name (a marker code)
    pub name: CompactString,
    pub kind: FieldKind,
    /// Option value for choices, current value otherwise
    pub value: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hash: Option<String>,
}

impl FormField {
    pub fn new(name: impl Into<CompactString>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: String::new(),
            checked: false,
            required: false,
            hash: None,
        }
    }

    /// Choice option with a fixed value
    pub fn option(name: impl Into<CompactString>, kind: FieldKind, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::new(name, kind)
        }
    }

    /// Mark the field as required (builder)
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn is_filled(&self) -> bool {
        if self.kind.is_choice() {
            self.checked
        } else {
            !self.value.trim().is_empty()
        }
    }
}

/// A serialized form value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

pub type FieldValues = FxHashMap<CompactString, FieldValue>;

/// A text-scope marker chosen for the input as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerChoice {
    pub code: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

// =============================================================================
// FormState
// =============================================================================

/// All input controls of the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    fields: Vec<FormField>,
    markers: Vec<MarkerChoice>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder)
    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn push(&mut self, field: FormField) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Discover named `input` and `textarea` controls in a page document
    pub fn from_document(doc: &Document) -> Self {
        let mut state = Self::new();
        for elem in doc.iter_elements() {
            let (Some(kind), Some(name)) = (FieldKind::from_input(elem), elem.get_attr("name")) else {
                continue;
            };
            let mut field = FormField::option(name, kind, elem.get_attr("value").unwrap_or_default());
            if kind == FieldKind::LongText {
                field.value = elem.text_content();
            }
            field.checked = elem.has_attr("checked");
            field.required = elem.has_attr("required");
            field.hash = elem.attrs.data("h").map(str::to_owned);
            state.fields.push(field);
        }
        tracing::debug!(fields = state.fields.len(), "discovered form fields");
        state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the value of a text, number or range field
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name && !f.kind.is_choice()) {
            Some(field) => {
                field.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Check a radio or checkbox option; checking a radio unchecks its group
    pub fn check(&mut self, name: &str, value: &str) -> bool {
        let Some(kind) = self
            .fields
            .iter()
            .find(|f| f.name == name && f.value == value && f.kind.is_choice())
            .map(|f| f.kind)
        else {
            return false;
        };
        for field in self.fields.iter_mut().filter(|f| f.name == name) {
            if field.value == value {
                field.checked = true;
            } else if kind == FieldKind::Radio {
                field.checked = false;
            }
        }
        true
    }

    /// Uncheck a checkbox option
    pub fn uncheck(&mut self, name: &str, value: &str) {
        for field in self.fields.iter_mut().filter(|f| f.name == name && f.value == value) {
            field.checked = false;
        }
    }

    /// Apply a previously submitted value and its hash
    ///
    /// Checkbox contents are separator-joined lists of option values.
    pub fn restore(&mut self, name: &str, content: &str, hash: Option<&str>, separator: &str) -> bool {
        let Some(kind) = self.fields.iter().find(|f| f.name == name).map(|f| f.kind) else {
            return false;
        };
        let applied = match kind {
            FieldKind::Radio => self.check(name, content),
            FieldKind::Checkbox => content
                .split(separator)
                .fold(false, |any, value| self.check(name, value) || any),
            _ => self.set_value(name, content),
        };
        if applied {
            for field in self.fields.iter_mut().filter(|f| f.name == name) {
                field.hash = hash.map(str::to_owned);
            }
        }
        applied
    }

    /// Select or deselect a text-scope marker; returns whether it is selected
    pub fn toggle_marker(&mut self, code: &str) -> bool {
        if let Some(pos) = self.markers.iter().position(|m| m.code == code) {
            self.markers.remove(pos);
            false
        } else {
            self.select_marker(code, None);
            true
        }
    }

    /// Select a text-scope marker, keeping its server hash
    pub fn select_marker(&mut self, code: &str, hash: Option<&str>) {
        match self.markers.iter_mut().find(|m| m.code == code) {
            Some(choice) => choice.hash = hash.map(str::to_owned),
            None => self.markers.push(MarkerChoice {
                code: code.into(),
                hash: hash.map(str::to_owned),
            }),
        }
    }

    /// Selected text-scope markers
    pub fn selected_markers(&self) -> &[MarkerChoice] {
        &self.markers
    }

    /// Clear every value, check state and hash
    pub fn reset(&mut self) {
        self.markers.clear();
        for field in &mut self.fields {
            field.checked = false;
            field.hash = None;
            if !field.kind.is_choice() {
                field.value.clear();
            }
        }
    }

    /// Name of the first required field left empty
    pub fn missing_required(&self) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .find(|f| !self.fields.iter().any(|g| g.name == f.name && g.is_filled()))
            .map(|f| f.name.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Non-empty values of one scalar kind
    pub fn values(&self, kind: FieldKind) -> FieldValues {
        self.fields
            .iter()
            .filter(|f| f.kind == kind && !f.value.is_empty())
            .map(|f| {
                let value = FieldValue {
                    value: f.value.clone(),
                    hash: f.hash.clone(),
                };
                (f.name.clone(), value)
            })
            .collect()
    }

    /// Checked radios; an `_ocat` group is appended to its base group
    pub fn radio(&self, separator: &str) -> FieldValues {
        let checked = || self.fields.iter().filter(|f| f.kind == FieldKind::Radio && f.checked);

        let mut values = FieldValues::default();
        for field in checked().filter(|f| !f.name.ends_with(OUTER_CATEGORY_SUFFIX)) {
            values.insert(
                field.name.clone(),
                FieldValue {
                    value: field.value.clone(),
                    hash: field.hash.clone(),
                },
            );
        }
        for field in checked() {
            let Some(base) = field.name.strip_suffix(OUTER_CATEGORY_SUFFIX) else {
                continue;
            };
            let entry = values.entry(base.into()).or_insert_with(|| FieldValue {
                value: String::new(),
                hash: field.hash.clone(),
            });
            entry.value.push_str(separator);
            entry.value.push_str(&field.value);
        }
        values
    }

    /// Checked checkboxes, joined per name in declaration order
    pub fn checkboxes(&self, separator: &str) -> FieldValues {
        let mut values = FieldValues::default();
        for field in self.fields.iter().filter(|f| f.kind == FieldKind::Checkbox && f.checked) {
            values
                .entry(field.name.clone())
                .and_modify(|v| {
                    v.value.push_str(separator);
                    v.value.push_str(&field.value);
                })
                .or_insert_with(|| FieldValue {
                    value: field.value.clone(),
                    hash: field.hash.clone(),
                });
        }
        values
    }
}
