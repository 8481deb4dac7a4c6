//! Plugins and session events
//!
//! A plugin attaches one value to labels or relations (a comment, a slider
//! score). Values live in the [`PluginRegistry`] under `l<id>`/`r<id>`
//! storage keys and are read back when the submission payload is built.
//!
//! [`EventBus`] is the typed replacement for page-wide custom events:
//! subscribers register per [`EventKind`] and receive every published event
//! of that kind.

use std::fmt;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::id::{LabelId, RelationId, StorageKey};
use crate::marker::base_code;
use crate::relation::Remap;

// =============================================================================
// Plugin
// =============================================================================

/// What a plugin value can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// A label and its marker code
    Label(LabelId, &'a str),
    Relation(RelationId),
}

impl Target<'_> {
    pub fn key(&self) -> StorageKey {
        match *self {
            Self::Label(id, _) => StorageKey::Label(id),
            Self::Relation(id) => StorageKey::Relation(id),
        }
    }
}

/// Static capability interface of a plugin
pub trait Plugin: Send + Sync {
    /// Name under which values appear in `extra`
    fn name(&self) -> &str;

    /// Check if the plugin offers a value for the target
    fn applies_to(&self, target: Target<'_>) -> bool;

    /// Validate and normalize a value before it is stored
    fn normalize(&self, value: &str) -> Option<String> {
        Some(value.to_owned())
    }

    /// Called after a value was stored
    fn on_value_changed(&self, _key: StorageKey, _value: &str) {}
}

/// Free-text comment on any label or relation
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentPlugin;

impl Plugin for CommentPlugin {
    fn name(&self) -> &str {
        "comment"
    }

    fn applies_to(&self, _target: Target<'_>) -> bool {
        true
    }

    fn normalize(&self, value: &str) -> Option<String> {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_owned())
    }
}

/// Numeric score on labels of selected markers
#[derive(Debug, Clone, PartialEq)]
pub struct SliderPlugin {
    pub name: CompactString,
    pub min: f64,
    pub max: f64,
    /// Marker base codes the slider applies to; empty means all labels
    pub markers: Vec<CompactString>,
}

impl SliderPlugin {
    pub fn new(name: impl Into<CompactString>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            markers: Vec::new(),
        }
    }

    /// Restrict to a marker (builder)
    pub fn for_marker(mut self, code: impl Into<CompactString>) -> Self {
        self.markers.push(code.into());
        self
    }
}

impl Plugin for SliderPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, target: Target<'_>) -> bool {
        match target {
            Target::Label(_, code) => {
                self.markers.is_empty() || self.markers.iter().any(|m| m == base_code(code))
            }
            Target::Relation(_) => false,
        }
    }

    /// Values are clamped into `min..=max`
    fn normalize(&self, value: &str) -> Option<String> {
        let number: f64 = value.trim().parse().ok()?;
        number.is_finite().then(|| number.clamp(self.min, self.max).to_string())
    }
}

// =============================================================================
// PluginRegistry
// =============================================================================

/// Registered plugins and their stored values
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    values: FxHashMap<StorageKey, FxHashMap<CompactString, String>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("values", &self.values)
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin (builder)
    pub fn with(mut self, plugin: impl Plugin + 'static) -> Self {
        self.register(plugin);
        self
    }

    pub fn register(&mut self, plugin: impl Plugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    pub fn plugin(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.iter().find(|p| p.name() == name).map(|p| p.as_ref())
    }

    /// Plugins offering a value for the target
    pub fn applicable<'a>(&'a self, target: Target<'a>) -> impl Iterator<Item = &'a dyn Plugin> + 'a {
        self.plugins
            .iter()
            .filter(move |p| p.applies_to(target))
            .map(|p| p.as_ref())
    }

    /// Store a plugin value; returns `false` if the plugin is unknown, does
    /// not apply, or rejects the value
    pub fn set_value(&mut self, plugin: &str, target: Target<'_>, value: &str) -> bool {
        let Some(p) = self.plugins.iter().find(|p| p.name() == plugin) else {
            return false;
        };
        if !p.applies_to(target) {
            return false;
        }
        let Some(value) = p.normalize(value) else {
            return false;
        };
        let key = target.key();
        p.on_value_changed(key, &value);
        self.values.entry(key).or_default().insert(plugin.into(), value);
        true
    }

    /// Store a value without validation (restoration)
    pub fn restore_value(&mut self, key: StorageKey, plugin: &str, value: impl Into<String>) {
        self.values.entry(key).or_default().insert(plugin.into(), value.into());
    }

    pub fn value(&self, key: StorageKey, plugin: &str) -> Option<&str> {
        self.values.get(&key)?.get(plugin).map(String::as_str)
    }

    /// All values for one key (`extra` of a chunk or relation)
    pub fn values_for(&self, key: StorageKey) -> FxHashMap<CompactString, String> {
        self.values.get(&key).cloned().unwrap_or_default()
    }

    /// Forget a label's or relation's values
    pub fn remove(&mut self, key: StorageKey) {
        self.values.remove(&key);
    }

    /// Move relation values after renumbering
    pub fn remap_relations(&mut self, remap: &Remap) {
        if remap.is_identity() {
            return;
        }
        let keys: Vec<StorageKey> = self.values.keys().copied().collect();
        let mut moved = Vec::new();
        for key in keys {
            let StorageKey::Relation(id) = key else { continue };
            let Some(values) = self.values.remove(&key) else { continue };
            if let Some(new) = remap.get(id) {
                moved.push((StorageKey::Relation(new), values));
            }
        }
        self.values.extend(moved);
    }

    /// Drop every stored value
    pub fn clear_values(&mut self) {
        self.values.clear();
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Kinds of session event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LabelMarked,
    LabelDeleted,
    RelationChanged,
    Submitted,
    Restored,
    TextLoaded,
}

/// A published event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub label: Option<LabelId>,
    pub relation: Option<RelationId>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            label: None,
            relation: None,
        }
    }

    pub fn with_label(mut self, id: LabelId) -> Self {
        self.label = Some(id);
        self
    }

    pub fn with_relation(mut self, id: RelationId) -> Self {
        self.relation = Some(id);
        self
    }
}

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

/// Typed publish/subscribe channel
#[derive(Default)]
pub struct EventBus {
    handlers: FxHashMap<EventKind, Vec<Handler>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: FxHashMap<_, _> = self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Deliver an event, returning the number of handlers called
    pub fn publish(&self, event: &Event) -> usize {
        let handlers = self.handlers.get(&event.kind).map_or(&[][..], Vec::as_slice);
        for handler in handlers {
            handler(event);
        }
        tracing::trace!(kind = ?event.kind, handlers = handlers.len(), "published event");
        handlers.len()
    }
}
