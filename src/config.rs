//! Session configuration
//!
//! Plain structs with named presets. Pages embed these as JSON, so every
//! type here derives `Deserialize` with the short codes the markup uses
//! (`hl`/`und`, `g`/`l`, `r`/`e`/`rev`).

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// How labels are drawn, which decides nesting line heights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayType {
    /// Background highlight
    #[default]
    #[serde(rename = "hl")]
    Highlight,
    /// Colored underline
    #[serde(rename = "und")]
    Underline,
}

/// Relation graph layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Layout {
    /// Force-directed graph
    #[default]
    #[serde(rename = "g")]
    Force,
    /// Vertical list
    #[serde(rename = "l")]
    List,
}

/// Annotation mode sent with every submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    #[serde(rename = "r")]
    Regular,
    #[serde(rename = "e")]
    Edit,
    #[serde(rename = "rev")]
    Review,
}

impl Mode {
    /// Wire code
    pub fn code(self) -> &'static str {
        match self {
            Self::Regular => "r",
            Self::Edit => "e",
            Self::Review => "rev",
        }
    }

    /// Edit and review modes carry pagination parameters
    pub fn is_regular(self) -> bool {
        matches!(self, Self::Regular)
    }
}

// =============================================================================
// NestingStyle
// =============================================================================

/// Padding and line-height rules for visually stacked labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestingStyle {
    /// Padding of an outermost label, in pixels
    pub base_padding: u32,
    /// Extra padding per nesting level
    pub step: u32,
    /// Line height of unlabeled text
    pub base_line_height: u32,
}

impl NestingStyle {
    /// Default stacking: `4 + 4 * depth` padding
    pub const DEFAULT: Self = Self {
        base_padding: 4,
        step: 4,
        base_line_height: 20,
    };

    /// Padding for a label with `depth` enclosing labels
    #[inline]
    pub fn padding(&self, depth: usize) -> u32 {
        self.base_padding + self.step * depth as u32
    }

    /// Line height for the deepest label of a stack whose top has `depth`
    ///
    /// Highlights need room for top and bottom padding; underlines stack
    /// one extra rule below the text.
    pub fn line_height(&self, depth: usize, display: DisplayType) -> u32 {
        let padding = self.padding(depth);
        match display {
            DisplayType::Highlight => self.base_line_height + 2 * padding,
            DisplayType::Underline => self.base_line_height + 3 * padding,
        }
    }
}

impl Default for NestingStyle {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// SessionConfig
// =============================================================================

/// Configuration of one annotation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Label drawing style
    pub display_type: DisplayType,
    /// Relation graph layout
    pub layout: Layout,
    /// Annotation mode
    pub mode: Mode,
    /// Whether new labels get a delete button
    pub delete_buttons: bool,
    /// Separator for merged `_ocat` radio values
    pub radio_separator: CompactString,
    /// Separator for merged checkbox values
    pub checkbox_separator: CompactString,
    /// Label stacking
    pub nesting: NestingStyle,
}

impl SessionConfig {
    /// Regular annotation
    pub const REGULAR: Self = Self::preset(Mode::Regular, true);

    /// Editing a previously submitted batch
    pub const EDIT: Self = Self::preset(Mode::Edit, true);

    /// Reviewing someone else's batch (no deletion affordance)
    pub const REVIEW: Self = Self::preset(Mode::Review, false);

    const fn preset(mode: Mode, delete_buttons: bool) -> Self {
        Self {
            display_type: DisplayType::Highlight,
            layout: Layout::Force,
            mode,
            delete_buttons,
            radio_separator: CompactString::const_new("||"),
            checkbox_separator: CompactString::const_new("||"),
            nesting: NestingStyle::DEFAULT,
        }
    }

    /// Set the display type
    pub fn with_display_type(mut self, display_type: DisplayType) -> Self {
        self.display_type = display_type;
        self
    }

    /// Set the relation layout
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::REGULAR
    }
}
