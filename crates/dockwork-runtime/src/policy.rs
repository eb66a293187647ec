//! Tunable dock manager behavior as data.
//!
//! Every field defaults to the built-in constants, so
//! `DockPolicy::default()` behaves exactly like a manager with no
//! configuration. With the `policy-config` feature the policy can be read
//! from TOML or JSON:
//!
//! ```toml
//! tool_area_ratio = 0.25
//! tool_area_placement = "Left"
//! default_pin_side = "Left"
//!
//! [dispose]
//! tool_windows = true
//! ```

#[cfg(feature = "policy-config")]
use std::path::Path;

use dockwork_layout::mutator::{
    DEFAULT_SIDE_RATIO, DEFAULT_TOOL_AREA_RATIO, TOOL_ON_DOCUMENT_RATIO, TOOL_ON_TOOL_RATIO,
};
use dockwork_layout::{ContentKind, DockSide, MAX_SPLIT_RATIO, MIN_SPLIT_RATIO};

use crate::registry::DisposePolicy;

/// Dock manager configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "policy-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct DockPolicy {
    /// Collapse splits around emptied tool groups and strips on validation.
    pub prune_empty_tool_leaves: bool,
    /// Run the full validator on every layout swap (parents are always
    /// rebuilt).
    pub validate_on_apply: bool,
    /// Share of a tool group side-docked onto a document group.
    pub tool_on_document_ratio: f64,
    /// Share of a tool group side-docked onto another tool group.
    pub tool_on_tool_ratio: f64,
    /// Share for every other side-dock.
    pub default_side_ratio: f64,
    /// Share of an auto-created tool area.
    pub tool_area_ratio: f64,
    pub tool_area_placement: DockSide,
    /// Side used when pinning without an explicit side.
    pub default_pin_side: DockSide,
    /// Which kinds are disposed when closed.
    pub dispose: DisposePolicy,
}

impl Default for DockPolicy {
    fn default() -> Self {
        Self {
            prune_empty_tool_leaves: true,
            validate_on_apply: true,
            tool_on_document_ratio: TOOL_ON_DOCUMENT_RATIO,
            tool_on_tool_ratio: TOOL_ON_TOOL_RATIO,
            default_side_ratio: DEFAULT_SIDE_RATIO,
            tool_area_ratio: DEFAULT_TOOL_AREA_RATIO,
            tool_area_placement: DockSide::Right,
            default_pin_side: DockSide::Right,
            dispose: DisposePolicy::default(),
        }
    }
}

impl DockPolicy {
    /// Share of a new side group of `new_kind` docked onto a group of
    /// `target_kind`.
    #[must_use]
    pub fn side_ratio(&self, target_kind: ContentKind, new_kind: ContentKind) -> f64 {
        match (target_kind, new_kind) {
            (ContentKind::Document, ContentKind::ToolWindow) => self.tool_on_document_ratio,
            (ContentKind::ToolWindow, ContentKind::ToolWindow) => self.tool_on_tool_ratio,
            _ => self.default_side_ratio,
        }
    }

    /// Range problems, one message each. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("tool_on_document_ratio", self.tool_on_document_ratio),
            ("tool_on_tool_ratio", self.tool_on_tool_ratio),
            ("default_side_ratio", self.default_side_ratio),
            ("tool_area_ratio", self.tool_area_ratio),
        ] {
            if !(MIN_SPLIT_RATIO..=MAX_SPLIT_RATIO).contains(&value) {
                errors.push(format!(
                    "{name} must be in [{MIN_SPLIT_RATIO}, {MAX_SPLIT_RATIO}], got {value}"
                ));
            }
        }
        errors
    }

    /// Load from a TOML string.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, DockPolicyError> {
        let policy: Self = toml::from_str(s).map_err(DockPolicyError::Toml)?;
        policy.checked()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, DockPolicyError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DockPolicyError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "policy-config")]
    pub fn from_json_str(s: &str) -> Result<Self, DockPolicyError> {
        let policy: Self = serde_json::from_str(s).map_err(DockPolicyError::Json)?;
        policy.checked()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DockPolicyError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DockPolicyError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to a TOML string.
    #[cfg(feature = "policy-config")]
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    #[cfg(feature = "policy-config")]
    fn checked(self) -> Result<Self, DockPolicyError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(DockPolicyError::Validation(errors))
        }
    }
}

/// Errors from loading a [`DockPolicy`].
#[derive(Debug)]
pub enum DockPolicyError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "policy-config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "policy-config")]
    Json(serde_json::Error),
    /// Out-of-range values.
    Validation(Vec<String>),
}

impl std::fmt::Display for DockPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "policy-config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for DockPolicyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "policy-config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
