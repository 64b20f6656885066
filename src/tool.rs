//! Tool registry: the five document operations, their option schemas,
//! backend endpoints, and the synchronous option-validation gate.
//!
//! The registry is static. [`Tool::spec`] exposes everything a UI needs to
//! render the option panel for a tool; [`Tool::validate`] turns the raw form
//! values the user typed ([`OptionsForm`]) into typed [`ToolOptions`] or a
//! [`ValidationError`] naming the first problem found.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the supported document operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Compress,
    Merge,
    Split,
    Lock,
    Convert,
}

impl Tool {
    /// Every tool, in display order.
    pub const ALL: [Tool; 5] = [
        Tool::Compress,
        Tool::Merge,
        Tool::Split,
        Tool::Lock,
        Tool::Convert,
    ];

    /// Parse a tool identifier (`"compress"`, `"lock"`, …). Case-sensitive.
    pub fn from_id(id: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            Tool::Compress => "compress",
            Tool::Merge => "merge",
            Tool::Split => "split",
            Tool::Lock => "lock",
            Tool::Convert => "convert",
        }
    }

    /// Backend endpoint path for processing requests.
    pub fn endpoint(self) -> &'static str {
        match self {
            Tool::Compress => "/api/compress",
            Tool::Merge => "/api/merge",
            Tool::Split => "/api/split",
            Tool::Lock => "/api/lock",
            Tool::Convert => "/api/convert",
        }
    }

    /// The option schema and display text for this tool.
    pub fn spec(self) -> &'static ToolSpec {
        match self {
            Tool::Compress => &COMPRESS,
            Tool::Merge => &MERGE,
            Tool::Split => &SPLIT,
            Tool::Lock => &LOCK,
            Tool::Convert => &CONVERT,
        }
    }

    /// Check `form` against this tool's schema.
    ///
    /// Never touches the network. The first failing rule wins; for `lock`
    /// the mismatch check runs before the empty check.
    pub fn validate(self, form: &OptionsForm) -> Result<ToolOptions, ValidationError> {
        match self {
            Tool::Compress => {
                let level = match form.level.as_deref().map(str::trim) {
                    None | Some("") => CompressionLevel::default(),
                    Some(raw) => CompressionLevel::from_form(raw),
                };
                Ok(ToolOptions::Compress { level })
            }
            Tool::Merge => Ok(ToolOptions::Merge {}),
            Tool::Split => {
                let expr = form.page_range.as_deref().unwrap_or("").trim();
                if expr.is_empty() {
                    return Err(ValidationError::PageRangeRequired);
                }
                parse_page_range(expr)?;
                Ok(ToolOptions::Split {
                    page_range: expr.to_string(),
                })
            }
            Tool::Lock => {
                let password = form.password.as_deref().unwrap_or("");
                let confirm = form.confirm_password.as_deref().unwrap_or("");
                if password != confirm {
                    return Err(ValidationError::PasswordMismatch);
                }
                if password.is_empty() {
                    return Err(ValidationError::PasswordRequired);
                }
                Ok(ToolOptions::Lock {
                    password: password.to_string(),
                })
            }
            Tool::Convert => {
                let format = form.format.as_deref().unwrap_or("").trim();
                if format.is_empty() {
                    return Err(ValidationError::FormatRequired);
                }
                let quality = match form.quality.as_deref().map(str::trim) {
                    None | Some("") => DEFAULT_CONVERT_QUALITY.to_string(),
                    Some(q) => q.to_string(),
                };
                Ok(ToolOptions::Convert {
                    format: format.to_string(),
                    quality,
                })
            }
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ── Schema ───────────────────────────────────────────────────────────────

/// Display text and option fields for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub tool: Tool,
    pub title: &'static str,
    pub description: &'static str,
    pub fields: &'static [OptionField],
}

/// One field of a tool's option panel.
#[derive(Debug, Clone, Serialize)]
pub struct OptionField {
    /// Wire name; also the key in [`OptionsForm`].
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Masked text.
    Secret,
    /// One of a fixed set of `(value, label)` pairs.
    Choice(&'static [(&'static str, &'static str)]),
}

const COMPRESSION_CHOICES: &[(&str, &str)] = &[
    ("1", "Low (Better Quality)"),
    ("2", "Medium"),
    ("3", "High (Smaller Size)"),
];

const DEFAULT_CONVERT_QUALITY: &str = "medium";

static COMPRESS: ToolSpec = ToolSpec {
    tool: Tool::Compress,
    title: "Compress PDF",
    description: "Reduce file size while keeping the best possible quality.",
    fields: &[OptionField {
        name: "level",
        label: "Compression level",
        kind: FieldKind::Choice(COMPRESSION_CHOICES),
        required: false,
    }],
};

static MERGE: ToolSpec = ToolSpec {
    tool: Tool::Merge,
    title: "Merge PDF",
    description: "Combine several PDFs into one document, in the order selected.",
    fields: &[],
};

static SPLIT: ToolSpec = ToolSpec {
    tool: Tool::Split,
    title: "Split PDF",
    description: "Extract page ranges into separate documents.",
    fields: &[OptionField {
        name: "page_range",
        label: "Page ranges (e.g. 1-3,5)",
        kind: FieldKind::Text,
        required: true,
    }],
};

static LOCK: ToolSpec = ToolSpec {
    tool: Tool::Lock,
    title: "Lock PDF",
    description: "Protect a PDF with a password.",
    fields: &[
        OptionField {
            name: "password",
            label: "Password",
            kind: FieldKind::Secret,
            required: true,
        },
        OptionField {
            name: "confirm_password",
            label: "Confirm password",
            kind: FieldKind::Secret,
            required: true,
        },
    ],
};

static CONVERT: ToolSpec = ToolSpec {
    tool: Tool::Convert,
    title: "Convert PDF",
    description: "Convert a PDF to another document or image format.",
    fields: &[
        OptionField {
            name: "format",
            label: "Convert to",
            kind: FieldKind::Text,
            required: true,
        },
        OptionField {
            name: "quality",
            label: "Image quality",
            kind: FieldKind::Text,
            required: false,
        },
    ],
};

// ── Form and validated options ───────────────────────────────────────────

/// Raw option-panel values as the user entered them.
///
/// Fields irrelevant to the active tool are ignored by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsForm {
    pub level: Option<String>,
    pub page_range: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub format: Option<String>,
    pub quality: Option<String>,
}

/// Compression level as sent to `/api/compress`.
///
/// Serialised as the strings `"1"`, `"2"`, `"3"`: the backend compares the
/// value against string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionLevel {
    #[serde(rename = "1")]
    Low,
    #[default]
    #[serde(rename = "2")]
    Medium,
    #[serde(rename = "3")]
    High,
}

impl CompressionLevel {
    /// Map a slider value to a level. Out-of-range values clamp to the
    /// nearest end; non-numeric input falls back to the default.
    fn from_form(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) if n <= 1 => CompressionLevel::Low,
            Ok(2) => CompressionLevel::Medium,
            Ok(_) => CompressionLevel::High,
            Err(_) => CompressionLevel::default(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CompressionLevel::Low => COMPRESSION_CHOICES[0].1,
            CompressionLevel::Medium => COMPRESSION_CHOICES[1].1,
            CompressionLevel::High => COMPRESSION_CHOICES[2].1,
        }
    }
}

/// Validated, tool-specific processing options.
///
/// Serialises to the JSON fields that sit next to `token` in the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOptions {
    Compress { level: CompressionLevel },
    Merge {},
    Split { page_range: String },
    Lock { password: String },
    Convert { format: String, quality: String },
}

impl ToolOptions {
    pub fn tool(&self) -> Tool {
        match self {
            ToolOptions::Compress { .. } => Tool::Compress,
            ToolOptions::Merge {} => Tool::Merge,
            ToolOptions::Split { .. } => Tool::Split,
            ToolOptions::Lock { .. } => Tool::Lock,
            ToolOptions::Convert { .. } => Tool::Convert,
        }
    }
}

// ── Page ranges ──────────────────────────────────────────────────────────

static RE_PAGE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s*(?:-\s*\d+\s*)?(?:,\s*\d+\s*(?:-\s*\d+\s*)?)*$")
        .expect("page-range pattern is valid")
});

/// Parse a split expression such as `"1-3, 5, 8-9"` into inclusive,
/// 1-indexed `(start, end)` pairs.
///
/// Pages are 1-indexed and every range must satisfy `start <= end`.
pub fn parse_page_range(expr: &str) -> Result<Vec<(usize, usize)>, ValidationError> {
    let invalid = || ValidationError::PageRangeInvalid {
        expr: expr.to_string(),
    };

    if !RE_PAGE_RANGE.is_match(expr) {
        return Err(invalid());
    }

    expr.split(',')
        .map(|part| {
            let (start, end) = match part.split_once('-') {
                Some((s, e)) => (s.trim(), e.trim()),
                None => (part.trim(), part.trim()),
            };
            let start: usize = start.parse().map_err(|_| invalid())?;
            let end: usize = end.parse().map_err(|_| invalid())?;
            if start == 0 || start > end {
                return Err(invalid());
            }
            Ok((start, end))
        })
        .collect()
}
