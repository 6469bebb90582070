//! Declarative YAML flow specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::E2eResult;

/// A complete browser flow parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering flows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<FlowStep>,
}

fn default_viewport() -> Viewport {
    Viewport {
        width: 1280,
        height: 720,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

fn default_wait_timeout() -> u64 {
    5000
}

fn default_settle_ms() -> u64 {
    2000
}

/// A single step in a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    /// Navigate to a URL (relative to the server base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for an element to become visible
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Wait until the page URL matches a glob pattern (e.g. `**/app-selector`)
    WaitUrl {
        pattern: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Assert something about the first element matching a selector
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        /// Expected input value (`inputValue()` semantics)
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Assert on the page title
    AssertTitle {
        /// Regex the title must match
        #[serde(default)]
        matches: Option<String>,
        /// Exact title
        #[serde(default)]
        equals: Option<String>,
    },

    /// The exclusive-or boundary after a submission: wait for the page to
    /// settle, then either validate the error notice and halt the flow with a
    /// rationale, or fall through to the success-path steps that follow.
    ExpectOutcome {
        error_selector: String,
        #[serde(default)]
        error_contains: Vec<String>,
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
        #[serde(default)]
        rationale: String,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message (for debugging)
    Log { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
}

impl FlowSpec {
    /// Parse a flow spec from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a flow spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all flow specs from a directory, sorted by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }
        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}
