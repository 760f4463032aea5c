//! Capability classification for discovered tools.
//!
//! Classification is heuristic: case-insensitive substring matching over a
//! tool's name and description against an ordered rule table, so a tool
//! matching several categories lands in the highest-priority one. Rules are
//! data, not a conditional cascade, and can be tested independently.

use serde::Serialize;
use std::collections::HashMap;
use tether_types::ToolDescriptor;

/// Semantic category of a discovered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Analysis of content templates and stylistic patterns.
    TemplateAnalysis,
    /// General analysis and insight extraction.
    Analysis,
    Search,
    Retrieval,
    Generation,
    /// Catch-all: tools matching no rule are retained, never dropped.
    Unknown,
}

/// Selection priority attached to a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One classification rule: keyword signals, the category they indicate,
/// and canned usage examples for downstream tool selection.
struct Rule {
    keywords: &'static [&'static str],
    kind: CapabilityKind,
    priority: Priority,
    examples: &'static [&'static str],
}

/// Evaluated top to bottom; the first rule with a matching keyword wins,
/// so specific signals (template analysis) sit above generic ones.
const RULES: &[Rule] = &[
    Rule {
        keywords: &["template", "style", "pattern"],
        kind: CapabilityKind::TemplateAnalysis,
        priority: Priority::High,
        examples: &["analyze which templates perform best for this audience"],
    },
    Rule {
        keywords: &["analy", "insight", "evaluat"],
        kind: CapabilityKind::Analysis,
        priority: Priority::High,
        examples: &["what are the recurring themes in these threads"],
    },
    Rule {
        keywords: &["search", "find", "lookup", "query"],
        kind: CapabilityKind::Search,
        priority: Priority::Medium,
        examples: &["find discussions mentioning onboarding friction"],
    },
    Rule {
        keywords: &["fetch", "read", "get", "list", "retriev"],
        kind: CapabilityKind::Retrieval,
        priority: Priority::Medium,
        examples: &["fetch the latest call transcripts"],
    },
    Rule {
        keywords: &["generat", "creat", "write", "draft", "compose"],
        kind: CapabilityKind::Generation,
        priority: Priority::Medium,
        examples: &["draft a summary post from these findings"],
    },
];

/// Derived classification for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCapability {
    pub name: String,
    pub kind: CapabilityKind,
    pub priority: Priority,
    /// Parameter names from the tool's input schema.
    pub parameters: Vec<String>,
    pub examples: Vec<String>,
}

/// Classify one tool from its descriptor text.
pub fn classify_tool(tool: &ToolDescriptor) -> ToolCapability {
    let haystack = format!("{} {}", tool.name, tool.description).to_lowercase();

    let matched = RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw)));

    let (kind, priority, examples) = match matched {
        Some(rule) => (
            rule.kind,
            rule.priority,
            rule.examples.iter().map(|e| e.to_string()).collect(),
        ),
        None => (CapabilityKind::Unknown, Priority::Low, Vec::new()),
    };

    let mut parameters: Vec<String> = tool
        .input_schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    parameters.sort();

    ToolCapability {
        name: tool.name.clone(),
        kind,
        priority,
        parameters,
        examples,
    }
}

/// Name-keyed map of classifications, recomputed wholesale on every
/// discovery round — no incremental merge.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    by_name: HashMap<String, ToolCapability>,
}

impl CapabilityRegistry {
    /// Classify every discovered tool. Discovery is total: unclassified
    /// tools land in the registry as `Unknown`.
    pub fn from_tools(tools: &[ToolDescriptor]) -> Self {
        let by_name = tools
            .iter()
            .map(|tool| (tool.name.clone(), classify_tool(tool)))
            .collect();
        Self { by_name }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ToolCapability> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Sorted tool names, for error messages and snapshots.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Classification summary sorted by name.
    pub fn summary(&self) -> Vec<ToolCapability> {
        let mut caps: Vec<ToolCapability> = self.by_name.values().cloned().collect();
        caps.sort_by(|a, b| a.name.cmp(&b.name));
        caps
    }
}
