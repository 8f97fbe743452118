//! Prompt library and request builders
//!
//! A prompt is a markdown file with YAML frontmatter and `# System` /
//! `# User` sections. A file named `<id>.md` in the override directory
//! (`~/.local/share/pennywise/prompts/overrides/` on Linux) replaces the
//! copy compiled into the binary.
//!
//! The builders at the bottom of this module turn a prompt plus its inputs
//! into a [`ModelRequest`]. They ask the model to stay inside the reference
//! lists but do not enforce it; [`crate::ai::parsing`] does that.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::types::{ImagePayload, ModelRequest};
use crate::error::{Error, Result};
use crate::models::{ExpenseRecord, FinancialProfileBundle, GoalRecord, ProfileSummary, RecurringExpense};
use crate::reference::{ReferenceData, ReferenceKind};

mod defaults {
    pub const SCAN_RECEIPT: &str = include_str!("../../../prompts/scan_receipt.md");
    pub const ANALYZE_FINANCES: &str = include_str!("../../../prompts/analyze_finances.md");
}

const SYSTEM_HEADER: &str = "# System";
const USER_HEADER: &str = "# User";

/// The prompts the pipelines use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Vision prompt for reading a receipt image
    ScanReceipt,
    /// Financial health assessment over a profile bundle
    AnalyzeFinances,
}

impl PromptId {
    /// File stem and frontmatter id
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanReceipt => "scan_receipt",
            Self::AnalyzeFinances => "analyze_finances",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::ScanReceipt, Self::AnalyzeFinances]
    }

    fn embedded(&self) -> &'static str {
        match self {
            Self::ScanReceipt => defaults::SCAN_RECEIPT,
            Self::AnalyzeFinances => defaults::ANALYZE_FINANCES,
        }
    }

    fn file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

impl std::str::FromStr for PromptId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        PromptId::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| Error::InvalidData(format!("Unknown prompt id: {}", wanted)))
    }
}

/// YAML frontmatter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the wording changes
    pub version: u32,
    /// vision or reasoning
    pub task_type: String,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Everything after the frontmatter
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        section(&self.content, SYSTEM_HEADER)
    }

    pub fn user_section(&self) -> Option<&str> {
        section(&self.content, USER_HEADER)
    }

    /// Render the system section, if there is one
    pub fn render_system(&self, vars: &HashMap<&str, String>) -> Option<String> {
        self.system_section().map(|s| render_template(s, vars))
    }

    /// Render the user section, or the whole body when there are no sections
    pub fn render_user(&self, vars: &HashMap<&str, String>) -> String {
        let template = self.user_section().unwrap_or(&self.content);
        render_template(template, vars)
    }

    /// Variable names referenced by `{{var}}` or `{{#if var}}`, sorted
    pub fn placeholders(&self) -> Vec<String> {
        static NAME: OnceLock<Regex> = OnceLock::new();
        let name_re =
            NAME.get_or_init(|| Regex::new(r"\{\{(?:#if\s+)?(\w+)\s*\}\}").expect("valid regex"));

        name_re
            .captures_iter(&self.content)
            .map(|c| c[1].to_string())
            .filter(|name| name != "else")
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Loads prompts once and keeps them for the life of the library
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Library using the platform override directory
    pub fn new() -> Self {
        Self::with_dir(default_prompts_dir())
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self::with_dir(Some(path))
    }

    /// Library that never looks on disk
    pub fn embedded_only() -> Self {
        Self::with_dir(None)
    }

    fn with_dir(override_dir: Option<PathBuf>) -> Self {
        Self {
            override_dir,
            cache: HashMap::new(),
        }
    }

    /// Fetch a prompt, reading it on first use
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        let override_file = self.override_file(id);
        match self.cache.entry(id) {
            Entry::Occupied(entry) => Ok(&*entry.into_mut()),
            Entry::Vacant(entry) => Ok(&*entry.insert(load_prompt(id, override_file)?)),
        }
    }

    /// One row per known prompt
    pub fn list(&mut self) -> Vec<PromptInfo> {
        let mut rows = Vec::with_capacity(PromptId::all().len());
        for &id in PromptId::all() {
            let override_path = self.override_file(id);
            let (version, task_type) = match self.get(id) {
                Ok(prompt) => (prompt.metadata.version, prompt.metadata.task_type.clone()),
                Err(_) => (0, String::new()),
            };
            rows.push(PromptInfo {
                id: id.as_str().to_string(),
                version,
                task_type,
                has_override: override_path.is_some(),
                override_path,
            });
        }
        rows
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_file(id).is_some()
    }

    /// Path of an existing override file for `id`
    fn override_file(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_deref()
            .map(|dir| dir.join(id.file_name()))
            .filter(|path| path.is_file())
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Forget loaded prompts so edited overrides are picked up
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing row for `PromptLibrary::list`
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub task_type: String,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Where prompt overrides live
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("pennywise").join("prompts").join("overrides"))
}

fn load_prompt(id: PromptId, override_file: Option<PathBuf>) -> Result<Prompt> {
    let Some(path) = override_file else {
        let (metadata, content) = split_frontmatter(id.embedded())?;
        return Ok(Prompt {
            metadata,
            content,
            is_override: false,
            override_path: None,
        });
    };

    let raw = read_override(&path)?;
    let (metadata, content) = split_frontmatter(&raw)?;
    debug!(prompt = id.as_str(), path = %path.display(), "Loaded prompt override");
    Ok(Prompt {
        metadata,
        content,
        is_override: true,
        override_path: Some(path),
    })
}

fn read_override(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::InvalidData(format!("Cannot read prompt override {}: {}", path.display(), e))
    })
}

/// Split `---\n<yaml>\n---\n<body>` into metadata and body
fn split_frontmatter(raw: &str) -> Result<(PromptMetadata, String)> {
    let rest = raw
        .trim_start()
        .strip_prefix("---")
        .ok_or_else(|| Error::InvalidData("prompt file has no YAML frontmatter".into()))?;
    let (yaml, body) = rest
        .split_once("\n---")
        .ok_or_else(|| Error::InvalidData("prompt frontmatter is not terminated by ---".into()))?;

    let metadata: PromptMetadata = serde_yaml::from_str(yaml)
        .map_err(|e| Error::InvalidData(format!("bad prompt frontmatter: {}", e)))?;

    Ok((metadata, body.trim().to_string()))
}

/// Text under the line `header` up to the next top-level heading.
///
/// Headers only count as whole lines, so `## User notes` or a mention of
/// `# User` inside prose does not start a section.
fn section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let mut offset = 0;
    let mut start = None;

    for line in content.split_inclusive('\n') {
        let heading = line.trim_end();
        match start {
            Some(begin) if heading.starts_with("# ") => return Some(content[begin..offset].trim()),
            None if heading == header => start = Some(offset + line.len()),
            _ => {}
        }
        offset += line.len();
    }

    start.map(|begin| content[begin..].trim())
}

/// Resolve conditionals first, then substitute `{{var}}` in a single pass so
/// values are never re-scanned for template syntax
fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    static VAR: OnceLock<Regex> = OnceLock::new();
    let var_re = VAR.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid regex"));

    let resolved = resolve_conditionals(template, vars);
    var_re
        .replace_all(&resolved, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Resolve `{{#if var}}...{{else}}...{{/if}}` blocks (not nested).
///
/// A block is kept when the variable is present and non-empty.
fn resolve_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    loop {
        let Some(if_start) = result.find("{{#if ") else {
            break;
        };
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_end].trim().to_string();
        let block_start = var_start + var_end + 2;
        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block = &result[block_start..block_start + endif_pos];
        let full_end = block_start + endif_pos + 7;

        let (then_part, else_part) = match block.find("{{else}}") {
            Some(pos) => (&block[..pos], &block[pos + 8..]),
            None => (block, ""),
        };

        let include = vars.get(var_name.as_str()).is_some_and(|v| !v.is_empty());
        let kept = if include { then_part } else { else_part };

        result = format!("{}{}{}", &result[..if_start], kept, &result[full_end..]);
    }

    result
}

/// JSON-quote and join reference names for embedding in a prompt
fn quoted_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| serde_json::Value::from(*n).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the vision request for reading one receipt.
///
/// Every reference name is embedded verbatim. An empty list turns that
/// field into free text in the instruction; that is intentional and logged.
pub fn build_extraction_request(
    prompt: &Prompt,
    image: ImagePayload,
    reference: &ReferenceData,
    today: NaiveDate,
) -> ModelRequest {
    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("today", today.format("%Y-%m-%d").to_string());

    for (var, kind) in [
        ("categories", ReferenceKind::Category),
        ("payment_apps", ReferenceKind::PaymentApp),
        ("banks", ReferenceKind::Bank),
    ] {
        let names = reference.names(kind);
        if names.is_empty() {
            debug!(field = kind.field(), "Reference list empty, field left unconstrained");
        }
        vars.insert(var, quoted_list(&names));
    }

    let mut request = ModelRequest::text(prompt.render_user(&vars)).with_image(image);
    if let Some(system) = prompt.render_system(&vars) {
        request = request.with_system(system);
    }
    request
}

/// Payload describing the profile to the model
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisPayload<'a> {
    summary: ProfileSummary,
    expenses: &'a [ExpenseRecord],
    goals: &'a [GoalRecord],
    recurring: &'a [RecurringExpense],
}

/// Build the text request for a financial health assessment
pub fn build_analysis_request(prompt: &Prompt, bundle: &FinancialProfileBundle) -> Result<ModelRequest> {
    let payload = AnalysisPayload {
        summary: bundle.summary(),
        expenses: &bundle.expenses,
        goals: &bundle.goals,
        recurring: &bundle.recurring,
    };

    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("profile", serde_json::to_string_pretty(&payload)?);
    vars.insert("expense_count", bundle.expense_count().to_string());

    let mut request = ModelRequest::text(prompt.render_user(&vars));
    if let Some(system) = prompt.render_system(&vars) {
        request = request.with_system(system);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    fn scan_prompt() -> Prompt {
        PromptLibrary::embedded_only()
            .get(PromptId::ScanReceipt)
            .unwrap()
            .clone()
    }

    #[test]
    fn test_split_frontmatter() {
        let content = r#"---
id: test_prompt
version: 2
task_type: vision
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = split_frontmatter(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_split_frontmatter_requires_delimiters() {
        assert!(split_frontmatter("# User\nhello").is_err());
        assert!(split_frontmatter("---\nid: x\n").is_err());
    }

    #[test]
    fn test_conditionals_with_else() {
        let template = "A{{#if list}}[{{list}}]{{else}}free{{/if}}B";
        assert_eq!(render_template(template, &vars(&[("list", "x")])), "A[x]B");
        assert_eq!(render_template(template, &vars(&[("list", "")])), "AfreeB");
        assert_eq!(render_template(template, &HashMap::new()), "AfreeB");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let rendered = render_template(
            "{{a}} {{b}}",
            &vars(&[("a", "{{b}}"), ("b", "{{#if a}}x{{/if}}")]),
        );
        assert_eq!(rendered, "{{b}} {{#if a}}x{{/if}}");
    }

    #[test]
    fn test_unknown_vars_left_in_place() {
        assert_eq!(render_template("hi {{who}}", &HashMap::new()), "hi {{who}}");
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let (metadata, body) = split_frontmatter(id.embedded()).unwrap();
            assert_eq!(metadata.id, id.as_str());
            assert!(body.contains("# System"));
            assert!(body.contains("# User"));
        }
    }

    #[test]
    fn test_sections_and_placeholders() {
        let prompt = scan_prompt();
        assert!(prompt.system_section().is_some());
        assert!(!prompt.user_section().unwrap().contains("# System"));

        let names = prompt.placeholders();
        assert!(names.contains(&"categories".to_string()));
        assert!(names.contains(&"today".to_string()));
        assert!(!names.iter().any(|n| n == "else" || n == "if"));
    }

    #[test]
    fn test_section_headers_match_whole_lines() {
        let content = "# System\nRules.\n## User notes\nKeep # User out of it.\n\n# User\nHello {{name}}.\n";
        let prompt = Prompt {
            metadata: PromptMetadata {
                id: "custom".into(),
                version: 1,
                task_type: "vision".into(),
            },
            content: content.to_string(),
            is_override: true,
            override_path: None,
        };

        let system = prompt.system_section().unwrap();
        assert!(system.contains("## User notes"));
        assert!(system.contains("Keep # User out of it."));
        assert_eq!(prompt.user_section(), Some("Hello {{name}}."));
    }

    #[test]
    fn test_reference_names_are_escaped() {
        assert_eq!(
            quoted_list(&["Food", "Bob's \"Best\" Bank", "C:\\Pay"]),
            r#""Food", "Bob's \"Best\" Bank", "C:\\Pay""#
        );

        let reference = ReferenceData::from_names(&["Food"], &["Cash"], &["Bob's \"Best\" Bank"]);
        let image = ImagePayload::new(vec![1], "image/png");
        let request = build_extraction_request(&scan_prompt(), image, &reference, today());
        assert!(request.instruction.contains(r#"["Bob's \"Best\" Bank"]"#));
    }

    #[test]
    fn test_prompt_id_from_str() {
        assert_eq!("scan_receipt".parse::<PromptId>().unwrap(), PromptId::ScanReceipt);
        assert!("classify".parse::<PromptId>().is_err());
    }

    #[test]
    fn test_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("analyze_finances.md"),
            "---\nid: analyze_finances\nversion: 9\ntask_type: reasoning\n---\n# User\nCustom {{expense_count}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(lib.has_override(PromptId::AnalyzeFinances));
        assert!(!lib.has_override(PromptId::ScanReceipt));

        let prompt = lib.get(PromptId::AnalyzeFinances).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        let listed = lib.list();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|p| p.id == "analyze_finances" && p.has_override));

        lib.clear_cache();
        assert!(lib.get(PromptId::ScanReceipt).is_ok());
    }

    #[test]
    fn test_extraction_request_embeds_every_name() {
        let reference = ReferenceData::builtin();
        let image = ImagePayload::new(vec![0xff, 0xd8], "image/jpeg");
        let request = build_extraction_request(&scan_prompt(), image, &reference, today());

        for kind in [ReferenceKind::Category, ReferenceKind::PaymentApp, ReferenceKind::Bank] {
            for name in reference.names(kind) {
                assert!(
                    request.instruction.contains(&format!("\"{}\"", name)),
                    "missing {}",
                    name
                );
            }
        }
        assert!(request.instruction.contains("2025-03-12"));
        assert!(!request.instruction.contains("{{"));
        assert!(request.system.is_some());
        assert_eq!(request.image.unwrap().media_type, "image/jpeg");
    }

    #[test]
    fn test_extraction_request_empty_list_is_free_text() {
        let reference = ReferenceData::from_names(&["Food"], &[], &["SBI"]);
        let image = ImagePayload::new(vec![1], "image/png");
        let request = build_extraction_request(&scan_prompt(), image, &reference, today());

        assert!(request.instruction.contains("[\"Food\"]"));
        assert!(request
            .instruction
            .contains("paymentApp: the app or method used to pay, or \"\" if unclear."));
        assert!(!request.instruction.contains("{{"));
    }

    #[test]
    fn test_analysis_request_contains_profile() {
        let bundle: FinancialProfileBundle = serde_json::from_str(
            r#"{"expenses": [{"name": "Zomato", "amount": 450, "date": "2025-03-10", "category": "Food & Dining"}]}"#,
        )
        .unwrap();
        let prompt = PromptLibrary::embedded_only()
            .get(PromptId::AnalyzeFinances)
            .unwrap()
            .clone();

        let request = build_analysis_request(&prompt, &bundle).unwrap();
        assert!(request.image.is_none());
        assert!(request.instruction.contains("Zomato"));
        assert!(request.instruction.contains("\"totalSpent\""));
        assert!(request.instruction.contains("history of 1 expenses"));
        assert!(request.instruction.contains("healthScore"));
    }
}
