//! Structured generation results and their Markdown form.
//!
//! The model answers the design and plan requests with JSON; the types here
//! are the wire shape (camelCase field names). [`format_design_document`]
//! and [`format_plan`] flatten them into the single Markdown string that
//! the TOC builder and render pipeline consume.

use crate::export::{safe_title, DESIGN_FALLBACK_TITLE};
use crate::pipeline::postprocess::clean_diagram;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Technical Design Document as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDocument {
    pub title: String,
    pub general_overview: String,
    pub core_features: Vec<CoreFeature>,
    pub appendix: Appendix,
}

/// One core feature of a design document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreFeature {
    pub name: String,
    pub tech_solution: String,
    pub tech_notes: String,
    pub data_changes: String,
    /// Raw diagram code, no fences.
    pub diagram: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appendix {
    pub new_metrics: String,
    pub tools: String,
    pub compatibility: String,
}

/// Implementation plan for one core feature.
///
/// Step lists default to empty when the model leaves one out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationPlan {
    pub feature_name: String,
    #[serde(default)]
    pub features_to_implement: Vec<String>,
    #[serde(default)]
    pub frontend_steps: Vec<String>,
    #[serde(default)]
    pub backend_steps: Vec<String>,
    #[serde(default)]
    pub integration_steps: Vec<String>,
}

/// A formatted design document ready for preview and download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDesign {
    /// Markdown produced by [`format_design_document`].
    pub content: String,
    /// Filename-safe title, never empty.
    pub title: String,
}

impl GeneratedDesign {
    pub fn from_document(doc: &DesignDocument) -> Self {
        Self {
            content: format_design_document(doc),
            title: safe_title(&doc.title, DESIGN_FALLBACK_TITLE),
        }
    }
}

/// Message shown in place of an empty plan list.
pub const NO_PLAN_MESSAGE: &str = "No implementation plan available.";

// ── Design document ──────────────────────────────────────────────────────

/// Flatten a design document into Markdown.
///
/// Layout:
///
/// ```text
/// # {title}
///
/// ## I. General Overview
/// ## II. Core Features
/// ### 2.N {name}   (Tech Solution, Tech Notes, Data Changes, Flow Diagram)
/// ## III. Appendix
/// ### 3.1 New Metrics / 3.2 Tools / 3.3 Compatibility
/// ```
///
/// Each feature's diagram is emitted inside a `mermaid` fence; a fence the
/// model put inside the field anyway is removed first.
pub fn format_design_document(doc: &DesignDocument) -> String {
    let mut md = String::new();

    // write! to a String cannot fail
    let _ = write!(md, "# {}\n\n", doc.title);
    let _ = write!(md, "## I. General Overview\n{}\n\n", doc.general_overview);

    md.push_str("## II. Core Features\n");
    for (i, feature) in doc.core_features.iter().enumerate() {
        let _ = writeln!(md, "### 2.{} {}", i + 1, feature.name);
        let _ = write!(md, "#### Tech Solution\n{}\n\n", feature.tech_solution);
        let _ = write!(md, "#### Tech Notes\n{}\n\n", feature.tech_notes);
        let _ = write!(md, "#### Data Changes\n{}\n\n", feature.data_changes);
        md.push_str("#### Flow Diagram\n");
        let _ = write!(md, "```mermaid\n{}\n```\n\n", clean_diagram(&feature.diagram));
    }

    md.push_str("## III. Appendix\n");
    let _ = write!(md, "### 3.1 New Metrics\n{}\n\n", doc.appendix.new_metrics);
    let _ = write!(md, "### 3.2 Tools\n{}\n\n", doc.appendix.tools);
    let _ = writeln!(md, "### 3.3 Compatibility\n{}", doc.appendix.compatibility);

    md
}

// ── Implementation plan ──────────────────────────────────────────────────

fn push_section(md: &mut String, title: &str, items: &[String]) {
    let _ = writeln!(md, "### {title}");
    for item in items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let _ = writeln!(md, "- {item}");
    }
    md.push('\n');
}

/// Flatten implementation plans into Markdown, one `## FEATURE:` section
/// per plan.
pub fn format_plan(plans: &[ImplementationPlan]) -> String {
    if plans.is_empty() {
        return format!("{NO_PLAN_MESSAGE}\n");
    }

    let mut md = String::new();
    for plan in plans {
        let _ = write!(md, "## FEATURE: {}\n\n", plan.feature_name);
        push_section(&mut md, "Features to Implement", &plan.features_to_implement);
        push_section(&mut md, "Frontend Steps (ReactJS)", &plan.frontend_steps);
        push_section(&mut md, "Backend Steps", &plan.backend_steps);
        push_section(&mut md, "Integration Steps", &plan.integration_steps);
    }

    let trimmed = md.trim_end().len();
    md.truncate(trimmed);
    md.push('\n');
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DesignDocument {
        DesignDocument {
            title: "Login Flow".into(),
            general_overview: "Users sign in.".into(),
            core_features: vec![CoreFeature {
                name: "Sign In".into(),
                tech_solution: "- POST /login".into(),
                tech_notes: "- Low complexity".into(),
                data_changes: "No data changes required".into(),
                diagram: "graph TD; A-->B".into(),
            }],
            appendix: Appendix {
                new_metrics: "No new metrics".into(),
                tools: "No new tools required".into(),
                compatibility: "No compatibility issues".into(),
            },
        }
    }

    #[test]
    fn design_layout_is_exact() {
        let expected = "# Login Flow\n\n\
## I. General Overview\nUsers sign in.\n\n\
## II. Core Features\n\
### 2.1 Sign In\n\
#### Tech Solution\n- POST /login\n\n\
#### Tech Notes\n- Low complexity\n\n\
#### Data Changes\nNo data changes required\n\n\
#### Flow Diagram\n```mermaid\ngraph TD; A-->B\n```\n\n\
## III. Appendix\n\
### 3.1 New Metrics\nNo new metrics\n\n\
### 3.2 Tools\nNo new tools required\n\n\
### 3.3 Compatibility\nNo compatibility issues\n";
        assert_eq!(format_design_document(&sample()), expected);
    }

    #[test]
    fn features_are_numbered_in_order() {
        let mut doc = sample();
        let mut second = doc.core_features[0].clone();
        second.name = "Sign Out".into();
        doc.core_features.push(second);
        let md = format_design_document(&doc);
        let first = md.find("### 2.1 Sign In").unwrap();
        let second = md.find("### 2.2 Sign Out").unwrap();
        assert!(first < second);
    }

    #[test]
    fn fenced_diagram_field_is_not_double_fenced() {
        let mut doc = sample();
        doc.core_features[0].diagram = "```mermaid\ngraph TD; A-->B\n```".into();
        let md = format_design_document(&doc);
        assert_eq!(md.matches("```mermaid").count(), 1);
        assert!(md.contains("```mermaid\ngraph TD; A-->B\n```"));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let json = r#"{
            "title": "T",
            "generalOverview": "O",
            "coreFeatures": [{
                "name": "N", "techSolution": "S", "techNotes": "Notes",
                "dataChanges": "D", "diagram": "graph TD; A-->B"
            }],
            "appendix": {"newMetrics": "M", "tools": "Tl", "compatibility": "C"}
        }"#;
        let doc: DesignDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.general_overview, "O");
        assert_eq!(doc.core_features[0].tech_notes, "Notes");
        assert_eq!(doc.appendix.new_metrics, "M");
    }

    #[test]
    fn missing_design_field_is_rejected() {
        let json = r#"{"title": "T", "coreFeatures": []}"#;
        assert!(serde_json::from_str::<DesignDocument>(json).is_err());
    }

    #[test]
    fn generated_design_title_is_safe() {
        let mut doc = sample();
        doc.title = "Login: Flow (v2)".into();
        let generated = GeneratedDesign::from_document(&doc);
        assert_eq!(generated.title, "Login_Flow_v2");
        assert!(generated.content.starts_with("# Login: Flow (v2)\n"));

        doc.title = "!!!".into();
        assert_eq!(GeneratedDesign::from_document(&doc).title, "Generated_TDD");
    }

    #[test]
    fn plan_markdown() {
        let plans = vec![ImplementationPlan {
            feature_name: "Sign In".into(),
            features_to_implement: vec!["Form".into()],
            frontend_steps: vec!["Create `<LoginForm />`".into()],
            backend_steps: vec!["POST /api/v1/login".into()],
            integration_steps: vec![],
        }];
        let md = format_plan(&plans);
        assert!(md.starts_with("## FEATURE: Sign In\n\n### Features to Implement\n- Form\n"));
        assert!(md.contains("### Frontend Steps (ReactJS)\n- Create `<LoginForm />`\n"));
        assert!(md.contains("### Backend Steps\n- POST /api/v1/login\n"));
        assert!(md.ends_with("### Integration Steps\n"));
    }

    #[test]
    fn empty_plan_list() {
        assert_eq!(format_plan(&[]), "No implementation plan available.\n");
    }

    #[test]
    fn plan_tolerates_missing_step_lists() {
        let plans: Vec<ImplementationPlan> =
            serde_json::from_str(r#"[{"featureName": "X", "frontendSteps": ["a"]}]"#).unwrap();
        assert!(plans[0].backend_steps.is_empty());
        assert_eq!(plans[0].frontend_steps, vec!["a".to_string()]);
    }
}
