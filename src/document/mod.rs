//! Structural checks for the project description document (`README.md`).
//!
//! The document is plain CommonMark with GitHub-flavored extras. Its only
//! structure is the order of its sections as written: headings, the body
//! lines under each heading, and fenced blocks that carry ASCII diagrams or
//! pseudo file trees.
//!
//! ```rust
//! use multiphase_analyzer::document::ProjectDescriptionDocument;
//!
//! let doc = ProjectDescriptionDocument::parse("# Title\n\n## Section\n\nBody\n");
//! assert_eq!(doc.title(), Some("Title"));
//! assert!(doc.heading_level_jumps().is_empty());
//! ```

use crate::utils::error::{AnalyzerError, Result};
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use std::path::Path;

/// Text the level-1 title must contain.
pub const EXPECTED_TITLE: &str = "Automated Multiphase Flow Analyzer System";

/// Feature headings, in the order the document must present them.
pub const FEATURE_HEADINGS: [&str; 4] = [
    "Industrial Control System",
    "Multiphase Analysis Engine",
    "Professional HMI/SCADA Interface",
    "Automated Sampling Control",
];

/// Sections whose fenced blocks are diagrams.
pub const DIAGRAM_SECTIONS: [&str; 2] = ["Project Structure", "Technical Architecture"];

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

impl Heading {
    /// Heading text without leading emoji, punctuation or whitespace.
    pub fn plain_text(&self) -> &str {
        normalize_heading(&self.text)
    }
}

/// A heading plus the source lines up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: Heading,
    pub body: Vec<String>,
}

/// Verbatim content of a fenced block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramBlock {
    /// Plain text of the nearest preceding heading, empty before the first one.
    pub section: String,
    /// Info string after the opening fence (`text`, `rust`, ...).
    pub info: String,
    pub content: String,
}

/// A heading that nests more than one level below its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadingJump {
    pub previous_level: u8,
    pub level: u8,
    pub heading: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptionDocument {
    source: String,
    sections: Vec<Section>,
    diagrams: Vec<DiagramBlock>,
}

impl ProjectDescriptionDocument {
    /// Parse markdown into sections and diagram blocks.
    ///
    /// Parsing never fails. An unterminated fence swallows the rest of the
    /// document into one block; [`fences_balanced`] is what reports it.
    pub fn parse(markdown: &str) -> Self {
        let mut headings: Vec<(Heading, usize, usize)> = Vec::new();
        let mut diagrams = Vec::new();

        let mut heading_start: Option<(u8, usize)> = None;
        let mut heading_text = String::new();
        let mut code_block: Option<(String, String)> = None;

        for (event, range) in Parser::new_ext(markdown, Options::empty()).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    heading_start = Some((level as u8, range.start));
                    heading_text.clear();
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, start)) = heading_start.take() {
                        let heading = Heading {
                            level,
                            text: heading_text.trim().to_string(),
                        };
                        headings.push((heading, start, range.end));
                    }
                }
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    code_block = Some((info.to_string(), String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((info, content)) = code_block.take() {
                        let section = headings
                            .last()
                            .map(|(h, _, _)| h.plain_text().to_string())
                            .unwrap_or_default();
                        diagrams.push(DiagramBlock {
                            section,
                            info,
                            content,
                        });
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, content)) = code_block.as_mut() {
                        content.push_str(&text);
                    } else if heading_start.is_some() {
                        heading_text.push_str(&text);
                    }
                }
                Event::SoftBreak | Event::HardBreak if heading_start.is_some() => {
                    heading_text.push(' ');
                }
                _ => {}
            }
        }

        let sections = headings
            .iter()
            .enumerate()
            .map(|(i, (heading, _, body_start))| {
                let body_end = headings
                    .get(i + 1)
                    .map(|(_, next_start, _)| *next_start)
                    .unwrap_or(markdown.len());
                let body = markdown
                    .get(*body_start..body_end)
                    .unwrap_or_default()
                    .lines()
                    .map(str::to_string)
                    .collect();
                Section {
                    heading: heading.clone(),
                    body,
                }
            })
            .collect();

        Self {
            source: markdown.to_string(),
            sections,
            diagrams,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AnalyzerError::DocumentError {
                message: format!("cannot read {}: {}", path.as_ref().display(), e),
            }
        })?;
        Ok(Self::parse(&content))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn headings(&self) -> impl Iterator<Item = &Heading> {
        self.sections.iter().map(|s| &s.heading)
    }

    pub fn diagrams(&self) -> &[DiagramBlock] {
        &self.diagrams
    }

    pub fn section(&self, plain_text: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.heading.plain_text() == plain_text)
    }

    /// Text of the first level-1 heading.
    pub fn title(&self) -> Option<&str> {
        self.headings()
            .find(|h| h.level == 1)
            .map(|h| h.text.as_str())
    }

    /// Headings that skip a level when nesting, e.g. `####` directly under `##`.
    ///
    /// Going back up any number of levels is fine. The first heading has no
    /// predecessor and is never reported.
    pub fn heading_level_jumps(&self) -> Vec<HeadingJump> {
        let mut jumps = Vec::new();
        let mut previous: Option<u8> = None;
        for heading in self.headings() {
            if let Some(prev) = previous {
                if heading.level > prev + 1 {
                    jumps.push(HeadingJump {
                        previous_level: prev,
                        level: heading.level,
                        heading: heading.text.clone(),
                    });
                }
            }
            previous = Some(heading.level);
        }
        jumps
    }

    pub fn render_html(&self) -> String {
        let mut out = String::with_capacity(self.source.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(&self.source, Options::empty()));
        out
    }

    /// Each expected heading must appear exactly once, in the given order.
    pub fn check_feature_headings(&self, expected: &[&str]) -> Result<()> {
        let mut last_index: Option<usize> = None;
        for name in expected {
            let positions: Vec<usize> = self
                .headings()
                .enumerate()
                .filter(|(_, h)| h.plain_text() == *name)
                .map(|(i, _)| i)
                .collect();

            let index = match positions.as_slice() {
                [index] => *index,
                [] => {
                    return Err(AnalyzerError::DocumentError {
                        message: format!("missing feature heading \"{}\"", name),
                    })
                }
                _ => {
                    return Err(AnalyzerError::DocumentError {
                        message: format!(
                            "feature heading \"{}\" appears {} times",
                            name,
                            positions.len()
                        ),
                    })
                }
            };

            if let Some(last) = last_index {
                if index < last {
                    return Err(AnalyzerError::DocumentError {
                        message: format!("feature heading \"{}\" is out of order", name),
                    });
                }
            }
            last_index = Some(index);
        }
        Ok(())
    }
}

/// Number of lines that open or close a triple-backtick fence.
pub fn count_fence_delimiters(markdown: &str) -> usize {
    markdown
        .lines()
        .filter(|line| line.trim_start().starts_with(FENCE))
        .count()
}

pub fn fences_balanced(markdown: &str) -> bool {
    count_fence_delimiters(markdown) % 2 == 0
}

fn normalize_heading(text: &str) -> &str {
    text.trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim_end()
}

/// All document checks in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub title: Option<String>,
    pub title_ok: bool,
    pub fence_delimiters: usize,
    pub fences_balanced: bool,
    pub heading_jumps: Vec<HeadingJump>,
    pub html_has_title: bool,
    pub feature_heading_error: Option<String>,
    pub missing_diagram_sections: Vec<String>,
}

impl DocumentReport {
    pub fn evaluate(document: &ProjectDescriptionDocument, raw: &str) -> Self {
        let title = document.title().map(str::to_string);
        let title_ok = title
            .as_deref()
            .is_some_and(|t| t.contains(EXPECTED_TITLE));

        let html = document.render_html();
        let html_has_title = !html.is_empty()
            && html
                .split("<h1>")
                .skip(1)
                .filter_map(|rest| rest.split("</h1>").next())
                .any(|h1| h1.contains(EXPECTED_TITLE));

        let feature_heading_error = document
            .check_feature_headings(&FEATURE_HEADINGS)
            .err()
            .map(|e| e.to_string());

        let missing_diagram_sections = DIAGRAM_SECTIONS
            .iter()
            .filter(|name| !document.diagrams().iter().any(|d| d.section == **name))
            .map(|name| name.to_string())
            .collect();

        Self {
            title,
            title_ok,
            fence_delimiters: count_fence_delimiters(raw),
            fences_balanced: fences_balanced(raw),
            heading_jumps: document.heading_level_jumps(),
            html_has_title,
            feature_heading_error,
            missing_diagram_sections,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.title_ok
            && self.fences_balanced
            && self.heading_jumps.is_empty()
            && self.html_has_title
            && self.feature_heading_error.is_none()
            && self.missing_diagram_sections.is_empty()
    }

    /// One line per failed check.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.title_ok {
            problems.push(format!(
                "title {:?} does not contain \"{}\"",
                self.title, EXPECTED_TITLE
            ));
        }
        if !self.fences_balanced {
            problems.push(format!(
                "{} fence delimiter lines, expected an even number",
                self.fence_delimiters
            ));
        }
        for jump in &self.heading_jumps {
            problems.push(format!(
                "heading \"{}\" jumps from level {} to {}",
                jump.heading, jump.previous_level, jump.level
            ));
        }
        if !self.html_has_title {
            problems.push("rendered HTML has no <h1> with the system title".to_string());
        }
        if let Some(error) = &self.feature_heading_error {
            problems.push(error.clone());
        }
        for section in &self.missing_diagram_sections {
            problems.push(format!("no diagram block under \"{}\"", section));
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# 🏭 Automated Multiphase Flow Analyzer System

Intro line.

## 🎯 Key Features

### 🔧 Industrial Control System
- PID loops

### 🔬 Multiphase Analysis Engine

### 🖥️ Professional HMI/SCADA Interface

### 🧪 Automated Sampling Control

## 🏗️ Technical Architecture

```
[PLC] --> [HMI]
```

## 📁 Project Structure

```text
src/
  main.rs
```
";

    #[test]
    fn test_parse_sections_and_title() {
        let doc = ProjectDescriptionDocument::parse(SAMPLE);
        assert_eq!(doc.title(), Some("🏭 Automated Multiphase Flow Analyzer System"));
        assert_eq!(doc.sections().len(), 8);
        assert_eq!(doc.sections()[0].heading.level, 1);
        assert!(doc.sections()[0].body.iter().any(|l| l == "Intro line."));

        let features = doc.section("Industrial Control System").unwrap();
        assert_eq!(features.heading.level, 3);
        assert!(features.body.iter().any(|l| l == "- PID loops"));
    }

    #[test]
    fn test_diagram_blocks_belong_to_sections() {
        let doc = ProjectDescriptionDocument::parse(SAMPLE);
        let diagrams = doc.diagrams();
        assert_eq!(diagrams.len(), 2);
        assert_eq!(diagrams[0].section, "Technical Architecture");
        assert_eq!(diagrams[0].content, "[PLC] --> [HMI]\n");
        assert_eq!(diagrams[1].section, "Project Structure");
        assert_eq!(diagrams[1].info, "text");
        assert!(diagrams[1].content.contains("main.rs"));
    }

    #[test]
    fn test_fence_counting() {
        assert_eq!(count_fence_delimiters(SAMPLE), 4);
        assert!(fences_balanced(SAMPLE));

        let broken = "# T\n\n```\nno close\n";
        assert_eq!(count_fence_delimiters(broken), 1);
        assert!(!fences_balanced(broken));
        // 未閉合的區塊仍可解析
        let doc = ProjectDescriptionDocument::parse(broken);
        assert_eq!(doc.title(), Some("T"));
    }

    #[test]
    fn test_heading_jumps() {
        let doc = ProjectDescriptionDocument::parse(SAMPLE);
        assert!(doc.heading_level_jumps().is_empty());

        let doc = ProjectDescriptionDocument::parse("# A\n\n## B\n\n#### C\n\n## D\n\n# E\n");
        let jumps = doc.heading_level_jumps();
        assert_eq!(
            jumps,
            vec![HeadingJump {
                previous_level: 2,
                level: 4,
                heading: "C".to_string()
            }]
        );
    }

    #[test]
    fn test_render_html_has_title() {
        let doc = ProjectDescriptionDocument::parse(SAMPLE);
        let html = doc.render_html();
        assert!(html.contains("<h1>"));
        assert!(html.contains(EXPECTED_TITLE));
        assert!(html.contains("<pre><code"));
    }

    #[test]
    fn test_feature_heading_order() {
        let doc = ProjectDescriptionDocument::parse(SAMPLE);
        assert!(doc.check_feature_headings(&FEATURE_HEADINGS).is_ok());

        let reversed = [FEATURE_HEADINGS[1], FEATURE_HEADINGS[0]];
        let err = doc.check_feature_headings(&reversed).unwrap_err();
        assert!(err.to_string().contains("out of order"));

        let missing = doc.check_feature_headings(&["Remote Diagnostics"]).unwrap_err();
        assert!(matches!(missing, AnalyzerError::DocumentError { .. }));

        let twice = ProjectDescriptionDocument::parse("# X\n\n## Automated Sampling Control\n\n## Automated Sampling Control\n");
        let err = twice
            .check_feature_headings(&["Automated Sampling Control"])
            .unwrap_err();
        assert!(err.to_string().contains("2 times"));
    }

    #[test]
    fn test_report_on_sample_is_clean() {
        let doc = ProjectDescriptionDocument::parse(SAMPLE);
        let report = DocumentReport::evaluate(&doc, SAMPLE);
        assert!(report.is_clean(), "{:?}", report.problems());
        assert!(report.problems().is_empty());
    }

    #[test]
    fn test_report_lists_problems() {
        let raw = "## Orphan\n\n#### Deep\n\n```\n";
        let doc = ProjectDescriptionDocument::parse(raw);
        let report = DocumentReport::evaluate(&doc, raw);
        assert!(!report.is_clean());
        assert!(!report.title_ok);
        assert!(!report.fences_balanced);
        assert_eq!(report.heading_jumps.len(), 1);
        assert_eq!(report.missing_diagram_sections.len(), 2);
        assert!(report.problems().len() >= 5);
    }

    #[test]
    fn test_from_file_missing_is_document_error() {
        let err = ProjectDescriptionDocument::from_file("/nonexistent/README.md").unwrap_err();
        assert!(matches!(err, AnalyzerError::DocumentError { .. }));
    }
}
