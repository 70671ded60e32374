use multiphase_analyzer::document::{
    count_fence_delimiters, fences_balanced, DocumentReport, ProjectDescriptionDocument,
    DIAGRAM_SECTIONS, EXPECTED_TITLE, FEATURE_HEADINGS,
};

const README: &str = include_str!("../README.md");

fn readme() -> ProjectDescriptionDocument {
    ProjectDescriptionDocument::parse(README)
}

#[test]
fn test_readme_fences_are_balanced() {
    assert!(count_fence_delimiters(README) > 0);
    assert!(fences_balanced(README));
}

#[test]
fn test_readme_heading_levels_do_not_skip() {
    let jumps = readme().heading_level_jumps();
    assert!(jumps.is_empty(), "heading jumps: {:?}", jumps);
}

#[test]
fn test_readme_renders_title_as_h1() {
    let doc = readme();
    let html = doc.render_html();
    assert!(!html.is_empty());
    assert!(html.contains("<h1>"));
    assert!(doc.title().unwrap().contains(EXPECTED_TITLE));
}

#[test]
fn test_readme_feature_headings_in_order() {
    let doc = readme();
    assert!(doc.check_feature_headings(&FEATURE_HEADINGS).is_ok());
    for name in FEATURE_HEADINGS {
        assert_eq!(doc.section(name).unwrap().heading.level, 3);
    }
}

#[test]
fn test_readme_diagrams_are_captured() {
    let doc = readme();
    for section in DIAGRAM_SECTIONS {
        let diagram = doc
            .diagrams()
            .iter()
            .find(|d| d.section == section)
            .unwrap_or_else(|| panic!("no diagram under {}", section));
        assert!(!diagram.content.trim().is_empty());
    }
    let structure = doc
        .diagrams()
        .iter()
        .find(|d| d.section == "Project Structure")
        .unwrap();
    assert!(structure.content.contains("Cargo.toml"));
}

#[test]
fn test_readme_report_is_clean() {
    let report = DocumentReport::evaluate(&readme(), README);
    assert!(report.is_clean(), "problems: {:?}", report.problems());
}

#[test]
fn test_readme_from_file_matches_embedded_copy() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("README.md");
    let doc = ProjectDescriptionDocument::from_file(path).unwrap();
    assert_eq!(doc, readme());
}
