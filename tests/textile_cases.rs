use serde::Deserialize;
use std::fs;
use textile::{ListState, Options, Parser, textile_to_html};

#[derive(Debug, Deserialize)]
struct Case {
    name: String,
    section: String,
    textile: String,
    html: String,
}

#[test]
fn textile_cases() {
    let data = fs::read_to_string("tests/data/cases.json").expect("Failed to read cases.json");
    let cases: Vec<Case> = serde_json::from_str(&data).expect("Failed to parse cases.json");

    let mut failures = Vec::new();
    for case in &cases {
        let result = textile_to_html(&case.textile);
        if result != case.html {
            eprintln!("\nCase '{}' failed ({})", case.name, case.section);
            eprintln!("  Input: {:?}", case.textile);
            eprintln!("  Expected: {:?}", case.html);
            eprintln!("  Got: {:?}", result);
            failures.push(case.name.as_str());
        }
    }

    eprintln!(
        "\nTextile cases: {} passed, {} failed",
        cases.len() - failures.len(),
        failures.len()
    );
    assert!(failures.is_empty(), "failed cases: {failures:?}");
}

#[test]
fn list_numbering_continues_between_documents() {
    let parser = Parser::new(Options::default());
    let mut lists = ListState::new();
    let first = parser.parse_with_state("# one\n# two", &mut lists);
    let second = parser.parse_with_state("#_ three\n# four", &mut lists);
    assert_eq!(
        textile::render(&first),
        "<ol>\n\t<li>one</li>\n\t<li>two</li>\n</ol>"
    );
    assert_eq!(
        textile::render(&second),
        "<ol start=\"3\">\n\t<li>three</li>\n\t<li>four</li>\n</ol>"
    );
}

#[test]
fn jsonml_survives_serialization() {
    let document = textile::parse("p(intro). *Hi* there");
    let json: Vec<serde_json::Value> = document.iter().map(|n| n.to_jsonml()).collect();
    let text = serde_json::to_string(&json).unwrap();
    let values: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    let restored: Vec<textile::Node> = values
        .iter()
        .map(|v| textile::Node::from_jsonml(v).unwrap())
        .collect();
    assert_eq!(restored, document);
}
