//! Artifact round-trips and build determinism.

use lltab::{compile, Artifact, Parser};

const ARITH: &str = r#"E = E "+" T | T; T = "(" E ")" | /[0-9]+/;"#;

#[test]
fn test_encode_decode_round_trip() {
    let artifact = compile(ARITH, "E").unwrap();
    let bytes = artifact.encode().unwrap();
    let decoded = Artifact::decode(&bytes).unwrap();

    assert_eq!(decoded.matchers, artifact.matchers);
    assert_eq!(decoded.table, artifact.table);
    assert_eq!(decoded.table.start(), artifact.table.start());
    // Names are build-side only.
    assert!(decoded.non_terminal_names.is_empty());
}

#[test]
fn test_builds_are_byte_identical() {
    let first = compile(ARITH, "E").unwrap().encode().unwrap();
    let second = compile(ARITH, "E").unwrap().encode().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_encoding_is_canonical() {
    let bytes = compile(ARITH, "E").unwrap().encode().unwrap();
    let reencoded = Artifact::decode(&bytes).unwrap().encode().unwrap();
    assert_eq!(bytes, reencoded);
}

#[test]
fn test_decoded_artifact_parses() {
    let bytes = compile(ARITH, "E").unwrap().encode().unwrap();
    let artifact = Artifact::decode(&bytes).unwrap();

    for input in ["1", "1+2", "(1+2)+3", "12+(34+5)"] {
        let mut parser = Parser::new(&artifact, input.as_bytes()).unwrap();
        assert!(parser.parse().is_ok(), "should accept {input:?}");
    }
    for input in ["", "1+", "(1", "1)"] {
        let mut parser = Parser::new(&artifact, input.as_bytes()).unwrap();
        assert!(parser.parse().is_err(), "should reject {input:?}");
    }
}

#[test]
fn test_exclusion_lists_round_trip() {
    let artifact = compile(
        r#"X = [/[a-z]+/ Keywords] | "let" | "if"; Keywords = "let" | "if";"#,
        "X",
    )
    .unwrap();
    let decoded = Artifact::decode(&artifact.encode().unwrap()).unwrap();
    let excluded = decoded
        .matchers
        .iter()
        .find_map(|m| match m {
            lltab::Terminal::RegexExclude { excludes, .. } => Some(excludes.clone()),
            _ => None,
        })
        .expect("regex-exclude matcher survives the round trip");
    assert_eq!(excluded.as_slice(), [1, 2]);

    // The decoded artifact still refuses keywords as identifiers.
    let mut parser = Parser::new(&decoded, "while".as_bytes()).unwrap();
    assert!(parser.parse().is_ok());
}

#[test]
fn test_header_names_cover_table_ids() {
    let artifact = compile(ARITH, "E").unwrap();
    assert!(artifact.non_terminal_names.iter().any(|n| n == "E"));
    assert!(artifact.non_terminal_names.iter().any(|n| n == "T"));
    // Every name is unique; ids are dense.
    let mut names = artifact.non_terminal_names.clone();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), artifact.non_terminal_names.len());
}
