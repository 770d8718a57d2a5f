#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

// ============================================================================
// Parameterized compression parsing tests
// ============================================================================

#[test_case("deflate", Some(Compression::Deflate))]
#[test_case("DEFLATE", Some(Compression::Deflate))]
#[test_case("deflated", Some(Compression::Deflate))]
#[test_case("store", Some(Compression::Store))]
#[test_case(" Stored ", Some(Compression::Store))]
#[test_case("bzip2", None)]
#[test_case("", None)]
fn Compression___parse___maps_names(input: &str, expected: Option<Compression>) {
    assert_eq!(Compression::parse(input), expected);
}

// ============================================================================
// Parameterized reproducible flag tests
// ============================================================================

#[test_case(None, false)]
#[test_case(Some("true"), true)]
#[test_case(Some("false"), false)]
#[test_case(Some("FALSE"), false)]
#[test_case(Some(""), false)]
#[test_case(Some("1700000000"), true)]
#[test_case(Some("2024-01-01T00:00:00Z"), true)]
fn ArchiveConfig___is_reproducible___reflects_timestamp(value: Option<&str>, expected: bool) {
    let config = ArchiveConfig {
        reproducible: value.map(String::from),
        ..ArchiveConfig::default()
    };

    assert_eq!(config.is_reproducible(), expected);
}
