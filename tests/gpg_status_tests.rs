//! Stream-level tests for the GnuPG status decoder.
//!
//! Covers keyword lookup, bounded field splitting, coercion failures and
//! ordering over whole `--status-fd` streams, plus property-based checks
//! with proptest.

use galaxy_gpg::galaxy::gpg::{decode_line, FieldType, StatusFieldError};
use galaxy_gpg::galaxy::{decode_status, GpgRunOutput, GpgStatus, StatusKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn decode_all(text: &str) -> Vec<GpgStatus> {
    decode_status(text).collect::<Result<_, _>>().unwrap()
}

/// A plausible value for a field of the given type.
fn sample_value(ty: FieldType, index: usize) -> String {
    match ty {
        FieldType::Integer => (index * 7 + 1).to_string(),
        FieldType::Text => format!("VALUE{}", index),
    }
}

// ============================================================================
// Registry coverage
// ============================================================================

#[test]
fn test_every_registered_keyword_decodes_its_fields() {
    for kind in StatusKind::ALL {
        let values: Vec<String> = kind
            .fields()
            .iter()
            .enumerate()
            .map(|(i, spec)| sample_value(spec.ty, i))
            .collect();
        let line = format!("[GNUPG:] {} {}", kind.keyword(), values.join(" "));

        let outcomes = decode_all(&line);
        assert_eq!(outcomes.len(), 1, "line: {}", line);
        assert_eq!(outcomes[0].kind(), kind);
        assert_eq!(outcomes[0].status(), kind.keyword());

        let decoded: Vec<String> = outcomes[0]
            .field_values()
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        assert_eq!(decoded, values, "line: {}", line);
    }
}

#[test]
fn test_registry_has_sixteen_entries() {
    assert_eq!(StatusKind::ALL.len(), 16);
    for kind in StatusKind::ALL {
        assert_eq!(StatusKind::from_keyword(kind.keyword()), Some(kind));
    }
}

// ============================================================================
// Skipping
// ============================================================================

#[test]
fn test_unknown_keyword_is_skipped() {
    let text = "[GNUPG:] TOTALLY_UNKNOWN_KEYWORD a b c d\n";
    assert!(decode_all(text).is_empty());
    assert!(decode_line("[GNUPG:] TOTALLY_UNKNOWN_KEYWORD").unwrap().is_none());
}

#[test]
fn test_common_unregistered_keywords_are_skipped() {
    let text = "\
[GNUPG:] NEWSIG
[GNUPG:] GOODSIG ABCDEF0123456789 Alice Example <alice@example.com>
[GNUPG:] VALIDSIG 0123456789ABCDEF0123456789ABCDEF01234567 2024-01-01 1704067200
[GNUPG:] TRUST_ULTIMATE 0 pgp
";
    assert!(decode_all(text).is_empty());
}

#[test]
fn test_empty_stream() {
    assert!(decode_all("").is_empty());
    assert!(decode_all("\n\n   \n").is_empty());
}

// ============================================================================
// Field splitting and coercion
// ============================================================================

#[test]
fn test_last_field_keeps_embedded_spaces() {
    let outcomes = decode_all("[GNUPG:] BADSIG 0123456789ABCDEF Bob  Q.   Example <bob@example.com>\n");

    assert_eq!(
        outcomes,
        vec![GpgStatus::BadSig {
            keyid: "0123456789ABCDEF".to_string(),
            username: "Bob  Q.   Example <bob@example.com>".to_string(),
        }]
    );
}

#[test]
fn test_errsig_fields_are_coerced() {
    let outcomes =
        decode_all("[GNUPG:] ERRSIG ABCDEF0123456789 1 8 00 1700000000 9 0123456789ABCDEF\n");

    assert_eq!(
        outcomes,
        vec![GpgStatus::ErrSig {
            keyid: "ABCDEF0123456789".to_string(),
            pkalgo: 1,
            hashalgo: 8,
            sig_class: "00".to_string(),
            time: 1_700_000_000,
            rc: 9,
            fpr: "0123456789ABCDEF".to_string(),
        }]
    );
}

#[test]
fn test_coercion_failure_is_an_error() {
    let text = "[GNUPG:] NEWSIG\n[GNUPG:] KEYEXPIRED not-a-number\n";
    let err = decode_status(text)
        .collect::<Result<Vec<_>, _>>()
        .unwrap_err();

    assert_eq!(err.line_number, 2);
    assert_eq!(err.line, "[GNUPG:] KEYEXPIRED not-a-number");
    assert!(matches!(
        err.source,
        StatusFieldError::InvalidInteger { field: "timestamp", .. }
    ));
}

#[test]
fn test_coercion_failure_does_not_hide_earlier_outcomes() {
    let text = "[GNUPG:] NO_PUBKEY AAAA\n[GNUPG:] FAILURE verify nope\n";
    let results: Vec<_> = decode_status(text).collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[test]
fn test_missing_field_is_an_error() {
    let err = decode_line("[GNUPG:] ERRSIG ABCDEF0123456789 1 8").unwrap_err();
    assert!(matches!(
        err,
        StatusFieldError::MissingField { keyword: "ERRSIG", field: "sig_class" }
    ));
}

// ============================================================================
// Ordering and end-to-end
// ============================================================================

#[test]
fn test_ordering_preserved() {
    let text = "\
[GNUPG:] KEYEXPIRED 1600000000
[GNUPG:] EXPKEYSIG 0123456789ABCDEF Old Signer
[GNUPG:] KEYREVOKED
";
    let kinds: Vec<StatusKind> = decode_all(text).iter().map(GpgStatus::kind).collect();
    assert_eq!(
        kinds,
        vec![StatusKind::KeyExpired, StatusKind::ExpKeySig, StatusKind::KeyRevoked]
    );
}

#[test]
fn test_no_pubkey_end_to_end() {
    let outcomes = decode_all("[GNUPG:] NO_PUBKEY ABCDEF0123456789");

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status(), "NO_PUBKEY");
    assert_eq!(outcomes[0].key_id(), Some("ABCDEF0123456789"));
    assert!(!outcomes[0].description().is_empty());
}

#[test]
fn test_decoding_ignores_exit_code() {
    let status = "[GNUPG:] NEWSIG\n[GNUPG:] EXPSIG 0123456789ABCDEF Someone\n".to_string();

    for exit_code in [0, 1, 2, -1, 255] {
        let run = GpgRunOutput {
            status: status.clone(),
            exit_code,
        };
        let outcomes: Vec<GpgStatus> = run.outcomes().collect::<Result<_, _>>().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_expiry_warning());
    }

    let empty = GpgRunOutput {
        status: String::new(),
        exit_code: 2,
    };
    assert_eq!(empty.outcomes().count(), 0);
}

#[test]
fn test_outcomes_serialize_with_status_tag() {
    let outcomes = decode_all("[GNUPG:] FAILURE gpg-exit 33554433\n");
    let json = serde_json::to_value(&outcomes).unwrap();

    assert_eq!(
        json,
        serde_json::json!([{"status": "FAILURE", "location": "gpg-exit", "code": 33554433}])
    );
}

// ============================================================================
// Properties
// ============================================================================

/// Strategy for one recognised status line.
fn recognised_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-F0-9]{16}".prop_map(|keyid| format!("[GNUPG:] NO_PUBKEY {}", keyid)),
        ("[A-F0-9]{16}", "[A-Za-z]{1,8}( [A-Za-z<>@.]{1,12}){0,3}")
            .prop_map(|(keyid, user)| format!("[GNUPG:] BADSIG {} {}", keyid, user)),
        any::<u32>().prop_map(|ts| format!("[GNUPG:] KEYEXPIRED {}", ts)),
        Just("[GNUPG:] KEYREVOKED".to_string()),
        Just("[GNUPG:] BADARMOR".to_string()),
        "[a-z_]{1,10}".prop_map(|what| format!("[GNUPG:] NODATA {}", what)),
    ]
}

/// Strategy for a line the decoder skips.
fn skipped_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \\t]{1,4}",
        Just("[GNUPG:] NEWSIG".to_string()),
        "[A-Z]{3,12}".prop_map(|kw| format!("[GNUPG:] X_{} whatever else", kw)),
    ]
}

proptest! {
    #[test]
    fn prop_blank_lines_do_not_change_outcomes(
        lines in proptest::collection::vec(recognised_line(), 0..12),
        blanks in proptest::collection::vec(0usize..3, 0..12),
    ) {
        let plain = lines.join("\n");

        let mut padded = String::new();
        for (i, line) in lines.iter().enumerate() {
            for _ in 0..blanks.get(i).copied().unwrap_or(0) {
                padded.push('\n');
            }
            padded.push_str(line);
            padded.push('\n');
        }

        prop_assert_eq!(decode_all(&plain), decode_all(&padded));
    }

    #[test]
    fn prop_outcomes_follow_input_order(
        lines in proptest::collection::vec(recognised_line(), 0..12),
        noise in proptest::collection::vec(skipped_line(), 0..12),
    ) {
        let mut text = String::new();
        for (i, line) in lines.iter().enumerate() {
            if let Some(skip) = noise.get(i) {
                text.push_str(skip);
                text.push('\n');
            }
            text.push_str(line);
            text.push('\n');
        }

        let expected: Vec<GpgStatus> = lines
            .iter()
            .map(|line| decode_line(line).unwrap().unwrap())
            .collect();
        prop_assert_eq!(decode_all(&text), expected);
    }

    #[test]
    fn prop_decoder_never_panics(text in "\\PC{0,200}") {
        for result in decode_status(&text) {
            let _ = result;
        }
    }
}
