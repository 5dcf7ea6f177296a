//! Signature verification policy for collection manifests
//!
//! Turns decoded GnuPG outcomes into a verdict for one or more detached
//! signatures over the same manifest. This is the only place where a status
//! becomes an error: [`verify_file_signature`] wraps any reported outcome in
//! [`GalaxyError::SignatureRejected`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use super::error::{GalaxyError, GalaxyResult};
use super::gpg::{GpgStatus, GpgVerifier, StatusKind};

static SIGNATURE_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<strict>\+)?(?:(?P<count>\d+)|(?P<all>all))$")
        .expect("Invalid signature count regex")
});

const REASON_WIDTH: usize = 70;
const REASON_BULLET: &str = "    * ";
const REASON_CONTINUATION: &str = "      ";

/// How many signatures must verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredSignatures {
    /// Every non-ignored signature
    All,
    /// At least this many
    Count(usize),
}

/// Parsed `required_valid_signature_count` setting, e.g. `1`, `+2`, `all`, `+all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignatureCountRequirement {
    /// At least one signature must verify, even when none are required
    pub strict: bool,
    pub required: RequiredSignatures,
}

impl Default for SignatureCountRequirement {
    fn default() -> Self {
        Self {
            strict: false,
            required: RequiredSignatures::Count(1),
        }
    }
}

impl FromStr for SignatureCountRequirement {
    type Err = GalaxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SIGNATURE_COUNT_RE.captures(s).ok_or_else(|| {
            GalaxyError::invalid_signature_count(s, "expected a number or 'all', optionally prefixed with '+'")
        })?;

        let strict = caps.name("strict").is_some();
        let required = match caps.name("count") {
            Some(count) => {
                let count: usize = count
                    .as_str()
                    .parse()
                    .map_err(|e| GalaxyError::invalid_signature_count(s, format!("{}", e)))?;
                if count == 0 {
                    return Err(GalaxyError::invalid_signature_count(
                        s,
                        "at least one signature must be required",
                    ));
                }
                RequiredSignatures::Count(count)
            }
            None => RequiredSignatures::All,
        };

        Ok(Self { strict, required })
    }
}

impl fmt::Display for SignatureCountRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.strict {
            write!(f, "+")?;
        }
        match self.required {
            RequiredSignatures::All => write!(f, "all"),
            RequiredSignatures::Count(n) => write!(f, "{}", n),
        }
    }
}

/// Why GnuPG rejected one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFailure {
    /// Descriptions of every reported outcome
    pub reasons: BTreeSet<String>,
    /// Raw status stream
    pub status_output: String,
    /// gpg exit code
    pub exit_code: i32,
    /// Every reported outcome was on the ignore list
    pub ignored: bool,
}

impl SignatureFailure {
    /// Multi-line report for `collection`, suitable for showing to a user.
    pub fn report(&self, collection: &str) -> String {
        if self.reasons.is_empty() {
            return format!(
                "Unexpected error for '{}': GnuPG signature verification failed with the return code {} and output {}",
                collection, self.exit_code, self.status_output
            );
        }

        let mut report = format!(
            "Signature verification failed for '{}' (return code {}):",
            collection, self.exit_code
        );
        for reason in &self.reasons {
            report.push('\n');
            report.push_str(&wrap_reason(reason));
        }
        report
    }
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GnuPG rejected the signature (return code {})", self.exit_code)?;
        if !self.reasons.is_empty() {
            let reasons: Vec<&str> = self.reasons.iter().map(String::as_str).collect();
            write!(f, ": {}", reasons.join("; "))?;
        }
        Ok(())
    }
}

/// Greedy word wrap of one reason into a bullet with hanging indent.
fn wrap_reason(reason: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::from(REASON_BULLET);
    let mut has_words = false;

    for word in reason.split_whitespace() {
        if has_words && current.len() + 1 + word.len() > REASON_WIDTH {
            lines.push(current);
            current = String::from(REASON_CONTINUATION);
            has_words = false;
        }
        if has_words {
            current.push(' ');
        }
        current.push_str(word);
        has_words = true;
    }
    lines.push(current);

    lines.join("\n")
}

/// Verify one detached signature over `manifest`.
///
/// Any registered outcome in gpg's status stream rejects the signature, as
/// does a non-zero exit code without one. Rejections come back as
/// [`GalaxyError::SignatureRejected`]; the failure is marked `ignored` when
/// every outcome's status code is in `ignore_codes`.
pub async fn verify_file_signature(
    verifier: &GpgVerifier,
    manifest: &Path,
    signature: &str,
    ignore_codes: &[StatusKind],
) -> GalaxyResult<()> {
    let run = verifier.verify(manifest, signature).await?;
    let outcomes = run.outcomes().collect::<Result<Vec<GpgStatus>, _>>()?;

    if !outcomes.is_empty() {
        let ignored = outcomes
            .iter()
            .filter(|outcome| ignore_codes.contains(&outcome.kind()))
            .count();

        return Err(GalaxyError::SignatureRejected(SignatureFailure {
            reasons: outcomes.iter().map(GpgStatus::description).collect(),
            status_output: run.status,
            exit_code: run.exit_code,
            ignored: ignored == outcomes.len(),
        }));
    }

    if !run.success() {
        return Err(GalaxyError::SignatureRejected(SignatureFailure {
            reasons: BTreeSet::new(),
            status_output: run.status,
            exit_code: run.exit_code,
            ignored: false,
        }));
    }

    Ok(())
}

/// Outcome of checking every signature of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureReport {
    /// Collection name, e.g. `namespace.collection`
    pub collection: String,
    /// The requirement the signatures were held to
    pub requirement: SignatureCountRequirement,
    /// Number of signatures supplied
    pub total: usize,
    /// Signatures that verified
    pub successful: usize,
    /// Signatures whose failures were all on the ignore list
    pub ignored: usize,
    /// Reports for signatures that failed
    pub failures: Vec<String>,
    /// Final verdict
    pub verified: bool,
    /// Why verification failed, if it did
    pub summary: Option<String>,
}

/// Verify `signatures` over `manifest` against `requirement`.
///
/// Signatures are checked in order. Ignored failures count neither way.
/// With a numeric requirement, checking stops once enough signatures have
/// verified. GnuPG spawn, timeout and decode errors abort immediately.
pub async fn verify_file_signatures<S: AsRef<str>>(
    verifier: &GpgVerifier,
    collection: &str,
    manifest: &Path,
    signatures: &[S],
    requirement: SignatureCountRequirement,
    ignore_codes: &[StatusKind],
) -> GalaxyResult<SignatureReport> {
    let mut successful = 0;
    let mut ignored = 0;
    let mut failures = Vec::new();

    for (index, signature) in signatures.iter().enumerate() {
        match verify_file_signature(verifier, manifest, signature.as_ref(), ignore_codes).await {
            Ok(()) => {
                successful += 1;
                debug!(collection = %collection, signature = index, "Signature verified");

                if let RequiredSignatures::Count(count) = requirement.required {
                    if successful == count {
                        break;
                    }
                }
            }
            Err(GalaxyError::SignatureRejected(failure)) if failure.ignored => {
                ignored += 1;
                debug!(
                    collection = %collection,
                    signature = index,
                    reasons = ?failure.reasons,
                    "Ignoring signature failure"
                );
            }
            Err(GalaxyError::SignatureRejected(failure)) => {
                debug!(collection = %collection, signature = index, "Signature rejected");
                failures.push(failure.report(collection));
            }
            Err(e) => return Err(e),
        }
    }

    let failure_reason = if requirement.strict && successful == 0 {
        Some("no successful signatures")
    } else {
        match requirement.required {
            RequiredSignatures::All if !failures.is_empty() => Some("some signatures failed"),
            RequiredSignatures::Count(count) if !signatures.is_empty() && successful != count => {
                Some("fewer successful signatures than required")
            }
            _ => None,
        }
    };
    let summary = failure_reason
        .map(|reason| format!("Signature verification failed for '{}': {}", collection, reason));

    let verified = summary.is_none();
    match &summary {
        Some(message) => {
            info!("{}", message);
            for failure in &failures {
                debug!("{}", failure);
            }
        }
        None => debug!(collection = %collection, successful, "Signature requirement met"),
    }

    Ok(SignatureReport {
        collection: collection.to_string(),
        requirement,
        total: signatures.len(),
        successful,
        ignored,
        failures,
        verified,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_signature_counts() {
        let parsed: SignatureCountRequirement = "1".parse().unwrap();
        assert_eq!(parsed, SignatureCountRequirement::default());

        let parsed: SignatureCountRequirement = "+3".parse().unwrap();
        assert!(parsed.strict);
        assert_eq!(parsed.required, RequiredSignatures::Count(3));

        let parsed: SignatureCountRequirement = "+all".parse().unwrap();
        assert!(parsed.strict);
        assert_eq!(parsed.required, RequiredSignatures::All);

        let parsed: SignatureCountRequirement = "all".parse().unwrap();
        assert!(!parsed.strict);
    }

    #[test]
    fn test_reject_bad_signature_counts() {
        for value in ["", "0", "+0", "-1", "ALL", "1+", "two", "+ 1"] {
            let err = value.parse::<SignatureCountRequirement>().unwrap_err();
            assert!(
                matches!(err, GalaxyError::InvalidSignatureCount { .. }),
                "{:?} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_signature_count_display_round_trips() {
        for value in ["1", "+2", "all", "+all"] {
            let parsed: SignatureCountRequirement = value.parse().unwrap();
            assert_eq!(parsed.to_string(), value);
        }
    }

    #[test]
    fn test_report_with_reasons() {
        let failure = SignatureFailure {
            reasons: [
                StatusKind::NoPubkey.description(),
                StatusKind::ErrSig.description(),
            ]
            .into_iter()
            .collect(),
            status_output: String::new(),
            exit_code: 2,
            ignored: false,
        };

        let report = failure.report("namespace.collection");
        assert_eq!(
            report,
            "Signature verification failed for 'namespace.collection' (return code 2):\n\
             \x20   * It was not possible to check the signature. This may be caused\n\
             \x20     by a missing public key or an unsupported algorithm. A RC of 4\n\
             \x20     indicates unknown algorithm, a 9 indicates a missing public key.\n\
             \x20   * The public key is not available."
        );
        // the header is never wrapped
        for line in report.lines().skip(1) {
            assert!(line.len() <= REASON_WIDTH, "line too long: {:?}", line);
        }
    }

    #[test]
    fn test_report_without_reasons() {
        let failure = SignatureFailure {
            reasons: BTreeSet::new(),
            status_output: "[GNUPG:] NEWSIG".to_string(),
            exit_code: 2,
            ignored: false,
        };
        assert_eq!(
            failure.report("ns.coll"),
            "Unexpected error for 'ns.coll': GnuPG signature verification failed with the return code 2 and output [GNUPG:] NEWSIG"
        );
    }

    #[test]
    fn test_wrap_short_reason() {
        assert_eq!(
            wrap_reason("The key has expired."),
            "    * The key has expired."
        );
    }
}
