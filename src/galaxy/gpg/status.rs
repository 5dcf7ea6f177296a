//! Decoder for the GnuPG `--status-fd` protocol
//!
//! GnuPG reports what happened during a verification as a stream of
//! machine-readable lines on a dedicated file descriptor:
//!
//! ```text
//! [GNUPG:] NEWSIG
//! [GNUPG:] ERRSIG 3D2C4F5A6B7C8D9E 1 8 00 1700000000 9 -
//! [GNUPG:] NO_PUBKEY 3D2C4F5A6B7C8D9E
//! ```
//!
//! Each line is a protocol marker, a status keyword and zero or more
//! whitespace-separated arguments. Only the keywords in the status registry
//! are decoded; everything else is skipped so that newer GnuPG releases can
//! add keywords without breaking verification.

use std::collections::HashMap;
use std::fmt;
use std::iter::{Enumerate, FusedIterator};
use std::num::ParseIntError;
use std::str::{FromStr, Lines};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::trace;

/// Declared type of a status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Passed through as-is
    Text,
    /// Must parse as a base-10 integer
    Integer,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
        }
    }
}

/// One declared argument of a status keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Argument name
    pub name: &'static str,
    /// Argument type
    #[serde(rename = "type")]
    pub ty: FieldType,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Text,
    }
}

const fn integer(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Integer,
    }
}

const NO_FIELDS: &[FieldSpec] = &[];
const KEYID_FIELDS: &[FieldSpec] = &[text("keyid")];
const SIGNER_FIELDS: &[FieldSpec] = &[text("keyid"), text("username")];
const ERRSIG_FIELDS: &[FieldSpec] = &[
    text("keyid"),
    integer("pkalgo"),
    integer("hashalgo"),
    text("sig_class"),
    integer("time"),
    integer("rc"),
    text("fpr"),
];
const WHAT_FIELDS: &[FieldSpec] = &[text("what")];
const ERROR_FIELDS: &[FieldSpec] = &[text("location"), integer("code"), text("more")];
const FAILURE_FIELDS: &[FieldSpec] = &[text("location"), integer("code")];
const TIMESTAMP_FIELDS: &[FieldSpec] = &[integer("timestamp")];

/// The status keywords this decoder understands.
///
/// The keyword strings and argument lists mirror the GnuPG status protocol
/// and must stay in sync with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKind {
    ExpSig,
    ExpKeySig,
    RevKeySig,
    BadSig,
    ErrSig,
    NoPubkey,
    MissingPassphrase,
    BadPassphrase,
    NoData,
    Unexpected,
    Error,
    Failure,
    BadArmor,
    KeyExpired,
    KeyRevoked,
    NoSecKey,
}

static STATUS_REGISTRY: Lazy<HashMap<&'static str, StatusKind>> = Lazy::new(|| {
    StatusKind::ALL
        .iter()
        .map(|kind| (kind.keyword(), *kind))
        .collect()
});

/// Keyword to kind mapping for every registered status keyword.
pub fn status_registry() -> &'static HashMap<&'static str, StatusKind> {
    &STATUS_REGISTRY
}

impl StatusKind {
    /// Every registered kind, in registry order.
    pub const ALL: [StatusKind; 16] = [
        StatusKind::ExpSig,
        StatusKind::ExpKeySig,
        StatusKind::RevKeySig,
        StatusKind::BadSig,
        StatusKind::ErrSig,
        StatusKind::NoPubkey,
        StatusKind::MissingPassphrase,
        StatusKind::BadPassphrase,
        StatusKind::NoData,
        StatusKind::Unexpected,
        StatusKind::Error,
        StatusKind::Failure,
        StatusKind::BadArmor,
        StatusKind::KeyExpired,
        StatusKind::KeyRevoked,
        StatusKind::NoSecKey,
    ];

    /// Look up a keyword in the status registry (exact, case-sensitive).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        STATUS_REGISTRY.get(keyword).copied()
    }

    /// The status keyword as it appears on the wire.
    pub fn keyword(self) -> &'static str {
        match self {
            StatusKind::ExpSig => "EXPSIG",
            StatusKind::ExpKeySig => "EXPKEYSIG",
            StatusKind::RevKeySig => "REVKEYSIG",
            StatusKind::BadSig => "BADSIG",
            StatusKind::ErrSig => "ERRSIG",
            StatusKind::NoPubkey => "NO_PUBKEY",
            StatusKind::MissingPassphrase => "MISSING_PASSPHRASE",
            StatusKind::BadPassphrase => "BAD_PASSPHRASE",
            StatusKind::NoData => "NODATA",
            StatusKind::Unexpected => "UNEXPECTED",
            StatusKind::Error => "ERROR",
            StatusKind::Failure => "FAILURE",
            StatusKind::BadArmor => "BADARMOR",
            StatusKind::KeyExpired => "KEYEXPIRED",
            StatusKind::KeyRevoked => "KEYREVOKED",
            StatusKind::NoSecKey => "NO_SECKEY",
        }
    }

    /// Declared arguments following the keyword, in wire order.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            StatusKind::ExpSig
            | StatusKind::ExpKeySig
            | StatusKind::RevKeySig
            | StatusKind::BadSig => SIGNER_FIELDS,
            StatusKind::ErrSig => ERRSIG_FIELDS,
            StatusKind::NoPubkey | StatusKind::BadPassphrase | StatusKind::NoSecKey => {
                KEYID_FIELDS
            }
            StatusKind::MissingPassphrase | StatusKind::BadArmor | StatusKind::KeyRevoked => {
                NO_FIELDS
            }
            StatusKind::NoData | StatusKind::Unexpected => WHAT_FIELDS,
            StatusKind::Error => ERROR_FIELDS,
            StatusKind::Failure => FAILURE_FIELDS,
            StatusKind::KeyExpired => TIMESTAMP_FIELDS,
        }
    }

    fn documentation(self) -> &'static str {
        match self {
            StatusKind::ExpSig => {
                "The signature with the keyid is good,
                 but the signature is expired."
            }
            StatusKind::ExpKeySig => {
                "The signature with the keyid is good,
                 but the signature was made by an expired key."
            }
            StatusKind::RevKeySig => {
                "The signature with the keyid is good,
                 but the signature was made by a revoked key."
            }
            StatusKind::BadSig => "The signature with the keyid has not been verified okay.",
            StatusKind::ErrSig => {
                "It was not possible to check the signature.  This may be
                 caused by a missing public key or an unsupported algorithm.
                 A RC of 4 indicates unknown algorithm, a 9 indicates a
                 missing public key."
            }
            StatusKind::NoPubkey => "The public key is not available.",
            StatusKind::MissingPassphrase => "No passphrase was supplied.",
            StatusKind::BadPassphrase => "The supplied passphrase was wrong or not given.",
            StatusKind::NoData => {
                "No data has been found.  Codes for WHAT are:
                 - 1 :: No armored data.
                 - 2 :: Expected a packet but did not find one.
                 - 3 :: Invalid packet found, this may indicate a non OpenPGP
                        message.
                 - 4 :: Signature expected but not found."
            }
            StatusKind::Unexpected => {
                "Unexpected data has been encountered.  Codes for WHAT are:
                 - 0 :: Not further specified."
            }
            StatusKind::Error => {
                "This is a generic error status message, it might be
                 followed by error location specific data."
            }
            StatusKind::Failure => {
                "This is the counterpart to SUCCESS and used to indicate
                 a program failure."
            }
            StatusKind::BadArmor => "The ASCII armor is corrupted.",
            StatusKind::KeyExpired => "The key has expired.",
            StatusKind::KeyRevoked => "The used key has been revoked by its owner.",
            StatusKind::NoSecKey => "The secret key is not available.",
        }
    }

    /// Human-readable explanation with all internal whitespace collapsed.
    pub fn description(self) -> String {
        self.documentation()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl Serialize for StatusKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.keyword())
    }
}

/// A keyword that is not in the status registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a known GnuPG status code")]
pub struct UnknownStatusKeyword(pub String);

impl FromStr for StatusKind {
    type Err = UnknownStatusKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| UnknownStatusKeyword(s.to_string()))
    }
}

/// Failure to build a [`GpgStatus`] from captured arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusFieldError {
    #[error("{keyword} is missing its '{field}' argument")]
    MissingField {
        keyword: &'static str,
        field: &'static str,
    },

    #[error("{keyword} argument '{field}' must be an integer, got '{value}': {source}")]
    InvalidInteger {
        keyword: &'static str,
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("{keyword} takes {expected} argument(s), got unexpected '{value}'")]
    UnexpectedField {
        keyword: &'static str,
        expected: usize,
        value: String,
    },
}

/// A malformed line in a status stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed GnuPG status line {line_number} ('{line}'): {source}")]
pub struct StatusDecodeError {
    /// 1-based line number within the stream
    pub line_number: usize,
    /// The offending line
    pub line: String,
    /// What was wrong with it
    #[source]
    pub source: StatusFieldError,
}

/// One decoded status line.
///
/// Field names follow the GnuPG status protocol. Serializes as an object
/// tagged with the wire keyword, e.g. `{"status": "NO_PUBKEY", "keyid": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum GpgStatus {
    #[serde(rename = "EXPSIG")]
    ExpSig { keyid: String, username: String },

    #[serde(rename = "EXPKEYSIG")]
    ExpKeySig { keyid: String, username: String },

    #[serde(rename = "REVKEYSIG")]
    RevKeySig { keyid: String, username: String },

    #[serde(rename = "BADSIG")]
    BadSig { keyid: String, username: String },

    #[serde(rename = "ERRSIG")]
    ErrSig {
        keyid: String,
        pkalgo: u32,
        hashalgo: u32,
        sig_class: String,
        time: i64,
        rc: u32,
        fpr: String,
    },

    #[serde(rename = "NO_PUBKEY")]
    NoPubkey { keyid: String },

    #[serde(rename = "MISSING_PASSPHRASE")]
    MissingPassphrase,

    #[serde(rename = "BAD_PASSPHRASE")]
    BadPassphrase { keyid: String },

    #[serde(rename = "NODATA")]
    NoData { what: String },

    #[serde(rename = "UNEXPECTED")]
    Unexpected { what: String },

    /// `more` is optional on the wire; GnuPG usually omits it.
    #[serde(rename = "ERROR")]
    Error {
        location: String,
        code: u32,
        more: Option<String>,
    },

    #[serde(rename = "FAILURE")]
    Failure { location: String, code: u32 },

    #[serde(rename = "BADARMOR")]
    BadArmor,

    #[serde(rename = "KEYEXPIRED")]
    KeyExpired { timestamp: i64 },

    #[serde(rename = "KEYREVOKED")]
    KeyRevoked,

    #[serde(rename = "NO_SECKEY")]
    NoSecKey { keyid: String },
}

/// Pulls declared arguments off an iterator, coercing as it goes.
struct FieldReader<I> {
    kind: StatusKind,
    values: I,
}

impl<'a, I: Iterator<Item = &'a str>> FieldReader<I> {
    fn raw(&mut self, field: &'static str) -> Result<&'a str, StatusFieldError> {
        self.values.next().ok_or(StatusFieldError::MissingField {
            keyword: self.kind.keyword(),
            field,
        })
    }

    fn text(&mut self, field: &'static str) -> Result<String, StatusFieldError> {
        self.raw(field).map(str::to_string)
    }

    fn optional_text(&mut self) -> Option<String> {
        self.values.next().map(str::to_string)
    }

    fn integer<T>(&mut self, field: &'static str) -> Result<T, StatusFieldError>
    where
        T: FromStr<Err = ParseIntError>,
    {
        let value = self.raw(field)?;
        value
            .trim()
            .parse()
            .map_err(|source| StatusFieldError::InvalidInteger {
                keyword: self.kind.keyword(),
                field,
                value: value.to_string(),
                source,
            })
    }

    fn finish(mut self) -> Result<(), StatusFieldError> {
        match self.values.next() {
            Some(extra) => Err(StatusFieldError::UnexpectedField {
                keyword: self.kind.keyword(),
                expected: self.kind.fields().len(),
                value: extra.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl GpgStatus {
    /// Build a status from its captured arguments (keyword excluded), in
    /// declared order. Every argument is coerced to its declared type.
    pub fn from_fields<'a, I>(kind: StatusKind, values: I) -> Result<Self, StatusFieldError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut f = FieldReader {
            kind,
            values: values.into_iter(),
        };

        let status = match kind {
            StatusKind::ExpSig => GpgStatus::ExpSig {
                keyid: f.text("keyid")?,
                username: f.text("username")?,
            },
            StatusKind::ExpKeySig => GpgStatus::ExpKeySig {
                keyid: f.text("keyid")?,
                username: f.text("username")?,
            },
            StatusKind::RevKeySig => GpgStatus::RevKeySig {
                keyid: f.text("keyid")?,
                username: f.text("username")?,
            },
            StatusKind::BadSig => GpgStatus::BadSig {
                keyid: f.text("keyid")?,
                username: f.text("username")?,
            },
            StatusKind::ErrSig => GpgStatus::ErrSig {
                keyid: f.text("keyid")?,
                pkalgo: f.integer("pkalgo")?,
                hashalgo: f.integer("hashalgo")?,
                sig_class: f.text("sig_class")?,
                time: f.integer("time")?,
                rc: f.integer("rc")?,
                fpr: f.text("fpr")?,
            },
            StatusKind::NoPubkey => GpgStatus::NoPubkey {
                keyid: f.text("keyid")?,
            },
            StatusKind::MissingPassphrase => GpgStatus::MissingPassphrase,
            StatusKind::BadPassphrase => GpgStatus::BadPassphrase {
                keyid: f.text("keyid")?,
            },
            StatusKind::NoData => GpgStatus::NoData {
                what: f.text("what")?,
            },
            StatusKind::Unexpected => GpgStatus::Unexpected {
                what: f.text("what")?,
            },
            StatusKind::Error => GpgStatus::Error {
                location: f.text("location")?,
                code: f.integer("code")?,
                more: f.optional_text(),
            },
            StatusKind::Failure => GpgStatus::Failure {
                location: f.text("location")?,
                code: f.integer("code")?,
            },
            StatusKind::BadArmor => GpgStatus::BadArmor,
            StatusKind::KeyExpired => GpgStatus::KeyExpired {
                timestamp: f.integer("timestamp")?,
            },
            StatusKind::KeyRevoked => GpgStatus::KeyRevoked,
            StatusKind::NoSecKey => GpgStatus::NoSecKey {
                keyid: f.text("keyid")?,
            },
        };

        f.finish()?;
        Ok(status)
    }

    /// Which registry entry this status belongs to.
    pub fn kind(&self) -> StatusKind {
        match self {
            GpgStatus::ExpSig { .. } => StatusKind::ExpSig,
            GpgStatus::ExpKeySig { .. } => StatusKind::ExpKeySig,
            GpgStatus::RevKeySig { .. } => StatusKind::RevKeySig,
            GpgStatus::BadSig { .. } => StatusKind::BadSig,
            GpgStatus::ErrSig { .. } => StatusKind::ErrSig,
            GpgStatus::NoPubkey { .. } => StatusKind::NoPubkey,
            GpgStatus::MissingPassphrase => StatusKind::MissingPassphrase,
            GpgStatus::BadPassphrase { .. } => StatusKind::BadPassphrase,
            GpgStatus::NoData { .. } => StatusKind::NoData,
            GpgStatus::Unexpected { .. } => StatusKind::Unexpected,
            GpgStatus::Error { .. } => StatusKind::Error,
            GpgStatus::Failure { .. } => StatusKind::Failure,
            GpgStatus::BadArmor => StatusKind::BadArmor,
            GpgStatus::KeyExpired { .. } => StatusKind::KeyExpired,
            GpgStatus::KeyRevoked => StatusKind::KeyRevoked,
            GpgStatus::NoSecKey { .. } => StatusKind::NoSecKey,
        }
    }

    /// The wire keyword, e.g. `"BADSIG"`.
    pub fn status(&self) -> &'static str {
        self.kind().keyword()
    }

    pub fn description(&self) -> String {
        self.kind().description()
    }

    /// Key ID carried by the status, if any.
    pub fn key_id(&self) -> Option<&str> {
        match self {
            GpgStatus::ExpSig { keyid, .. }
            | GpgStatus::ExpKeySig { keyid, .. }
            | GpgStatus::RevKeySig { keyid, .. }
            | GpgStatus::BadSig { keyid, .. }
            | GpgStatus::ErrSig { keyid, .. }
            | GpgStatus::NoPubkey { keyid }
            | GpgStatus::BadPassphrase { keyid }
            | GpgStatus::NoSecKey { keyid } => Some(keyid),
            _ => None,
        }
    }

    /// Whether this status only reports an expiry of an otherwise good signature.
    pub fn is_expiry_warning(&self) -> bool {
        matches!(
            self,
            GpgStatus::ExpSig { .. } | GpgStatus::ExpKeySig { .. } | GpgStatus::KeyExpired { .. }
        )
    }

    /// Point in time carried by the status (signature time or key expiry).
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            GpgStatus::ErrSig { time, .. } => DateTime::from_timestamp(*time, 0),
            GpgStatus::KeyExpired { timestamp } => DateTime::from_timestamp(*timestamp, 0),
            _ => None,
        }
    }

    /// Argument names and values in wire order, keyword excluded.
    pub fn field_values(&self) -> Vec<(&'static str, String)> {
        let values: Vec<String> = match self {
            GpgStatus::ExpSig { keyid, username }
            | GpgStatus::ExpKeySig { keyid, username }
            | GpgStatus::RevKeySig { keyid, username }
            | GpgStatus::BadSig { keyid, username } => vec![keyid.clone(), username.clone()],
            GpgStatus::ErrSig {
                keyid,
                pkalgo,
                hashalgo,
                sig_class,
                time,
                rc,
                fpr,
            } => vec![
                keyid.clone(),
                pkalgo.to_string(),
                hashalgo.to_string(),
                sig_class.clone(),
                time.to_string(),
                rc.to_string(),
                fpr.clone(),
            ],
            GpgStatus::NoPubkey { keyid }
            | GpgStatus::BadPassphrase { keyid }
            | GpgStatus::NoSecKey { keyid } => vec![keyid.clone()],
            GpgStatus::NoData { what } | GpgStatus::Unexpected { what } => vec![what.clone()],
            GpgStatus::Error {
                location,
                code,
                more,
            } => {
                let mut values = vec![location.clone(), code.to_string()];
                values.extend(more.clone());
                values
            }
            GpgStatus::Failure { location, code } => vec![location.clone(), code.to_string()],
            GpgStatus::KeyExpired { timestamp } => vec![timestamp.to_string()],
            GpgStatus::MissingPassphrase | GpgStatus::BadArmor | GpgStatus::KeyRevoked => {
                Vec::new()
            }
        };

        self.kind()
            .fields()
            .iter()
            .map(|spec| spec.name)
            .zip(values)
            .collect()
    }
}

impl fmt::Display for GpgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status())?;
        for (_, value) in self.field_values() {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

/// Split on runs of whitespace into at most `max_parts` pieces; the last
/// piece keeps its internal whitespace.
fn split_fields(s: &str, max_parts: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    if max_parts == 0 {
        return parts;
    }

    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() + 1 == max_parts {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }

    parts
}

/// Decode a single status line.
///
/// Returns `Ok(None)` for blank lines, lines without a keyword and
/// keywords that are not registered.
pub fn decode_line(line: &str) -> Result<Option<GpgStatus>, StatusFieldError> {
    let parts = split_fields(line.trim_end(), 3);
    let Some(&keyword) = parts.get(1) else {
        return Ok(None);
    };

    let Some(kind) = StatusKind::from_keyword(keyword) else {
        trace!(keyword = %keyword, "Skipping unrecognised GnuPG status keyword");
        return Ok(None);
    };

    let arity = kind.fields().len();
    let values = match parts.get(2) {
        Some(remainder) if arity > 0 => split_fields(remainder, arity),
        Some(remainder) => {
            trace!(keyword = %keyword, remainder = %remainder, "Ignoring arguments of argument-less status");
            Vec::new()
        }
        None => Vec::new(),
    };

    GpgStatus::from_fields(kind, values).map(Some)
}

/// Lazy, single-pass decoder over a status stream.
///
/// Yields one item per recognised line, in input order. A line that matches
/// a registered keyword but fails coercion yields an `Err`.
#[derive(Debug, Clone)]
pub struct StatusDecoder<'a> {
    lines: Enumerate<Lines<'a>>,
}

impl<'a> StatusDecoder<'a> {
    pub fn new(status_output: &'a str) -> Self {
        Self {
            lines: status_output.lines().enumerate(),
        }
    }
}

impl Iterator for StatusDecoder<'_> {
    type Item = Result<GpgStatus, StatusDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, line) in self.lines.by_ref() {
            match decode_line(line) {
                Ok(Some(status)) => return Some(Ok(status)),
                Ok(None) => continue,
                Err(source) => {
                    return Some(Err(StatusDecodeError {
                        line_number: index + 1,
                        line: line.to_string(),
                        source,
                    }))
                }
            }
        }
        None
    }
}

impl FusedIterator for StatusDecoder<'_> {}

/// Decode a raw status stream as captured from `--status-fd`.
pub fn decode_status(status_output: &str) -> StatusDecoder<'_> {
    StatusDecoder::new(status_output)
}
