#![deny(missing_docs)]

//! # Test Plan Models
//!
//! Language-neutral description of the tests generated for one endpoint.
//! Strategies render these into framework-specific source.

use crate::contract::{EndpointId, SchemeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Category of a single generated test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Happy path.
    Positive,
    /// Constraint violation expecting a client error.
    Negative,
    /// Invalid credential expecting an authorization failure.
    Security,
}

/// Tag summarizing the kinds of tests in one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// Only positive tests.
    Positive,
    /// Only negative tests.
    Negative,
    /// Only security tests.
    Security,
    /// More than one kind.
    Mixed,
}

impl TestType {
    /// Derives the tag from the kinds present.
    pub fn from_kinds(kinds: impl IntoIterator<Item = TestKind>) -> Self {
        let mut seen: Option<TestKind> = None;
        for kind in kinds {
            match seen {
                None => seen = Some(kind),
                Some(prev) if prev != kind => return Self::Mixed,
                _ => {}
            }
        }
        match seen {
            Some(TestKind::Negative) => Self::Negative,
            Some(TestKind::Security) => Self::Security,
            _ => Self::Positive,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Security => "security",
            Self::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "security" => Ok(Self::Security),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!("unknown test type '{}'", other)),
        }
    }
}

/// The constraint a negative test violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Violation {
    /// Required value omitted.
    Missing,
    /// Value of the wrong JSON type.
    WrongType,
    /// Value outside `enum`, numeric bounds or length bounds.
    OutOfRange,
}

impl Violation {
    /// Snake-case suffix used in test names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::WrongType => "wrong_type",
            Self::OutOfRange => "out_of_range",
        }
    }
}

/// Credential attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSpec {
    /// Scheme name.
    pub scheme: String,
    /// How the credential is presented.
    pub kind: SchemeKind,
    /// The raw credential value.
    pub token: String,
}

/// A concrete request a test issues.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// Upper-case HTTP method.
    pub method: String,
    /// Path with parameters substituted and percent-encoded.
    pub path: String,
    /// Query parameters (sorted by name).
    pub query: Vec<(String, Value)>,
    /// Header parameters (sorted by name).
    pub headers: Vec<(String, Value)>,
    /// Cookie parameters (sorted by name).
    pub cookies: Vec<(String, Value)>,
    /// Body media type and payload.
    pub body: Option<(String, Value)>,
    /// Credential, if any.
    pub auth: Option<AuthSpec>,
}

/// Expected status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusExpectation {
    /// Exactly this code.
    Exact(u16),
    /// Any 2xx.
    Success,
    /// Any 4xx.
    ClientError,
    /// 401 or 403.
    AuthFailure,
}

/// What a test asserts about the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    /// Status assertion.
    pub status: StatusExpectation,
    /// Top-level JSON fields that must be present.
    pub required_fields: Vec<String>,
}

/// One generated test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Function name (snake case, unique within the plan).
    pub name: String,
    /// Category.
    pub kind: TestKind,
    /// Human-readable one-line intent.
    pub summary: String,
    /// Request to issue.
    pub request: RequestSpec,
    /// Assertions.
    pub expect: Expectation,
}

/// All tests generated for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPlan {
    /// Endpoint identity.
    pub endpoint: EndpointId,
    /// File stem (without framework prefix/suffix).
    pub stem: String,
    /// Cases in emission order: positive, negatives, security.
    pub cases: Vec<TestCase>,
}

impl TestPlan {
    /// Number of cases of a given kind.
    pub fn count(&self, kind: TestKind) -> usize {
        self.cases.iter().filter(|c| c.kind == kind).count()
    }

    /// Tag describing the plan.
    pub fn test_type(&self) -> TestType {
        TestType::from_kinds(self.cases.iter().map(|c| c.kind))
    }
}
