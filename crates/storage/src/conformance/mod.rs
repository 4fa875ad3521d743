//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Index**: distinct-request counting, row ordering, lookup by input URL
//! - **Fetch**: record round-trip through the backend, not-found reporting
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh storage instance seeded with [`fixture_store_contents`]:
//!
//! ```ignore
//! use yinyang_storage::conformance::{fixture_store_contents, run_conformance_suite};
//!
//! #[tokio::test]
//! async fn d1_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         let (rows, records) = fixture_store_contents();
//!         create_seeded_d1_store(rows, records).await
//!     }).await;
//!     assert!(report.is_clean(), "{report}");
//! }
//! ```

mod fetch;
mod index;

use std::fmt;
use std::future::Future;

use crate::record::{GenerationRecord, InputAssociation};
use crate::RecordStore;

/// Upload URL shared by two fixture requests.
const CAT_URL: &str = "https://uploads.example/cat.png";
/// Upload URL used by one fixture request.
const DOG_URL: &str = "https://uploads.example/dog.png";
/// Generated-image URL the second fixture request was made against.
const REQ_A_GOOD_URL: &str = "https://images.yinyang.computerpho.be/req-a.good.png";

/// One named check and, if it failed, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Area of the trait the check exercises: `index` or `fetch`.
    pub area: &'static str,
    pub check: &'static str,
    pub failure: Option<String>,
}

impl CheckOutcome {
    fn new(area: &'static str, check: &'static str, result: Result<(), String>) -> Self {
        Self {
            area,
            check,
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Every outcome of one suite run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl ConformanceReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// True when at least one check ran and none failed.
    pub fn is_clean(&self) -> bool {
        !self.outcomes.is_empty() && self.failures().next().is_none()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failing = self.failures().count();
        write!(f, "RecordStore conformance: {} checks", self.outcomes.len())?;
        if failing == 0 {
            return writeln!(f, ", all passing");
        }
        writeln!(f, ", {} failing", failing)?;
        for o in self.failures() {
            let reason = o.failure.as_deref().unwrap_or_default();
            writeln!(f, "  {}::{} - {}", o.area, o.check, reason)?;
        }
        Ok(())
    }
}

/// The dataset every backend must be seeded with before running the suite.
///
/// Four index rows over three distinct requests, oldest first. `req-b` was
/// made against `req-a`'s good output; `req-c` appears under two inputs.
pub fn fixture_store_contents() -> (Vec<InputAssociation>, Vec<GenerationRecord>) {
    let row = |input_url: &str, request_id: &str| InputAssociation {
        input_url: input_url.to_string(),
        request_id: request_id.to_string(),
    };
    let associations = vec![
        row(CAT_URL, "req-a"),
        row(REQ_A_GOOD_URL, "req-b"),
        row(CAT_URL, "req-c"),
        row(DOG_URL, "req-c"),
    ];
    let records = vec![
        GenerationRecord::new("req-a", None),
        GenerationRecord::new("req-b", Some(REQ_A_GOOD_URL.to_string())),
        GenerationRecord::new("req-c", None),
    ];
    (associations, records)
}

/// Run every check against a storage backend.
///
/// `factory` is called once per check and must return a fresh store seeded
/// with [`fixture_store_contents`].
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut outcomes = index::run_index_checks(&factory).await;
    outcomes.extend(fetch::run_fetch_checks(&factory).await);
    ConformanceReport { outcomes }
}
