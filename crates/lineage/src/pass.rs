//! One reconstruction pass: fetch, resolve, assemble.
//!
//! Fetches run concurrently but resolution only starts once every fetch of
//! the pass has settled, so the resolver always sees the complete working
//! set.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use yinyang_storage::{GenerationRecord, InputAssociation, RecordStore, StorageError};

use crate::assemble::{assemble, Chain, ResolvedRecord};
use crate::cache::CacheSignal;
use crate::config::LineageConfig;
use crate::issue::LineageIssue;
use crate::resolve::{resolve_parent, LinkTable, Resolution};

/// Result of one full pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub chains: Vec<Chain>,
    pub issues: Vec<LineageIssue>,
    /// Records that made it into the working set.
    pub record_count: usize,
    /// Signal of the index listing this pass was built from.
    pub signal: CacheSignal,
}

/// Records fetched for a pass, in request order, with the issues raised
/// while fetching.
#[derive(Debug, Default)]
pub(crate) struct FetchedSet {
    pub(crate) records: Vec<GenerationRecord>,
    pub(crate) issues: Vec<LineageIssue>,
}

/// Fetch `request_ids` concurrently, at most `max_concurrent_fetches` at a
/// time, each bounded by the fetch timeout.
///
/// Missing, malformed, timed-out and backend-failed records are skipped with
/// a `FetchSkipped` issue. A store that reports itself unavailable fails the
/// whole fetch: that is not a per-record condition.
pub(crate) async fn fetch_records<S>(
    store: &S,
    request_ids: &[String],
    config: &LineageConfig,
) -> Result<FetchedSet, StorageError>
where
    S: RecordStore + ?Sized,
{
    let timeout = config.fetch_timeout();
    let fetches: Vec<_> = request_ids
        .iter()
        .map(|request_id| fetch_one(store, request_id.clone(), timeout))
        .collect();
    let settled: Vec<(String, Result<GenerationRecord, String>)> = stream::iter(fetches)
        .buffered(config.max_concurrent_fetches)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    let mut fetched = FetchedSet::default();
    for (request_id, outcome) in settled {
        match outcome {
            Ok(record) if record.request_id == request_id => fetched.records.push(record),
            Ok(record) => {
                let issue = LineageIssue::FetchSkipped {
                    request_id,
                    reason: format!("stored record carries request id {}", record.request_id),
                };
                issue.log();
                fetched.issues.push(issue);
            }
            Err(reason) => {
                let issue = LineageIssue::FetchSkipped {
                    request_id,
                    reason,
                };
                issue.log();
                fetched.issues.push(issue);
            }
        }
    }
    Ok(fetched)
}

/// Fetch one record. Only an unavailable store is an `Err`; every other
/// failure is the skip reason in the inner result.
async fn fetch_one<S>(
    store: &S,
    request_id: String,
    timeout: Duration,
) -> Result<(String, Result<GenerationRecord, String>), StorageError>
where
    S: RecordStore + ?Sized,
{
    let outcome = match tokio::time::timeout(timeout, store.get_record(&request_id)).await {
        Ok(Ok(record)) => Ok(record),
        Ok(Err(StorageError::Unavailable(message))) => {
            return Err(StorageError::Unavailable(message));
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("fetch timed out after {} ms", timeout.as_millis())),
    };
    Ok((request_id, outcome))
}

/// Distinct request ids from the index, first occurrence first, each paired
/// with the input URL of its first row.
///
/// Each record is fetched and resolved once per pass, so its parent link is
/// assigned once and two passes over the same index agree. `ParentConflict`
/// is only raised if a record reaches the link table twice with different
/// parents.
fn distinct_requests(associations: Vec<InputAssociation>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    associations
        .into_iter()
        .filter(|a| seen.insert(a.request_id.clone()))
        .map(|a| (a.request_id, a.input_url))
        .collect()
}

/// Run a full pass against `store`.
///
/// Fails only when the index cannot be listed or the store is unavailable;
/// per-record problems come back as issues.
pub async fn reconstruct<S>(store: &S, config: &LineageConfig) -> Result<Reconstruction, StorageError>
where
    S: RecordStore + ?Sized,
{
    let associations = store.list_distinct_input_associations().await?;
    let signal = CacheSignal::from_index(config.signal, &associations);
    let requests = distinct_requests(associations);
    let request_ids: Vec<String> = requests.iter().map(|(id, _)| id.clone()).collect();

    let fetched = fetch_records(store, &request_ids, config).await?;
    let mut issues = fetched.issues;

    let known: HashSet<String> = fetched
        .records
        .iter()
        .map(|r| r.request_id.clone())
        .collect();

    let mut table = LinkTable::new();
    for record in &fetched.records {
        let resolution = resolve_parent(
            record.input.original_url.as_deref(),
            &known,
            &config.image_origin,
        );
        match resolution {
            Resolution::Linked(link) => {
                if let Err(issue) = table.assign(&record.request_id, link) {
                    issue.log();
                    issues.push(issue);
                }
            }
            Resolution::Dangling { candidate } => {
                let issue = LineageIssue::DanglingParent {
                    request_id: record.request_id.clone(),
                    candidate,
                };
                issue.log();
                issues.push(issue);
            }
            Resolution::Malformed(message) => {
                tracing::debug!(
                    request_id = %record.request_id,
                    message = %message,
                    "unrecognized image URL; treating as root"
                );
            }
            Resolution::NoOriginalUrl | Resolution::ForeignOrigin => {}
        }
    }

    let input_urls: HashMap<&str, &str> = requests
        .iter()
        .map(|(id, url)| (id.as_str(), url.as_str()))
        .collect();
    let resolved: Vec<ResolvedRecord> = fetched
        .records
        .iter()
        .map(|record| ResolvedRecord {
            request_id: record.request_id.clone(),
            display: record
                .input
                .original_url
                .clone()
                .or_else(|| input_urls.get(record.request_id.as_str()).map(|u| u.to_string()))
                .unwrap_or_else(|| record.request_id.clone()),
            parent: table.get(&record.request_id).cloned(),
        })
        .collect();

    let assembly = assemble(&resolved, config.chain_policy);
    issues.extend(assembly.issues);

    tracing::info!(
        records = resolved.len(),
        links = table.len(),
        chains = assembly.chains.len(),
        issues = issues.len(),
        "chain reconstruction complete"
    );

    Ok(Reconstruction {
        chains: assembly.chains,
        issues,
        record_count: resolved.len(),
        signal,
    })
}
