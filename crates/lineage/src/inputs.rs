//! Distinct-input listings.
//!
//! Two plain-data views over the input-URL index: every distinct input
//! image, and for one input image the good/bad output pair of every request
//! made against it. Both list the most recent entry first.

use std::collections::HashSet;

use serde::Serialize;
use yinyang_storage::{RecordStore, StorageError};

use crate::config::LineageConfig;
use crate::issue::LineageIssue;
use crate::pass::fetch_records;

/// Hosted output URLs of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantPair {
    pub request_id: String,
    pub good_url: String,
    pub bad_url: String,
}

/// All requests made against one input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputVariants {
    pub input_url: String,
    pub variants: Vec<VariantPair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<LineageIssue>,
}

/// Every distinct input URL in the index, most recent first.
pub async fn distinct_input_urls<S>(store: &S) -> Result<Vec<String>, StorageError>
where
    S: RecordStore + ?Sized,
{
    let associations = store.list_distinct_input_associations().await?;
    let mut seen = HashSet::new();
    let mut urls: Vec<String> = associations
        .into_iter()
        .filter(|a| seen.insert(a.input_url.clone()))
        .map(|a| a.input_url)
        .collect();
    urls.reverse();
    Ok(urls)
}

/// Output pairs for every request made against `input_url`, most recent
/// first. Records that cannot be fetched are skipped and reported.
pub async fn input_variants<S>(
    store: &S,
    input_url: &str,
    config: &LineageConfig,
) -> Result<InputVariants, StorageError>
where
    S: RecordStore + ?Sized,
{
    let mut request_ids = store.request_ids_for_input(input_url).await?;
    request_ids.reverse();

    let fetched = fetch_records(store, &request_ids, config).await?;
    let variants = fetched
        .records
        .into_iter()
        .map(|record| VariantPair {
            good_url: config.hosted_image_url(&record.results.good.image_bucket_id),
            bad_url: config.hosted_image_url(&record.results.bad.image_bucket_id),
            request_id: record.request_id,
        })
        .collect();

    Ok(InputVariants {
        input_url: input_url.to_string(),
        variants,
        issues: fetched.issues,
    })
}

#[cfg(test)]
mod tests {
    use yinyang_storage::{GenerationRecord, InMemoryRecordStore};

    use super::*;

    const CAT: &str = "https://uploads.example/cat.png";
    const DOG: &str = "https://uploads.example/dog.png";

    async fn store() -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new();
        store.insert(CAT, GenerationRecord::new("r1", None)).await;
        store.insert(DOG, GenerationRecord::new("r2", None)).await;
        store.insert(CAT, GenerationRecord::new("r3", None)).await;
        store
    }

    #[tokio::test]
    async fn distinct_inputs_most_recent_first() {
        let store = store().await;
        let urls = distinct_input_urls(&store).await.unwrap();
        assert_eq!(urls, vec![DOG.to_string(), CAT.to_string()]);
    }

    #[tokio::test]
    async fn variants_for_input_most_recent_first() {
        let store = store().await;
        let result = input_variants(&store, CAT, &LineageConfig::default())
            .await
            .unwrap();
        assert_eq!(result.input_url, CAT);
        let ids: Vec<&str> = result
            .variants
            .iter()
            .map(|v| v.request_id.as_str())
            .collect();
        assert_eq!(ids, vec!["r3", "r1"]);
        assert_eq!(
            result.variants[0].good_url,
            "https://images.yinyang.computerpho.be/r3.good.png"
        );
        assert_eq!(
            result.variants[0].bad_url,
            "https://images.yinyang.computerpho.be/r3.bad.png"
        );
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn unreadable_records_are_skipped() {
        let store = store().await;
        store.remove_record("r1").await;
        let result = input_variants(&store, CAT, &LineageConfig::default())
            .await
            .unwrap();
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].request_id(), "r1");
    }

    #[tokio::test]
    async fn unknown_input_has_no_variants() {
        let store = store().await;
        let result = input_variants(&store, "https://uploads.example/none.png", &LineageConfig::default())
            .await
            .unwrap();
        assert!(result.variants.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_is_an_error() {
        let store = store().await;
        store.set_available(false);
        assert!(matches!(
            distinct_input_urls(&store).await,
            Err(StorageError::Unavailable(_))
        ));
    }
}
