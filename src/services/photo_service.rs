//! PhotoService: listing, sampling and ingesting gallery images.
//!
//! All reads go through a fresh `list_all` of the upload prefix; nothing is
//! cached between requests. Read URLs are issued per request with a fixed
//! one hour horizon.

use crate::{
    errors::AppError,
    models::photo::{
        IncomingFile, ObjectSummary, PageResult, PhotoObject, SignedPhoto, UploadFailure,
        UploadOutcome,
    },
    storage::{ObjectStore, StoreError},
};
use bytes::Bytes;
use chrono::Utc;
use futures::future::{join_all, try_join_all};
use rand::{Rng, seq::SliceRandom};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tracing::{info, warn};

/// Namespace all uploads are written under.
pub const UPLOAD_PREFIX: &str = "uploads/";

pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

pub const MAX_FILES_PER_BATCH: usize = 10;
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const IMAGE_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

#[derive(Clone)]
pub struct PhotoService {
    store: Option<Arc<dyn ObjectStore>>,
}

impl PhotoService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A service with no bucket behind it; every operation reports a
    /// configuration error.
    pub fn unconfigured() -> Self {
        Self { store: None }
    }

    fn store(&self) -> Result<&Arc<dyn ObjectStore>, AppError> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::Configuration("photo bucket is not configured".into()))
    }

    /// Images under the upload prefix, newest first.
    async fn candidates(store: &Arc<dyn ObjectStore>) -> Result<Vec<PhotoObject>, AppError> {
        let mut images: Vec<ObjectSummary> = store
            .list_all(UPLOAD_PREFIX)
            .await?
            .into_iter()
            .filter(|summary| is_image_key(&summary.key))
            .collect();

        // Missing timestamps sort as epoch zero, i.e. oldest.
        images.sort_by_key(|summary| {
            std::cmp::Reverse(summary.last_modified.map_or(0, |t| t.timestamp_millis()))
        });

        Ok(images.into_iter().map(PhotoObject::from_summary).collect())
    }

    async fn sign(store: &dyn ObjectStore, photo: PhotoObject) -> Result<SignedPhoto, StoreError> {
        let issued_at = Utc::now();
        let url = store.issue_read_url(&photo.key, SIGNED_URL_TTL).await?;
        Ok(SignedPhoto {
            photo,
            url,
            expires_at: issued_at + chrono::Duration::seconds(SIGNED_URL_TTL.as_secs() as i64),
        })
    }

    /// Sign concurrently; output order follows `photos`, not completion.
    async fn sign_all(
        store: &Arc<dyn ObjectStore>,
        photos: Vec<PhotoObject>,
    ) -> Result<Vec<SignedPhoto>, AppError> {
        let signed = try_join_all(
            photos
                .into_iter()
                .map(|photo| Self::sign(store.as_ref(), photo)),
        )
        .await?;
        Ok(signed)
    }

    /// One page of the chronological listing. Pages past the end are empty.
    pub async fn list_page(&self, page: usize, limit: usize) -> Result<PageResult, AppError> {
        if page == 0 || limit == 0 {
            return Err(AppError::validation("page and limit must be at least 1"));
        }
        let store = self.store()?;
        let candidates = Self::candidates(store).await?;

        let total = candidates.len();
        let total_pages = total.div_ceil(limit);
        let start = (page - 1).saturating_mul(limit);
        let slice: Vec<PhotoObject> = candidates.into_iter().skip(start).take(limit).collect();

        let items = Self::sign_all(store, slice).await?;
        Ok(PageResult {
            items,
            page,
            limit,
            total,
            total_pages,
        })
    }

    /// Up to `count` distinct images chosen uniformly at random.
    pub async fn random_sample(&self, count: usize) -> Result<Vec<SignedPhoto>, AppError> {
        if count == 0 {
            return Err(AppError::validation("count must be at least 1"));
        }
        let store = self.store()?;
        let mut candidates = Self::candidates(store).await?;
        if candidates.is_empty() {
            return Err(AppError::not_found("no photos found in the gallery"));
        }

        let take = count.min(candidates.len());
        // partial_shuffle moves its picks into the returned slice, which is
        // not the front of `candidates`.
        let picked = {
            let mut rng = rand::thread_rng();
            let (picked, _) = candidates.partial_shuffle(&mut rng, take);
            picked.to_vec()
        };

        Self::sign_all(store, picked).await
    }

    /// Store a batch of files. Each accepted file is written independently;
    /// one file failing never undoes another's write.
    pub async fn upload_batch(&self, files: Vec<IncomingFile>) -> Result<UploadOutcome, AppError> {
        if files.is_empty() {
            return Err(AppError::validation("no files were selected"));
        }
        if files.len() > MAX_FILES_PER_BATCH {
            return Err(AppError::validation(format!(
                "at most {MAX_FILES_PER_BATCH} files can be uploaded at once"
            )));
        }
        let store = self.store()?;

        let mut outcome = UploadOutcome::default();
        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            match check_file(&file) {
                Ok(()) => accepted.push(file),
                Err(reason) => outcome.rejected.push(UploadFailure {
                    file_name: file.file_name,
                    error: reason.into(),
                }),
            }
        }

        let mut used_keys = HashSet::with_capacity(accepted.len());
        let planned: Vec<(IncomingFile, String, String)> = {
            let mut rng = rand::thread_rng();
            accepted
                .into_iter()
                .map(|file| {
                    let display_name = sanitize_file_name(&file.file_name);
                    let key = loop {
                        let suffix: u16 = rng.gen_range(0..10_000);
                        let key = upload_key(Utc::now().timestamp_millis(), suffix, &display_name);
                        if used_keys.insert(key.clone()) {
                            break key;
                        }
                    };
                    (file, key, display_name)
                })
                .collect()
        };

        let results = join_all(
            planned
                .into_iter()
                .map(|(file, key, display_name)| Self::ingest(store.as_ref(), file, key, display_name)),
        )
        .await;

        for result in results {
            match result {
                Ok(photo) => outcome.succeeded.push(photo),
                Err(failure) => outcome.failed.push(failure),
            }
        }

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            rejected = outcome.rejected.len(),
            "upload batch processed"
        );

        if outcome.succeeded.is_empty() {
            return Err(AppError::UploadFailed {
                failures: outcome.all_failures(),
            });
        }
        Ok(outcome)
    }

    async fn ingest(
        store: &dyn ObjectStore,
        file: IncomingFile,
        key: String,
        display_name: String,
    ) -> Result<SignedPhoto, UploadFailure> {
        let stored = async {
            store
                .put_object(&key, Bytes::clone(&file.data), &file.content_type)
                .await?;
            info!(key = %key, size = file.data.len(), "photo uploaded");

            let photo = PhotoObject {
                key: key.clone(),
                display_name,
                last_modified: Some(Utc::now()),
                content_type: Some(file.content_type.clone()),
            };
            Self::sign(store, photo).await
        }
        .await;

        stored.map_err(|err| {
            warn!(file = %file.file_name, key = %key, error = %err, "photo upload failed");
            UploadFailure {
                file_name: file.file_name.clone(),
                error: format!("upload failed: {}", err.kind),
            }
        })
    }
}

/// True when the key ends in a supported image extension (any case).
pub fn is_image_key(key: &str) -> bool {
    key.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    })
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "upload".into()
    } else {
        sanitized
    }
}

pub fn upload_key(timestamp_millis: i64, suffix: u16, sanitized_name: &str) -> String {
    format!("{UPLOAD_PREFIX}{timestamp_millis}-{suffix}-{sanitized_name}")
}

fn check_file(file: &IncomingFile) -> Result<(), &'static str> {
    let mime = file.content_type.to_ascii_lowercase();
    if !IMAGE_MIME_TYPES.contains(&mime.as_str()) {
        return Err("only image files can be uploaded (JPEG, PNG, GIF, WebP, BMP)");
    }
    if file.data.len() > MAX_FILE_BYTES {
        return Err("file exceeds the 10MB size limit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryObjectStore;
    use chrono::{DateTime, TimeZone};
    use std::collections::HashMap;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn gallery(count: usize) -> Arc<MemoryObjectStore> {
        let keys: Vec<String> = (0..count).map(|i| format!("uploads/{i:03}.jpg")).collect();
        Arc::new(MemoryObjectStore::with_objects(
            keys.iter()
                .enumerate()
                .map(|(i, k)| (k.as_str(), at(1_000 + i as i64))),
        ))
    }

    fn service(store: Arc<MemoryObjectStore>) -> PhotoService {
        PhotoService::new(store)
    }

    fn file(name: &str, mime: &str, len: usize) -> IncomingFile {
        IncomingFile {
            file_name: name.into(),
            content_type: mime.into(),
            data: Bytes::from(vec![0u8; len]),
        }
    }

    fn keys(items: &[SignedPhoto]) -> Vec<&str> {
        items.iter().map(|s| s.photo.key.as_str()).collect()
    }

    #[test]
    fn image_keys_match_case_insensitively() {
        assert!(is_image_key("uploads/a.JPG"));
        assert!(is_image_key("uploads/a.b.webp"));
        assert!(is_image_key("uploads/x.Bmp"));
        assert!(!is_image_key("uploads/a.txt"));
        assert!(!is_image_key("uploads/jpg"));
        assert!(!is_image_key("uploads/"));
        assert!(!is_image_key("uploads/.png/"));
        assert!(is_image_key("uploads/.png"));
    }

    #[test]
    fn sanitization_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my photo (1).JPG"), "my_photo__1_.JPG");
        assert_eq!(sanitize_file_name("ok_name-2.png"), "ok_name-2.png");
        assert_eq!(sanitize_file_name("結婚式.png"), "___.png");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn upload_keys_embed_time_and_suffix() {
        assert_eq!(
            upload_key(1_700_000_000_000, 42, "cake.jpg"),
            "uploads/1700000000000-42-cake.jpg"
        );
    }

    #[tokio::test]
    async fn listing_filters_and_orders_newest_first() {
        let store = Arc::new(MemoryObjectStore::with_objects([
            ("uploads/old.jpg", at(100)),
            ("uploads/new.png", at(300)),
            ("uploads/notes.txt", at(400)),
            ("uploads/undated.gif", None),
            ("uploads/mid.JPEG", at(200)),
        ]));
        let page = service(store).list_page(1, 10).await.unwrap();

        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 1);
        assert_eq!(
            keys(&page.items),
            [
                "uploads/new.png",
                "uploads/mid.JPEG",
                "uploads/old.jpg",
                "uploads/undated.gif"
            ]
        );
        assert_eq!(page.items[0].photo.display_name, "new.png");
    }

    #[tokio::test]
    async fn page_sizes_follow_totals() {
        let svc = service(gallery(7));
        for (page, limit, expected_len) in [(1, 3, 3), (2, 3, 3), (3, 3, 1), (4, 3, 0), (1, 10, 7)] {
            let result = svc.list_page(page, limit).await.unwrap();
            assert_eq!(result.items.len(), expected_len, "page {page} limit {limit}");
            assert_eq!(result.total, 7);
            assert_eq!(result.total_pages, 7usize.div_ceil(limit));
        }
    }

    #[tokio::test]
    async fn pages_are_disjoint_and_stable() {
        let svc = service(gallery(5));
        let first = svc.list_page(1, 2).await.unwrap();
        let second = svc.list_page(2, 2).await.unwrap();
        let again = svc.list_page(1, 2).await.unwrap();

        assert_eq!(keys(&first.items), ["uploads/004.jpg", "uploads/003.jpg"]);
        assert_eq!(keys(&second.items), ["uploads/002.jpg", "uploads/001.jpg"]);
        assert_eq!(keys(&first.items), keys(&again.items));
        assert_ne!(first.items[0].url, again.items[0].url);
    }

    #[tokio::test]
    async fn signed_urls_expire_an_hour_out() {
        let svc = service(gallery(1));
        let before = Utc::now();
        let page = svc.list_page(1, 1).await.unwrap();
        let expires = page.items[0].expires_at;

        assert!(expires >= before + chrono::Duration::seconds(3600));
        assert!(expires <= Utc::now() + chrono::Duration::seconds(3600));
        assert!(page.items[0].url.contains("ttl=3600"));
    }

    #[tokio::test]
    async fn empty_gallery_lists_as_empty_page() {
        let page = service(gallery(0)).list_page(1, 100).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn one_failed_signature_fails_the_listing() {
        let mut store = MemoryObjectStore::with_objects([("uploads/a.jpg", at(1))]);
        store.fail_signing.insert("uploads/a.jpg".into());
        let err = service(Arc::new(store)).list_page(1, 10).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }

    #[tokio::test]
    async fn unconfigured_bucket_is_a_configuration_error() {
        let svc = PhotoService::unconfigured();
        assert!(matches!(
            svc.list_page(1, 1).await,
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            svc.random_sample(1).await,
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            svc.upload_batch(vec![file("a.jpg", "image/jpeg", 1)]).await,
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn random_sample_draws_distinct_candidates() {
        let svc = service(gallery(8));
        let all: HashSet<String> = (0..8).map(|i| format!("uploads/{i:03}.jpg")).collect();

        for count in [1, 5, 8, 20] {
            let sample = svc.random_sample(count).await.unwrap();
            assert_eq!(sample.len(), count.min(8));
            let drawn: HashSet<String> = sample.iter().map(|s| s.photo.key.clone()).collect();
            assert_eq!(drawn.len(), sample.len());
            assert!(drawn.is_subset(&all));
        }
    }

    #[tokio::test]
    async fn random_sample_varies_between_calls() {
        let svc = service(gallery(30));
        let mut seen = HashSet::new();
        for _ in 0..20 {
            let sample = svc.random_sample(3).await.unwrap();
            seen.insert(keys(&sample).join(","));
        }
        assert!(seen.len() > 1);
    }

    #[tokio::test]
    async fn random_sample_is_uniform_across_the_gallery() {
        let svc = service(gallery(30));
        let mut hits: HashMap<String, usize> = HashMap::new();
        for _ in 0..2000 {
            for signed in svc.random_sample(3).await.unwrap() {
                *hits.entry(signed.photo.key).or_default() += 1;
            }
        }

        // Each key is expected ~200 times; the bounds sit about 7 sigma out.
        assert_eq!(hits.len(), 30);
        for (key, n) in &hits {
            assert!((100..=300).contains(n), "{key} drawn {n} times");
        }
    }

    #[tokio::test]
    async fn random_sample_of_empty_gallery_is_not_found() {
        let store = Arc::new(MemoryObjectStore::with_objects([("uploads/readme.txt", at(1))]));
        let err = service(store).random_sample(5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_size_is_checked_before_anything_is_written() {
        let store = gallery(0);
        let svc = service(store.clone());

        assert!(matches!(
            svc.upload_batch(vec![]).await,
            Err(AppError::Validation(_))
        ));
        let eleven = (0..11)
            .map(|i| file(&format!("{i}.jpg"), "image/jpeg", 1))
            .collect();
        assert!(matches!(
            svc.upload_batch(eleven).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn uploads_store_under_sanitized_unique_keys() {
        let store = gallery(0);
        let svc = service(store.clone());
        let outcome = svc
            .upload_batch(vec![
                file("our day.jpg", "image/jpeg", 3),
                file("our day.jpg", "image/jpeg", 3),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len(), 2);
        assert!(outcome.failed.is_empty());
        let stored = store.keys();
        assert_eq!(stored.len(), 2, "identical names must not collide: {stored:?}");
        for key in &stored {
            assert!(key.starts_with(UPLOAD_PREFIX));
            assert!(key.ends_with("-our_day.jpg"));
        }
        assert_eq!(outcome.succeeded[0].photo.display_name, "our_day.jpg");
        assert_eq!(
            store.objects.lock().unwrap()[&stored[0]].content_type,
            "image/jpeg"
        );
    }

    #[tokio::test]
    async fn store_failures_are_collected_per_file() {
        let mut store = MemoryObjectStore::default();
        store.fail_puts_containing.push("broken".into());
        let store = Arc::new(store);
        let outcome = service(store.clone())
            .upload_batch(vec![
                file("a.png", "image/png", 1),
                file("broken.png", "image/png", 1),
                file("c.gif", "image/gif", 1),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len() + outcome.failed.len(), 3);
        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed[0].file_name, "broken.png");
        assert_eq!(outcome.failed[0].error, "upload failed: network failure");
        assert_eq!(store.keys().len(), 2);
    }

    #[tokio::test]
    async fn invalid_files_are_rejected_without_being_attempted() {
        let store = gallery(0);
        let outcome = service(store.clone())
            .upload_batch(vec![
                file("doc.pdf", "application/pdf", 1),
                file("big.jpg", "image/jpeg", MAX_FILE_BYTES + 1),
                file("ok.webp", "image/webp", MAX_FILE_BYTES),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len(), 1);
        assert!(outcome.failed.is_empty());
        let rejected: Vec<_> = outcome.rejected.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(rejected, ["doc.pdf", "big.jpg"]);
        assert_eq!(store.keys().len(), 1);
    }

    #[tokio::test]
    async fn batch_fails_when_nothing_succeeds() {
        let mut store = MemoryObjectStore::default();
        store.fail_puts_containing.push("uploads/".into());
        let err = service(Arc::new(store))
            .upload_batch(vec![
                file("a.jpg", "image/jpeg", 1),
                file("b.txt", "text/plain", 1),
            ])
            .await
            .unwrap_err();

        match err {
            AppError::UploadFailed { failures } => {
                let names: Vec<_> = failures.iter().map(|f| f.file_name.as_str()).collect();
                assert_eq!(names, ["b.txt", "a.jpg"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
