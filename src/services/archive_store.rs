//! src/services/archive_store.rs
//!
//! ArchiveStore holds the reporter's bucket. Payload bytes live on local disk
//! sharded beneath `base_path/{bucket}/{shard}/{shard}/{key}`; SQLite holds
//! one metadata row per archive. Archives are create-on-write and never
//! deleted through this service.

use crate::models::{
    archive::{Archive, ArchiveUrl},
    bucket::Bucket,
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Schema applied by [`migrate`].
const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("bucket region must not be empty")]
    MissingRegion,
    #[error("archive `{key}` not found in bucket `{bucket}`")]
    ArchiveNotFound { bucket: String, key: String },
    #[error("invalid archive key")]
    InvalidArchiveKey,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// ArchiveStore provides the reporter's three bucket operations:
/// - List every archive key
/// - Get one archive's bytes by exact key
/// - Put a new archive under a freshly generated timestamp key
#[derive(Clone)]
pub struct ArchiveStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where archive payloads are stored.
    pub base_path: PathBuf,

    bucket: Bucket,
}

const MAX_ARCHIVE_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Apply the reporter schema. Safe to run on every startup.
pub async fn migrate(db: &SqlitePool) -> StorageResult<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    debug!("Running {} schema statements", statements.len());
    for stmt in statements {
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

impl ArchiveStore {
    /// Open the named bucket, registering it and creating its directory on
    /// first use. An existing bucket keeps the region it was created with.
    pub async fn open(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        bucket_name: &str,
        region: &str,
    ) -> StorageResult<Self> {
        ensure_bucket_name_safe(bucket_name)?;
        let region = ensure_region_present(region)?;

        let base_path = base_path.into();
        let existing = sqlx::query_as::<_, Bucket>(
            "SELECT id, name, region, created_at FROM buckets WHERE name = ?",
        )
        .bind(bucket_name)
        .fetch_optional(&*db)
        .await?;

        let bucket = match existing {
            Some(bucket) => bucket,
            None => {
                let bucket = Bucket {
                    id: Uuid::new_v4(),
                    name: bucket_name.to_string(),
                    region: region.to_string(),
                    created_at: Utc::now(),
                };
                sqlx::query(
                    "INSERT INTO buckets (id, name, region, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(bucket.id)
                .bind(&bucket.name)
                .bind(&bucket.region)
                .bind(bucket.created_at)
                .execute(&*db)
                .await?;
                info!("Registered bucket {} ({})", bucket.name, bucket.region);
                bucket
            }
        };

        let store = Self {
            db,
            base_path,
            bucket,
        };
        fs::create_dir_all(store.bucket_root()).await?;
        Ok(store)
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Physical base folder for this bucket.
    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket.name)
    }

    /// Two-level shard identifiers from MD5(bucket/key).
    fn archive_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// base_path/bucket/{shard}/{shard}/{key}. Parents may not exist yet.
    fn archive_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::archive_shards(&self.bucket.name, key);
        let mut path = self.bucket_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_archive(&self, key: &str) -> StorageResult<Archive> {
        sqlx::query_as::<_, Archive>(
            "SELECT id, bucket_id, key, content_type, size_bytes, etag, last_modified
             FROM archives
             WHERE key = ? AND bucket_id = ?",
        )
        .bind(key)
        .bind(self.bucket.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => self.not_found(key),
            other => StorageError::Sqlx(other),
        })
    }

    fn not_found(&self, key: &str) -> StorageError {
        StorageError::ArchiveNotFound {
            bucket: self.bucket.name.clone(),
            key: key.to_string(),
        }
    }

    /// Every archive in the bucket, ordered by key. Not paginated.
    pub async fn list(&self) -> StorageResult<Vec<ArchiveUrl>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM archives WHERE bucket_id = ? ORDER BY key ASC")
                .bind(self.bucket.id)
                .fetch_all(&*self.db)
                .await?;
        Ok(keys.into_iter().map(ArchiveUrl::from_key).collect())
    }

    /// Metadata plus an open file handle, for streaming the payload out.
    ///
    /// `size_bytes` is taken from the opened file, so it matches what the
    /// handle yields even if the key was overwritten after the row was read.
    pub async fn open_reader(&self, key: &str) -> StorageResult<(Archive, File)> {
        ensure_key_safe(key)?;
        let mut archive = self.fetch_archive(key).await?;

        let file = File::open(self.archive_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                self.not_found(key)
            } else {
                StorageError::Io(err)
            }
        })?;
        archive.size_bytes = i64::try_from(file.metadata().await?.len()).unwrap_or(i64::MAX);

        Ok((archive, file))
    }

    /// The full payload stored under `key`.
    pub async fn get(&self, key: &str) -> StorageResult<Bytes> {
        ensure_key_safe(key)?;
        self.fetch_archive(key).await?;

        match fs::read(self.archive_path(key)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(self.not_found(key)),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Store `body` under a new key: the current UNIX time in seconds.
    ///
    /// Two writes within the same second get the same key and the second
    /// silently replaces the first.
    pub async fn put(&self, body: Bytes, content_type: Option<String>) -> StorageResult<Archive> {
        self.put_stream(stream::once(async move { Ok(body) }), content_type)
            .await
    }

    /// Streaming variant of [`ArchiveStore::put`].
    pub async fn put_stream<S>(
        &self,
        stream: S,
        content_type: Option<String>,
    ) -> StorageResult<Archive>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let key = Utc::now().timestamp().to_string();
        self.store_under(&key, stream, content_type).await
    }

    /// Stream a payload to disk under an explicit key and upsert its metadata.
    ///
    /// - Writes to a temporary file while computing size and MD5.
    /// - fsyncs, then renames into the final location.
    /// - An existing archive with the same key is overwritten.
    pub async fn store_under<S>(
        &self,
        key: &str,
        stream: S,
        content_type: Option<String>,
    ) -> StorageResult<Archive>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        ensure_key_safe(key)?;

        let file_path = self.archive_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "archive path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        // rename replaces an existing archive file atomically.
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let etag = format!("{:x}", digest.compute());
        let archive = sqlx::query_as::<_, Archive>(
            r#"
            INSERT INTO archives (
                id, bucket_id, key, content_type, size_bytes, etag, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, bucket_id, key, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.bucket.id)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!(
            "stored archive {} ({} bytes) at {}",
            key,
            size_bytes,
            file_path.display()
        );
        Ok(archive)
    }
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or oversized keys, keys that begin with `/`, contain `..`,
/// backslashes or control characters.
fn ensure_key_safe(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.len() > MAX_ARCHIVE_KEY_LEN {
        return Err(StorageError::InvalidArchiveKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(StorageError::InvalidArchiveKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StorageError::InvalidArchiveKey);
    }
    Ok(())
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    if name.trim() != name {
        return Err(invalid("cannot begin or end with whitespace"));
    }

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-')
    {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

/// Regions are recorded as given; only a blank one is refused.
fn ensure_region_present(region: &str) -> StorageResult<&str> {
    let region = region.trim();
    if region.is_empty() {
        Err(StorageError::MissingRegion)
    } else {
        Ok(region)
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> ArchiveStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        ArchiveStore::open(Arc::new(pool), dir.path(), "reports", "local")
            .await
            .unwrap()
    }

    fn body(bytes: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::once(async move { Ok(Bytes::from_static(bytes)) })
    }

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let payload = Bytes::from_static(b"{\"orders\":[1,2,3]}\n\x00\xff");

        let archive = store
            .put(payload.clone(), Some("application/json".into()))
            .await
            .unwrap();

        assert!(archive.key.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(archive.size_bytes, payload.len() as i64);
        assert_eq!(archive.etag, format!("{:x}", md5::compute(&payload)));
        assert_eq!(store.get(&archive.key).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn list_returns_every_stored_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let keys = ["1700000000", "1700000001", "1700000002"];
        for key in keys {
            store.store_under(key, body(b"x"), None).await.unwrap();
        }

        let listed = store.list().await.unwrap();

        assert_eq!(listed.len(), keys.len());
        assert!(listed.iter().all(|entry| entry.name == entry.url));
        let names: BTreeSet<_> = listed.into_iter().map(|entry| entry.name).collect();
        assert_eq!(names, keys.iter().map(|k| k.to_string()).collect());
    }

    #[tokio::test]
    async fn same_key_overwrites_silently() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        store.store_under("1700000000", body(b"first"), None).await.unwrap();
        store.store_under("1700000000", body(b"second"), None).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(
            store.get("1700000000").await.unwrap(),
            Bytes::from_static(b"second")
        );
    }

    #[tokio::test]
    async fn reader_length_follows_opened_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.store_under("1700000000", body(b"first"), None).await.unwrap();

        // Replace the payload behind the metadata row's back.
        fs::write(store.archive_path("1700000000"), b"a much longer second payload")
            .await
            .unwrap();

        let (archive, file) = store.open_reader("1700000000").await.unwrap();
        assert_eq!(archive.size_bytes, 28);
        assert_eq!(file.metadata().await.unwrap().len(), 28);
    }

    #[tokio::test]
    async fn missing_and_unsafe_keys() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        assert!(matches!(
            store.get("404").await,
            Err(StorageError::ArchiveNotFound { .. })
        ));
        assert!(matches!(
            store.get("../etc/passwd").await,
            Err(StorageError::InvalidArchiveKey)
        ));
        assert!(matches!(
            store.get("").await,
            Err(StorageError::InvalidArchiveKey)
        ));
    }

    #[tokio::test]
    async fn reopening_reuses_bucket() {
        let dir = TempDir::new().unwrap();
        let first = store(&dir).await;
        first.store_under("1", body(b"a"), None).await.unwrap();

        let again = ArchiveStore::open(first.db.clone(), dir.path(), "reports", "us-east-1")
            .await
            .unwrap();

        assert_eq!(again.bucket().id, first.bucket().id);
        assert_eq!(again.bucket().region, "local");
        assert_eq!(again.list().await.unwrap().len(), 1);
    }

    #[test]
    fn bucket_names_follow_s3_rules() {
        assert!(ensure_bucket_name_safe("reports").is_ok());
        assert!(ensure_bucket_name_safe("ecomm.reports-2024").is_ok());
        assert!(ensure_bucket_name_safe("ab").is_err());
        assert!(ensure_bucket_name_safe("Reports").is_err());
        assert!(ensure_bucket_name_safe("-reports").is_err());
        assert!(ensure_bucket_name_safe("a..b").is_err());
        assert!(ensure_bucket_name_safe("192.168.0.1").is_err());
    }

    #[tokio::test]
    async fn any_region_is_recorded() {
        let dir = TempDir::new().unwrap();
        let pool = store(&dir).await.db;

        let store = ArchiveStore::open(pool.clone(), dir.path(), "eu-reports", "eu-central-1")
            .await
            .unwrap();
        assert_eq!(store.bucket().region, "eu-central-1");

        let store = ArchiveStore::open(pool.clone(), dir.path(), "sa-reports", " sa-east-1 ")
            .await
            .unwrap();
        assert_eq!(store.bucket().region, "sa-east-1");

        assert!(matches!(
            ArchiveStore::open(pool, dir.path(), "blank-reports", "  ").await,
            Err(StorageError::MissingRegion)
        ));
    }
}
