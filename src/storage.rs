use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Sub-directory of the storage root that receives uploaded datasets
pub const UPLOAD_DIR: &str = "datasets";

/// Ledger of every dataset stored so far, one JSON record per line, kept in
/// the storage root outside the served uploads directory
pub const LEDGER_FILE: &str = "datasets.jsonl";

/// How many suffixed names to try before giving up on a collision
const MAX_NAME_ATTEMPTS: usize = 100;

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^-\w.]").expect("valid regex");
}

/// Errors raised by the storage adapter
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not derive a valid file name from {0:?}")]
    InvalidName(String),

    #[error("no free file name left for {0}")]
    NameExhausted(String),

    #[error("could not encode dataset record: {0}")]
    Ledger(#[from] serde_json::Error),
}

/// Reference to a file written by the storage adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Name relative to the storage root, e.g. `datasets/cars.csv`
    pub name: String,

    /// Absolute path on disk
    pub path: PathBuf,

    /// Public URL the file is served under
    pub url: String,
}

/// Record of one accepted upload
///
/// Created once per upload and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// File name as supplied by the client
    pub name: String,

    pub file: StoredFile,

    pub uploaded_at: DateTime<Utc>,
}

/// Storage adapter that writes uploads below a root directory
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    location: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    /// Open (and create if needed) a storage root
    ///
    /// # Arguments
    /// * `location` - Root directory; uploads go to `<location>/datasets`
    /// * `base_url` - Public URL prefix the root is served under, e.g. `/media/`
    ///
    /// # Returns
    /// * `Result<FileSystemStorage, StorageError>` - The adapter with an absolute root
    pub fn new(location: impl AsRef<Path>, base_url: &str) -> Result<Self, StorageError> {
        let location = location.as_ref();
        let upload_dir = location.join(UPLOAD_DIR);
        fs::create_dir_all(&upload_dir).map_err(|source| StorageError::Io {
            path: upload_dir.clone(),
            source,
        })?;
        let location = fs::canonicalize(location).map_err(|source| StorageError::Io {
            path: location.to_path_buf(),
            source,
        })?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(FileSystemStorage { location, base_url })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Directory holding the uploaded files themselves
    pub fn upload_dir(&self) -> PathBuf {
        self.location.join(UPLOAD_DIR)
    }

    /// Store `content` under a sanitised, unique version of `name`.
    ///
    /// An existing file is never overwritten: on collision `_` and seven
    /// random characters are inserted before the extension. The resulting
    /// [`Dataset`] is appended to the ledger and returned.
    pub fn save(&self, name: &str, content: &[u8]) -> Result<Dataset, StorageError> {
        let valid = valid_name(name).ok_or_else(|| StorageError::InvalidName(name.to_string()))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                valid.clone()
            } else {
                with_random_suffix(&valid)
            };
            let stored_name = format!("{}/{}", UPLOAD_DIR, candidate);
            let path = self.path(&stored_name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(StorageError::Io { path, source }),
            };
            file.write_all(content).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

            let dataset = Dataset {
                name: name.to_string(),
                file: StoredFile {
                    url: self.url(&stored_name),
                    name: stored_name,
                    path,
                },
                uploaded_at: Utc::now(),
            };
            if let Err(e) = self.record(&dataset) {
                if let Err(rm) = fs::remove_file(&dataset.file.path) {
                    log::warn!(
                        "could not remove unrecorded upload {}: {}",
                        dataset.file.path.display(),
                        rm
                    );
                }
                return Err(e);
            }
            log::info!(
                "stored dataset {} ({} bytes) at {}",
                dataset.name,
                content.len(),
                dataset.file.path.display()
            );
            return Ok(dataset);
        }

        Err(StorageError::NameExhausted(valid))
    }

    /// Absolute path of a stored name
    pub fn path(&self, name: &str) -> PathBuf {
        self.location.join(name)
    }

    /// Public URL of a stored name, each path segment percent-encoded
    pub fn url(&self, name: &str) -> String {
        let encoded: Vec<String> = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}{}", self.base_url, encoded.join("/"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Every dataset recorded so far, oldest first.
    ///
    /// Lines that do not parse are skipped with a warning.
    pub fn datasets(&self) -> Result<Vec<Dataset>, StorageError> {
        let ledger = self.location.join(LEDGER_FILE);
        if !ledger.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&ledger).map_err(|source| StorageError::Io {
            path: ledger.clone(),
            source,
        })?;

        Ok(data
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(i, line)| match serde_json::from_str(line) {
                Ok(dataset) => Some(dataset),
                Err(e) => {
                    log::warn!("skipping ledger line {}: {}", i + 1, e);
                    None
                }
            })
            .collect())
    }

    /// Append one record to the ledger as a single line
    fn record(&self, dataset: &Dataset) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(dataset)?;
        line.push('\n');

        let ledger = self.location.join(LEDGER_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&ledger)
            .map_err(|source| StorageError::Io {
                path: ledger.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|source| StorageError::Io {
                path: ledger,
                source,
            })
    }
}

/// Reduce a client-supplied file name to something safe to store.
///
/// Directory components are dropped, spaces become underscores and any
/// character other than letters, digits, `-`, `_` and `.` is removed.
/// Returns `None` if nothing usable is left.
pub fn valid_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let base = base.trim().replace(' ', "_");
    let cleaned = INVALID_NAME_CHARS.replace_all(&base, "").into_owned();

    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

fn with_random_suffix(name: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let token = &token[..7];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, token, ext),
        _ => format!("{}_{}", name, token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sanitised() {
        assert_eq!(valid_name("my cars.csv").as_deref(), Some("my_cars.csv"));
        assert_eq!(valid_name("../../etc/passwd.csv").as_deref(), Some("passwd.csv"));
        assert_eq!(valid_name("C:\\data\\a&b.csv").as_deref(), Some("ab.csv"));
        assert_eq!(valid_name(".."), None);
        assert_eq!(valid_name("   "), None);
    }

    #[test]
    fn suffix_goes_before_extension() {
        let renamed = with_random_suffix("cars.csv");
        assert!(renamed.starts_with("cars_"));
        assert!(renamed.ends_with(".csv"));
        assert_eq!(renamed.len(), "cars_.csv".len() + 7);
    }
}
