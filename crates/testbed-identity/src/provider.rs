//! Signing key providers
//!
//! [`FileKeyProvider`] lets separate test binaries in one CI run share a
//! verification key. Within a process the first caller generates or loads the
//! key exactly once; across processes an exclusive advisory lock on a sibling
//! `.lock` file serializes generation and the key file is only ever replaced
//! by an atomic rename, so a reader never sees a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::keys::SigningKey;

/// Environment variable naming the shared key cache file
pub const KEY_CACHE_ENV: &str = "TESTBED_KEY_CACHE";

/// Source of the issuer's signing key
pub trait KeyProvider: Send + Sync {
    /// The key, generating or loading it on first use.
    fn get_or_create(&self) -> Result<Arc<SigningKey>>;
}

/// Generates one key per provider instance, on first use
#[derive(Debug, Default)]
pub struct EphemeralKeyProvider {
    key: OnceLock<Arc<SigningKey>>,
    init: Mutex<()>,
}

impl EphemeralKeyProvider {
    /// Create a provider; no key is generated yet
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyProvider for EphemeralKeyProvider {
    fn get_or_create(&self) -> Result<Arc<SigningKey>> {
        if let Some(key) = self.key.get() {
            return Ok(Arc::clone(key));
        }
        let _guard = self.init.lock();
        if let Some(key) = self.key.get() {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(SigningKey::generate()?);
        debug!(kid = key.kid(), "generated ephemeral signing key");
        Ok(Arc::clone(self.key.get_or_init(|| key)))
    }
}

/// Persists one key as a PKCS#8 PEM file
#[derive(Debug)]
pub struct FileKeyProvider {
    path: PathBuf,
    key: OnceLock<Arc<SigningKey>>,
    init: Mutex<()>,
}

impl FileKeyProvider {
    /// Create a provider caching its key at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Provider for `$TESTBED_KEY_CACHE`, or the default temp location
    pub fn from_env() -> Self {
        let path = std::env::var_os(KEY_CACHE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_path);
        Self::new(path)
    }

    /// Path of the key cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn load_or_generate(&self) -> Result<SigningKey> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.load_or_generate_locked();
        let _ = FileExt::unlock(&lock);
        result
    }

    fn load_or_generate_locked(&self) -> Result<SigningKey> {
        if self.path.exists() {
            let pem_data = fs::read_to_string(&self.path)?;
            let key = SigningKey::from_pem(&pem_data)?;
            info!(path = %self.path.display(), kid = key.kid(), "loaded cached signing key");
            return Ok(key);
        }

        let key = SigningKey::generate()?;
        let tmp = sibling(&self.path, &format!("tmp.{}", std::process::id()));
        {
            let mut file = create_private(&tmp)?;
            file.write_all(key.private_key_pem().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), kid = key.kid(), "generated and cached signing key");
        Ok(key)
    }
}

impl KeyProvider for FileKeyProvider {
    fn get_or_create(&self) -> Result<Arc<SigningKey>> {
        if let Some(key) = self.key.get() {
            return Ok(Arc::clone(key));
        }
        let _guard = self.init.lock();
        if let Some(key) = self.key.get() {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(self.load_or_generate()?);
        Ok(Arc::clone(self.key.get_or_init(|| key)))
    }
}

/// Default key cache location under the system temp dir
pub fn default_cache_path() -> PathBuf {
    std::env::temp_dir()
        .join("testbed-identity")
        .join("signing-key.pem")
}

/// The process-wide provider behind [`shared_identity`](crate::shared_identity)
pub fn shared_key_provider() -> &'static FileKeyProvider {
    static SHARED: OnceLock<FileKeyProvider> = OnceLock::new();
    SHARED.get_or_init(FileKeyProvider::from_env)
}

/// `signing-key.pem` -> `signing-key.pem.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}
