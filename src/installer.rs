//! Secure Terraform installation.
//!
//! Downloads a pinned release, verifies a detached ed25519 signature over
//! the checksum manifest against the configured release keys, verifies the
//! archive's SHA-256 sum against the manifest, and extracts the binary into
//! the version-keyed cache directory.
//!
//! The steps run strictly in sequence with no retries; any failure is
//! terminal for the run. All intermediate artifacts live in a staging
//! directory inside the cache root, and the extracted tree is renamed into
//! place atomically, so a concurrent install of the same version cannot
//! observe a half-written cache entry. Losing that rename race to another
//! invocation is accepted as success.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{Result, TfwrapError};

/// Download URL templates with `{version}`, `{os}`, and `{arch}`
/// placeholders.
pub struct UrlTemplates {
    pub archive: String,
    pub checksums: String,
    pub signature: String,
}

impl UrlTemplates {
    /// Templates for the official Terraform release host.
    pub fn hashicorp() -> Self {
        Self {
            archive: "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_{os}_{arch}.zip".to_string(),
            checksums: "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_SHA256SUMS".to_string(),
            signature: "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_SHA256SUMS.sig".to_string(),
        }
    }

    fn fill(&self, template: &str, version: &str) -> String {
        let (os, arch) = platform();
        template
            .replace("{version}", version)
            .replace("{os}", os)
            .replace("{arch}", arch)
    }
}

/// Release naming for the current platform.
fn platform() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    (os, arch)
}

/// Transport seam so tests can install without a network.
pub trait ArtifactFetcher {
    /// Fetch `url` into the file at `dest`.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

impl<T: ArtifactFetcher + ?Sized> ArtifactFetcher for &T {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        (**self).fetch(url, dest)
    }
}

/// Production fetcher backed by a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TfwrapError::download(url, e))?;
        let bytes = response
            .bytes()
            .map_err(|e| TfwrapError::download(url, e))?;
        fs::write(dest, &bytes)?;
        Ok(())
    }
}

/// Parse a hex-encoded ed25519 public key.
pub fn parse_public_key(hex_key: &str) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = hex::decode(hex_key.trim())
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(|| {
            TfwrapError::SignatureVerification(format!("invalid public key: {hex_key:?}"))
        })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| TfwrapError::SignatureVerification(format!("invalid public key: {e}")))
}

/// Installs one pinned Terraform version into the cache.
pub struct Installer<F: ArtifactFetcher> {
    urls: UrlTemplates,
    version: String,
    keys: Vec<VerifyingKey>,
    /// Final install directory, `<cache root>/<version>`.
    version_dir: PathBuf,
    fetcher: F,
}

impl<F: ArtifactFetcher> Installer<F> {
    pub fn new(
        urls: UrlTemplates,
        version: impl Into<String>,
        keys: Vec<VerifyingKey>,
        version_dir: impl Into<PathBuf>,
        fetcher: F,
    ) -> Self {
        Self {
            urls,
            version: version.into(),
            keys,
            version_dir: version_dir.into(),
            fetcher,
        }
    }

    /// Download, verify, and extract the pinned version.
    pub fn install(&self) -> Result<()> {
        let cache_root = self
            .version_dir
            .parent()
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(cache_root)?;
        // Staging in the cache root keeps the final rename on one filesystem.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(cache_root)?;

        info!(version = %self.version, "downloading terraform distribution");
        let archive = self.download(&self.urls.archive, staging.path())?;
        info!("downloading checksum manifest");
        let checksums = self.download(&self.urls.checksums, staging.path())?;
        info!("downloading checksum manifest signature");
        let signature = self.download(&self.urls.signature, staging.path())?;

        info!("verifying manifest signature");
        verify_signature(&self.keys, &checksums, &signature)?;
        info!("verifying archive checksum");
        verify_checksum(&archive, &checksums)?;

        info!("extracting distribution");
        let extracted = staging.path().join("install");
        fs::create_dir(&extracted)?;
        extract(&archive, &extracted)?;

        match fs::rename(&extracted, &self.version_dir) {
            Ok(()) => Ok(()),
            // Another invocation installed this version first.
            Err(_) if self.version_dir.is_dir() => Ok(()),
            Err(e) => Err(e.into()),
        }
        // Staging directory (downloads, manifest, signature) is dropped here.
    }

    fn download(&self, template: &str, staging: &Path) -> Result<PathBuf> {
        let url = self.urls.fill(template, &self.version);
        let file_name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| TfwrapError::download(&url, "URL has no file name"))?;
        let dest = staging.join(file_name);
        self.fetcher.fetch(&url, &dest)?;
        Ok(dest)
    }
}

/// Verify the detached signature over the manifest. Success against any one
/// configured key is sufficient; this keeps old pinned versions installable
/// across key rotations. If every key fails, all per-key failures are
/// reported together.
fn verify_signature(keys: &[VerifyingKey], manifest: &Path, signature: &Path) -> Result<()> {
    let manifest_bytes = fs::read(manifest)?;
    let signature_bytes = fs::read(signature)?;
    let signature = Signature::from_slice(&signature_bytes).map_err(|e| {
        TfwrapError::SignatureVerification(format!("invalid signature file: {e}"))
    })?;

    let mut failures = Vec::with_capacity(keys.len());
    for key in keys {
        match key.verify_strict(&manifest_bytes, &signature) {
            Ok(()) => return Ok(()),
            Err(e) => failures.push(format!(
                "key {}: {e}",
                &hex::encode(key.to_bytes())[..8]
            )),
        }
    }
    Err(TfwrapError::SignatureVerification(failures.join("\n")))
}

/// Verify the archive's SHA-256 sum against the manifest line naming it.
fn verify_checksum(archive: &Path, manifest: &Path) -> Result<()> {
    let mut hasher = Sha256::new();
    let mut file = fs::File::open(archive)?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual = hex::encode(hasher.finalize());

    let archive_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let manifest_text = fs::read_to_string(manifest)?;
    for line in manifest_text.lines() {
        let mut fields = line.split_whitespace();
        let declared = fields.next();
        if fields.next_back() == Some(archive_name) {
            return match declared {
                Some(declared) if declared == actual => Ok(()),
                _ => Err(TfwrapError::checksum("invalid checksum")),
            };
        }
    }
    Err(TfwrapError::checksum("no matching checksum found"))
}

/// Unpack the release archive. Runs only after both verifications passed.
fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| TfwrapError::extraction(e.to_string()))?;
    zip.extract(dest)
        .map_err(|e| TfwrapError::extraction(e.to_string()))
}
