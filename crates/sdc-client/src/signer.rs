//! HTTP signature authentication for CloudAPI
//!
//! Every request carries a `Date` header and an `Authorization` header
//! whose signature covers the line `date: <Date>`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reaper_core::{ReaperError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

pub trait RequestSigner {
    /// Algorithm name as advertised in the `Authorization` header.
    fn algorithm(&self) -> &str;

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Signs with an RSA private key through the `openssl` binary.
#[derive(Debug, Clone)]
pub struct OpenSslSigner {
    key_path: PathBuf,
}

impl OpenSslSigner {
    pub fn new(key_path: impl AsRef<Path>) -> Self {
        Self {
            key_path: key_path.as_ref().to_path_buf(),
        }
    }
}

impl RequestSigner for OpenSslSigner {
    fn algorithm(&self) -> &str {
        "rsa-sha256"
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if !self.key_path.is_file() {
            return Err(ReaperError::Signing {
                reason: format!("private key {} not found", self.key_path.display()),
            });
        }
        debug!(key_path = %self.key_path.display(), "Signing request");

        let mut child = Command::new("openssl")
            .args(["dgst", "-sha256", "-sign"])
            .arg(&self.key_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| ReaperError::Signing {
                reason: format!("cannot run openssl: {error}"),
            })?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| ReaperError::Signing {
                reason: "openssl stdin unavailable".to_string(),
            })?;
            stdin.write_all(payload).map_err(|error| ReaperError::Signing {
                reason: format!("cannot write to openssl: {error}"),
            })?;
        }

        let output = child.wait_with_output().map_err(|error| ReaperError::Signing {
            reason: format!("openssl did not finish: {error}"),
        })?;
        if !output.status.success() {
            return Err(ReaperError::Signing {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// RFC 1123 date, always GMT.
pub fn date_header(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn authorization_header(
    account: &str,
    key_id: &str,
    algorithm: &str,
    signature: &[u8],
) -> String {
    format!(
        "Signature keyId=\"/{}/keys/{}\",algorithm=\"{}\",signature=\"{}\"",
        account,
        key_id,
        algorithm,
        STANDARD.encode(signature)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_header_is_rfc1123() {
        let now = Utc.with_ymd_and_hms(2014, 1, 5, 21, 31, 40).unwrap();
        assert_eq!(date_header(now), "Sun, 05 Jan 2014 21:31:40 GMT");
    }

    #[test]
    fn test_authorization_header() {
        let header = authorization_header("ci", "aa:bb:cc", "rsa-sha256", b"sig");
        assert_eq!(
            header,
            "Signature keyId=\"/ci/keys/aa:bb:cc\",algorithm=\"rsa-sha256\",signature=\"c2ln\""
        );
    }

    #[test]
    fn test_missing_key_is_a_signing_error() {
        let signer = OpenSslSigner::new("/nonexistent/reaper/id_rsa");
        let error = signer.sign(b"date: now").unwrap_err();
        assert!(matches!(error, ReaperError::Signing { .. }));
        assert!(error.to_string().contains("/nonexistent/reaper/id_rsa"));
    }
}
