use crate::plan::{BinutilsSpec, Verification};
use reqwest::Client;
use ring::digest::{self, Context};
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Fetcher {
    http_client: Client,
}

#[derive(Debug)]
pub struct FetchedArchive {
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct KilnFetchError {
    kind: FetchErrorKind,
    affected: FetchAffected,
    url: String,
}

#[derive(Debug)]
enum FetchErrorKind {
    VerificationFailed { hashes: Vec<FailedHash> },
}

#[derive(Debug)]
enum FetchAffected {
    Downloaded,
    Reused(PathBuf),
}

#[derive(Debug)]
pub struct FailedHash {
    pub algo: &'static str,
    pub found: Vec<u8>,
    pub expected: Vec<u8>,
}

impl Display for KilnFetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FetchErrorKind::VerificationFailed { hashes } => {
                write!(f, "verification of {} failed", self.url)?;

                for hash in hashes {
                    write!(
                        f,
                        "\n\t{}: expected {} but computed {}",
                        hash.algo,
                        hex::encode(&hash.expected),
                        hex::encode(&hash.found)
                    )?;
                }

                if let FetchAffected::Reused(path) = &self.affected {
                    write!(
                        f,
                        "\n\tthe archive at {} looks stale, delete it to force a fresh download",
                        path.display()
                    )?;
                }
            }
        }

        Ok(())
    }
}

impl std::error::Error for KilnFetchError {}

/// Streams the digests named by a verification block in parallel with the
/// download, so no second pass over the archive is needed.
pub struct DigestPool {
    pool: Vec<(Context, Vec<u8>, &'static str)>,
}

impl DigestPool {
    pub fn from_verification(verification: &Verification) -> DigestPool {
        let mut pool = vec![];

        if let Some(sha256) = &verification.sha256 {
            pool.push((Context::new(&digest::SHA256), sha256.to_vec(), "sha256"));
        }

        DigestPool { pool }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        for (context, _, _) in &mut self.pool {
            context.update(chunk);
        }
    }

    pub fn finish(self) -> Result<(), Vec<FailedHash>> {
        let mut failed = vec![];

        for (context, expected, algo) in self.pool {
            let found = context.finish();

            if found.as_ref() != expected.as_slice() {
                failed.push(FailedHash {
                    algo,
                    found: found.as_ref().to_vec(),
                    expected,
                });
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(failed)
        }
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Fetcher {
            http_client: Client::new(),
        }
    }

    /// Downloads the archive named by the spec into `dest`, skipping the
    /// transfer entirely when a file of that name already verifies.
    pub async fn fetch(&self, spec: &BinutilsSpec, dest: &Path) -> anyhow::Result<FetchedArchive> {
        let path = dest.join(spec.archive_file_name());

        let present = match tokio::fs::metadata(&path).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if present {
            return match self.verify_file(&path, &spec.verification).await? {
                Ok(()) => {
                    debug!(path = %path.display(), "archive already on disk, skipping download");
                    Ok(FetchedArchive { path })
                }

                Err(hashes) => Err(KilnFetchError {
                    kind: FetchErrorKind::VerificationFailed { hashes },
                    affected: FetchAffected::Reused(path),
                    url: spec.url.clone(),
                }
                .into()),
            };
        }

        info!(url = %spec.url, "downloading");

        let request = self.http_client.get(&spec.url).build()?;
        let mut response = self
            .http_client
            .execute(request)
            .await?
            .error_for_status()?;

        let mut pool = DigestPool::from_verification(&spec.verification);
        let mut file = File::create(&path).await?;

        while let Some(chunk) = response.chunk().await? {
            pool.update(&chunk);
            file.write_all(&chunk).await?;
        }

        if let Err(hashes) = pool.finish() {
            drop(file);
            tokio::fs::remove_file(&path).await?;

            return Err(KilnFetchError {
                kind: FetchErrorKind::VerificationFailed { hashes },
                affected: FetchAffected::Downloaded,
                url: spec.url.clone(),
            }
            .into());
        }

        file.sync_all().await?;

        Ok(FetchedArchive { path })
    }

    pub async fn verify_file(
        &self,
        path: &Path,
        verification: &Verification,
    ) -> anyhow::Result<Result<(), Vec<FailedHash>>> {
        let mut pool = DigestPool::from_verification(verification);
        let mut file = File::open(path).await?;
        let mut buffer = [0u8; 4096];

        loop {
            let read = file.read(&mut buffer).await?;

            if read == 0 {
                break;
            }

            pool.update(&buffer[..read]);
        }

        Ok(pool.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::BinutilsSpec;

    #[tokio::test]
    async fn verify_file_computes_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let mut verification = Verification::default();
        let digest =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();
        verification.sha256 = Some(digest.try_into().unwrap());

        let fetcher = Fetcher::new();
        let good = fetcher.verify_file(&path, &verification).await.unwrap();
        assert!(good.is_ok());

        verification.sha256 = Some([0u8; 32]);
        let failed = fetcher
            .verify_file(&path, &verification)
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].algo, "sha256");
    }

    #[tokio::test]
    async fn empty_verification_accepts_anything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        tokio::fs::write(&path, b"whatever").await.unwrap();

        let fetcher = Fetcher::new();
        let result = fetcher
            .verify_file(&path, &Verification::default())
            .await
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn downloads_once_and_reuses_the_archive() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/binutils-9.99.tar.gz")
            .with_body("not really a tarball")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let spec = BinutilsSpec {
            url: format!("{}/binutils-9.99.tar.gz", server.url()),
            ..BinutilsSpec::default()
        };

        let fetcher = Fetcher::new();
        let first = fetcher.fetch(&spec, dir.path()).await.unwrap();
        let second = fetcher.fetch(&spec, dir.path()).await.unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(
            tokio::fs::read(&first.path).await.unwrap(),
            b"not really a tarball"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn mismatched_digests_delete_the_download() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/binutils-9.99.tar.gz")
            .with_body("tampered")
            .create_async()
            .await;

        let mut spec = BinutilsSpec {
            url: format!("{}/binutils-9.99.tar.gz", server.url()),
            ..BinutilsSpec::default()
        };
        spec.verification.sha256 = Some([0u8; 32]);

        let dir = tempfile::tempdir().unwrap();
        let err = Fetcher::new().fetch(&spec, dir.path()).await.unwrap_err();

        assert!(err.to_string().contains("verification"));
        let path = dir.path().join("binutils-9.99.tar.gz");
        assert!(tokio::fs::metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn stale_archives_are_reported_instead_of_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binutils-9.99.tar.gz");
        tokio::fs::write(&path, b"left over from last time").await.unwrap();

        let mut spec = BinutilsSpec {
            url: "https://downloads.invalid/binutils-9.99.tar.gz".to_string(),
            ..BinutilsSpec::default()
        };
        spec.verification.sha256 = Some([0u8; 32]);

        let err = Fetcher::new().fetch(&spec, dir.path()).await.unwrap_err();
        let text = err.to_string();

        assert!(text.contains("delete it to force a fresh download"));
        assert!(tokio::fs::metadata(&path).await.is_ok());
    }
}
