//! Exclusive-create writes with optimistic collision handling.
//!
//! Two uploads that sanitize to the same name race on `create_new`; the loser
//! tries `stem__1.ext`, `stem__2.ext`, ... and then a few random suffixes.
//! No lock is taken: the filesystem's exclusive create is the arbiter.

use crate::error::{Result, StageError};
use auditflow_security::{split_extension, StreamingDigest};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;
const MAX_NUMBERED_SUFFIXES: u32 = 64;
const RANDOM_SUFFIX_ATTEMPTS: u32 = 3;

/// A file committed to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub saved_name: String,
    pub path: PathBuf,
    pub byte_size: u64,
    pub sha256: String,
}

/// Stream `body` into a new file named `name` (or a disambiguated variant)
/// inside `dir`.
///
/// The body must yield exactly `declared` bytes. On any failure the file
/// claimed by this call is removed.
pub async fn write_exclusive<R>(
    dir: &Path,
    name: &str,
    body: &mut R,
    declared: u64,
) -> Result<WrittenFile>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let (mut file, saved_name, path) = claim(dir, name).await?;

    match stream_into(&mut file, body, name, declared).await {
        Ok(digest) => {
            let byte_size = digest.bytes();
            Ok(WrittenFile {
                saved_name,
                path,
                byte_size,
                sha256: digest.finish(),
            })
        }
        Err(err) => {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            Err(err)
        }
    }
}

async fn claim(dir: &Path, name: &str) -> Result<(File, String, PathBuf)> {
    for candidate in candidate_names(name) {
        let path = dir.join(&candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, candidate, path)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(name = %candidate, "Name taken, probing next");
            }
            Err(err) => return Err(StageError::io(path, err)),
        }
    }
    Err(StageError::Collision {
        name: name.to_string(),
    })
}

/// `name`, then `stem__1.ext` ..= `stem__64.ext`, then random 8-hex suffixes.
fn candidate_names(name: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = split_extension(name);
    let with_suffix = move |suffix: String| match ext {
        Some(ext) => format!("{}__{}.{}", stem, suffix, ext),
        None => format!("{}__{}", stem, suffix),
    };

    std::iter::once(name.to_string())
        .chain((1..=MAX_NUMBERED_SUFFIXES).map(move |n| with_suffix(n.to_string())))
        .chain((0..RANDOM_SUFFIX_ATTEMPTS).map(move |_| with_suffix(random_suffix())))
}

fn random_suffix() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(8);
    hex
}

async fn stream_into<R>(
    file: &mut File,
    body: &mut R,
    name: &str,
    declared: u64,
) -> Result<StreamingDigest>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut digest = StreamingDigest::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mismatch = |actual: u64| StageError::SizeMismatch {
        name: name.to_string(),
        declared,
        actual,
    };

    loop {
        let read = body
            .read(&mut buf)
            .await
            .map_err(|err| StageError::io(name, err))?;
        if read == 0 {
            break;
        }
        let chunk = &buf[..read];
        if digest.bytes() + read as u64 > declared {
            return Err(mismatch(digest.bytes() + read as u64));
        }
        file.write_all(chunk)
            .await
            .map_err(|err| StageError::io(name, err))?;
        digest.update(chunk);
    }

    if digest.bytes() != declared {
        return Err(mismatch(digest.bytes()));
    }
    file.flush().await.map_err(|err| StageError::io(name, err))?;
    file.sync_all()
        .await
        .map_err(|err| StageError::io(name, err))?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Cursor;

    #[test]
    fn candidate_sequence() {
        let names: Vec<String> = candidate_names("Report (1).pdf").take(3).collect();
        assert_eq!(
            names,
            vec!["Report (1).pdf", "Report (1)__1.pdf", "Report (1)__2.pdf"]
        );
        let all: Vec<String> = candidate_names("notes").collect();
        assert_eq!(all.len(), 1 + 64 + 3);
        assert_eq!(all[64], "notes__64");
        assert!(all[65].starts_with("notes__") && all[65].len() == "notes__".len() + 8);
    }

    #[tokio::test]
    async fn second_write_gets_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let first = write_exclusive(tmp.path(), "a.pdf", &mut Cursor::new(b"one".to_vec()), 3)
            .await
            .unwrap();
        let second = write_exclusive(tmp.path(), "a.pdf", &mut Cursor::new(b"two".to_vec()), 3)
            .await
            .unwrap();
        assert_eq!(first.saved_name, "a.pdf");
        assert_eq!(second.saved_name, "a__1.pdf");
        assert_eq!(std::fs::read(tmp.path().join("a.pdf")).unwrap(), b"one");
        assert_eq!(std::fs::read(tmp.path().join("a__1.pdf")).unwrap(), b"two");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_share_a_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let dir = dir.clone();
            handles.push(tokio::spawn(async move {
                let body = vec![i; 1024];
                write_exclusive(&dir, "same.csv", &mut Cursor::new(body), 1024)
                    .await
                    .unwrap()
            }));
        }

        let mut names = HashSet::new();
        for handle in handles {
            let written = handle.await.unwrap();
            let on_disk = std::fs::read(&written.path).unwrap();
            assert_eq!(on_disk.len(), 1024);
            assert!(names.insert(written.saved_name));
        }
        assert_eq!(names.len(), 16);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 16);
    }

    #[tokio::test]
    async fn size_mismatch_removes_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = write_exclusive(tmp.path(), "a.csv", &mut Cursor::new(b"12345".to_vec()), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::SizeMismatch { declared: 3, .. }));

        let err = write_exclusive(tmp.path(), "b.csv", &mut Cursor::new(b"12".to_vec()), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::SizeMismatch { actual: 2, .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn records_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let written = write_exclusive(
            tmp.path(),
            "hello.txt",
            &mut Cursor::new(b"hello world".to_vec()),
            11,
        )
        .await
        .unwrap();
        assert_eq!(
            written.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(written.byte_size, 11);
    }
}
