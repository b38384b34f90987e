//! Shared filesystem helpers for the battery workspace.

use anyhow::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Write-then-rename so readers never observe a half-written artifact.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, pid));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Append a single line to an append-only log, creating it on first use.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Short random alphanumeric identifier, e.g. for sandbox directory names.
pub fn short_id<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "battery_core_{}_{}_{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp() {
        let root = temp_root("atomic");
        let target = root.join("artifact.txt");
        atomic_write_bytes(&target, b"first").expect("first write");
        atomic_write_bytes(&target, b"second").expect("second write");
        assert_eq!(fs::read(&target).expect("read back"), b"second");
        let entries: Vec<_> = fs::read_dir(&root)
            .expect("list dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(entries.len(), 1, "temp file left behind: {:?}", entries);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn append_line_accumulates_in_order() {
        let root = temp_root("append");
        let log = root.join("log.txt");
        append_line(&log, "one").expect("append one");
        append_line(&log, "two").expect("append two");
        let data = fs::read_to_string(&log).expect("read log");
        assert_eq!(data, "one\ntwo\n");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn short_id_is_alphanumeric_with_requested_length() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let id = short_id(&mut rng, 5);
            assert_eq!(id.len(), 5);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "{}", id);
        }
    }
}
