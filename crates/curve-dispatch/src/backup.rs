//! Tier 3 local backup file writer (§4.6).

use std::path::{Path, PathBuf};

use curve_types::DlqRecord;

/// Write `record` as `{event_id}.json` under `backup_dir`, then attempt to
/// restrict the file to owner-only read/write.
///
/// Returns `Ok(true)` if permissions were applied successfully, `Ok(false)`
/// if the write succeeded but `set_permissions` failed (caller decides
/// whether that's tolerable based on its production flag), and `Err` if the
/// write itself failed.
pub async fn write_backup_file(backup_dir: &Path, record: &DlqRecord) -> std::io::Result<(PathBuf, bool)> {
    tokio::fs::create_dir_all(backup_dir).await?;
    let path = backup_dir.join(record.backup_file_name());
    let bytes = serde_json::to_vec_pretty(record).map_err(std::io::Error::other)?;
    tokio::fs::write(&path, bytes).await?;

    let permissions_ok = restrict_to_owner(&path).await.is_ok();
    Ok((path, permissions_ok))
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    permissions.set_mode(0o600);
    tokio::fs::set_permissions(path, permissions).await
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn writes_file_named_after_event_id() {
        let dir = tempfile::tempdir().unwrap();
        let record = DlqRecord::new(42, "orders", vec![1, 2, 3], "TimeoutError", "ack timed out", Utc::now());

        let (path, permissions_ok) = write_backup_file(dir.path(), &record).await.unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "42.json");
        assert!(permissions_ok);

        let contents = tokio::fs::read(&path).await.unwrap();
        let parsed: DlqRecord = serde_json::from_slice(&contents).unwrap();
        assert_eq!(parsed, record);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_owner_only_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let record = DlqRecord::new(7, "orders", vec![], "TimeoutError", "ack timed out", Utc::now());
        let (path, _) = write_backup_file(dir.path(), &record).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
