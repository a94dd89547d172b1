use std::io;
use std::path::{Path, PathBuf};

/// Writes `contents` to a sibling `.tmp` file and renames it over `path`,
/// creating parent directories first.
pub(crate) async fn write_atomically(path: &Path, contents: String) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = tmp_path(path);
    tokio::fs::write(&tmp_path, contents).await?;
    if let Err(error) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(error);
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replaces_file_and_leaves_no_temp_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a").join("b.json");

        write_atomically(&path, String::from("one")).await.expect("first write");
        write_atomically(&path, String::from("two")).await.expect("second write");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "two");
        assert!(!dir.path().join("a").join("b.json.tmp").exists());
    }
}
