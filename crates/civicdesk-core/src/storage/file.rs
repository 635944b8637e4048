use std::fs::{DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Storage;

/// Session directory is readable by its owner only
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Session files hold bearer tokens: owner read/write only
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Stores each key as its own file inside a session directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a storage key onto a flat file name (`auth/organization` -> `auth-organization`)
    fn key_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(name)
    }

    fn create_dir(&self) -> io::Result<()> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(DIR_MODE);
        }
        builder.create(&self.dir)
    }
}

/// Write `value` to `path`, restricting the file to its owner. Files left
/// by older versions with wider modes are tightened on the next write.
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(FILE_MODE))?;
    }
    file.write_all(value.as_bytes())
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {}", key))?;
        Ok(Some(contents))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.create_dir()
            .with_context(|| format!("Failed to create session directory {}", self.dir.display()))?;
        write_private(&self.key_path(key), value)
            .with_context(|| format!("Failed to write session file: {}", key))?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove session file: {}", key))?;
        }
        Ok(())
    }
}
