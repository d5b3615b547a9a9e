// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // child names
}

/// In-memory filesystem for tests.
///
/// Clones share the same tree, so a test can keep one handle for
/// assertions while the workflow owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = BTreeMap::new();
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut files = self.entries();
        insert_file(&mut files, path, content.into());
    }

    /// Contents of a file, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.entries().get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// Every file path currently stored, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.entries()
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File(_)))
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parent_of(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(Path::new("."))
    } else {
        Some(parent)
    }
}

fn link_child(files: &mut BTreeMap<PathBuf, MockEntry>, parent: &Path, path: &Path) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

fn unlink_child(files: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    let (Some(parent), Some(name)) = (parent_of(path), path.file_name().and_then(|n| n.to_str()))
    else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        children.retain(|c| c != name);
    }
}

fn insert_file(files: &mut BTreeMap<PathBuf, MockEntry>, path: &Path, content: Vec<u8>) {
    files.insert(path.to_path_buf(), MockEntry::File(content));
    if let Some(parent) = parent_of(path) {
        ensure_dir_entry(files, parent);
        link_child(files, parent, path);
    }
}

fn ensure_dir_entry(files: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    if files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = parent_of(path) {
        if parent != path {
            ensure_dir_entry(files, parent);
            link_child(files, parent, path);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.entries().get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        match self.entries().get(path) {
            Some(MockEntry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Dir(_)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.entries();
        if let Some(MockEntry::File(_)) = files.get(path) {
            return Err(anyhow!("Is a file: {:?}", path));
        }
        ensure_dir_entry(&mut files, path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.entries();
        match files.remove(from) {
            Some(MockEntry::File(content)) => {
                unlink_child(&mut files, from);
                insert_file(&mut files, to, content);
                Ok(())
            }
            Some(dir @ MockEntry::Dir(_)) => {
                files.insert(from.to_path_buf(), dir);
                Err(anyhow!("Renaming directories is not supported: {:?}", from))
            }
            None => Err(anyhow!("File not found: {:?}", from)),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut files = self.entries();
        match files.get(path) {
            Some(MockEntry::File(_)) => {
                files.remove(path);
                unlink_child(&mut files, path);
                Ok(())
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.entries().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
