use std::path::Path;
use tokio::fs::{DirEntry, ReadDir};
use tokio::io;

/// Depth first iteration over every file below a directory, directories
/// themselves are descended into but never yielded.
pub struct FileWalker {
    stack: Vec<ReadDir>,
}

impl FileWalker {
    pub async fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(FileWalker {
            stack: vec![tokio::fs::read_dir(path).await?],
        })
    }

    pub async fn next(&mut self) -> io::Result<Option<DirEntry>> {
        loop {
            let top = match self.stack.last_mut() {
                Some(top) => top,
                None => return Ok(None),
            };

            let entry = match top.next_entry().await? {
                Some(entry) => entry,
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            if entry.file_type().await?.is_dir() {
                self.stack.push(tokio::fs::read_dir(entry.path()).await?);
                continue;
            }

            return Ok(Some(entry));
        }
    }
}
