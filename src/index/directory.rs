//! Index directory: durable file publication, commits and generation lifetime.
//!
//! Every file is written under a temporary name, synced, and renamed into
//! place, so a name either does not exist or holds complete, checksummed
//! content. A commit publishes its descriptor this way and then swaps the
//! `CURRENT` pointer the same way; a crash at any point before that last
//! rename leaves the previous generation current.
//!
//! Readers register the generation they opened with the directory. A
//! generation that is current or still registered cannot be deleted. The
//! registry lives in the `Directory` value and its clones, so readers and
//! the writer of one process must share a `Directory`.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::error::{Result, TesseraError};
use crate::index::commit::{
    CURRENT_FILE, CommitDescriptor, commit_file_name, parse_commit_file_name,
};
use crate::index::segment::segment_of_file;
use crate::storage::file::FileStorage;
use crate::storage::structured::{StructReader, StructWriter, verify_checksum};
use crate::storage::traits::{Storage, StorageConfig, StorageLock, StorageOutput};

/// Suffix of files that are still being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Name of the writer lock.
pub const WRITE_LOCK: &str = "write";

/// Handle on the files of one index.
#[derive(Debug, Clone)]
pub struct Directory {
    storage: Arc<dyn Storage>,
    references: Arc<Mutex<HashMap<u64, usize>>>,
}

impl Directory {
    /// Wrap a storage backend. Nothing is written until the first commit.
    pub fn create_or_open(storage: Arc<dyn Storage>) -> Self {
        Directory {
            storage,
            references: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open (creating if needed) a file system directory.
    pub fn open_path<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let storage = FileStorage::new(path, config)?;
        Ok(Self::create_or_open(Arc::new(storage)))
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Create a new output; the file system backend fsyncs it on close.
    pub fn write_new(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.storage.create_output(name)
    }

    /// Atomically move a completed temporary file to its final name.
    pub fn atomic_publish(&self, temp_name: &str, final_name: &str) -> Result<()> {
        self.storage.rename_file(temp_name, final_name)?;
        self.storage.sync()
    }

    /// Write a checksummed file durably under `name`.
    ///
    /// `body` fills the file; the checksum trailer is appended afterwards.
    /// The content is only visible under `name` once it is complete and
    /// synced. Returns the file's checksum.
    pub fn write_file<F>(&self, name: &str, body: F) -> Result<u32>
    where
        F: FnOnce(&mut StructWriter<Box<dyn StorageOutput>>) -> Result<()>,
    {
        let temp_name = format!("{name}{TEMP_SUFFIX}");
        let result = self.write_temp(&temp_name, body);

        match result {
            Ok(checksum) => {
                self.atomic_publish(&temp_name, name)?;
                Ok(checksum)
            }
            Err(e) => {
                let _ = self.storage.delete_file(&temp_name);
                Err(e)
            }
        }
    }

    fn write_temp<F>(&self, temp_name: &str, body: F) -> Result<u32>
    where
        F: FnOnce(&mut StructWriter<Box<dyn StorageOutput>>) -> Result<()>,
    {
        let mut writer = StructWriter::new(self.write_new(temp_name)?);
        body(&mut writer)?;
        let (mut output, checksum) = writer.finish()?;
        output.flush_and_sync()?;
        output.close()?;
        Ok(checksum)
    }

    /// Read a checksummed file and return its verified body.
    ///
    /// A missing file is reported as corruption: callers only read files
    /// that a published commit refers to.
    pub fn read_verified(&self, name: &str) -> Result<Vec<u8>> {
        if !self.storage.file_exists(name) {
            return Err(TesseraError::corruption(format!("missing file {name}")));
        }
        let mut data = self.storage.read_all(name)?;
        let body_len = verify_checksum(name, &data)?.len();
        data.truncate(body_len);
        Ok(data)
    }

    /// Generation named by `CURRENT`, or `None` if nothing was ever published.
    pub fn current_generation(&self) -> Result<Option<u64>> {
        if !self.storage.file_exists(CURRENT_FILE) {
            return Ok(None);
        }

        let body = self.read_verified(CURRENT_FILE)?;
        let generation = StructReader::new(body.as_slice()).read_u64()?;
        Ok(Some(generation))
    }

    /// Load and validate the descriptor of a generation.
    pub fn read_commit(&self, generation: u64) -> Result<CommitDescriptor> {
        let name = commit_file_name(generation);
        let body = self.read_verified(&name)?;
        CommitDescriptor::from_json(&name, generation, &body)
    }

    /// Load the current descriptor, if any.
    pub fn read_current_commit(&self) -> Result<Option<CommitDescriptor>> {
        match self.current_generation()? {
            Some(generation) => self.read_commit(generation).map(Some),
            None => Ok(None),
        }
    }

    /// Publish a descriptor and make it current.
    ///
    /// The segment files it names must already be durable.
    pub fn publish_commit(&self, descriptor: &CommitDescriptor) -> Result<()> {
        let name = commit_file_name(descriptor.generation);
        let json = descriptor.to_json()?;
        self.write_file(&name, |writer| writer.write_raw(&json))?;
        debug!("wrote descriptor {name}");

        self.write_file(CURRENT_FILE, |writer| writer.write_u64(descriptor.generation))?;
        info!(
            "published generation {} ({} segments, {} docs)",
            descriptor.generation,
            descriptor.segments.len(),
            descriptor.doc_count()
        );
        Ok(())
    }

    /// Published generations with a descriptor file, ascending.
    ///
    /// A descriptor above the current generation belongs to a commit that
    /// never swapped `CURRENT` and is not listed.
    pub fn list_generations(&self) -> Result<Vec<u64>> {
        let Some(current) = self.current_generation()? else {
            return Ok(Vec::new());
        };
        let mut generations: Vec<u64> = self
            .storage
            .list_files()?
            .iter()
            .filter_map(|name| parse_commit_file_name(name))
            .filter(|&generation| generation <= current)
            .collect();
        generations.sort_unstable();
        Ok(generations)
    }

    /// Register a reader of `generation`; released when the guard drops.
    pub fn acquire(&self, generation: u64) -> GenerationGuard {
        *self.references.lock().entry(generation).or_insert(0) += 1;
        GenerationGuard {
            generation,
            references: Arc::clone(&self.references),
        }
    }

    /// Whether any live reader holds `generation`.
    pub fn is_referenced(&self, generation: u64) -> bool {
        self.references
            .lock()
            .get(&generation)
            .is_some_and(|&count| count > 0)
    }

    /// Delete a superseded, unreferenced generation.
    ///
    /// Removes its descriptor and every segment file that no remaining
    /// generation still uses.
    pub fn delete_generation(&self, generation: u64) -> Result<()> {
        if self.current_generation()? == Some(generation) {
            return Err(TesseraError::index(format!(
                "generation {generation} is current and cannot be deleted"
            )));
        }

        let name = commit_file_name(generation);
        if !self.storage.file_exists(&name) {
            return Err(TesseraError::index(format!(
                "generation {generation} does not exist"
            )));
        }

        let doomed: Vec<String> = match self.read_commit(generation) {
            Ok(descriptor) => descriptor
                .segments
                .iter()
                .map(|segment| segment.name.clone())
                .collect(),
            Err(e) => {
                warn!("deleting unreadable descriptor {name}: {e}");
                Vec::new()
            }
        };

        // Must not interleave with a reader registering this generation.
        {
            let references = self.references.lock();
            if references.get(&generation).is_some_and(|&count| count > 0) {
                return Err(TesseraError::index(format!(
                    "generation {generation} is still referenced by a reader"
                )));
            }
            self.storage.delete_file(&name)?;
        }

        let live = self.live_segments()?;
        let mut removed = 0;
        for file in self.storage.list_files()? {
            if let Some(segment) = segment_of_file(&file) {
                if doomed.iter().any(|d| d == segment) && !live.contains(segment) {
                    self.storage.delete_file(&file)?;
                    removed += 1;
                }
            }
        }
        self.storage.sync()?;

        info!("deleted generation {generation} ({removed} segment files removed)");
        Ok(())
    }

    /// Remove what interrupted commits left behind.
    ///
    /// Deletes descriptors above the current generation, temporary files,
    /// and segment files that no published generation uses, except the
    /// segments named in `keep`. Must only run under the write lock.
    /// Returns the number of files removed.
    pub fn sweep_unpublished(&self, keep: &[&str]) -> Result<usize> {
        let current = self.current_generation()?.unwrap_or(0);

        let mut live = BTreeSet::new();
        let mut readable = true;
        for generation in self.list_generations()? {
            match self.read_commit(generation) {
                Ok(descriptor) => live.extend(descriptor.segments.into_iter().map(|s| s.name)),
                Err(e) => {
                    warn!("not sweeping segments: generation {generation} is unreadable: {e}");
                    readable = false;
                }
            }
        }

        let mut removed = 0;
        for file in self.storage.list_files()? {
            let orphan = if file.ends_with(TEMP_SUFFIX) {
                true
            } else if let Some(generation) = parse_commit_file_name(&file) {
                generation > current
            } else if let Some(segment) = segment_of_file(&file) {
                readable && !live.contains(segment) && !keep.contains(&segment)
            } else {
                false
            };

            if orphan {
                debug!("sweeping unpublished file {file}");
                self.storage.delete_file(&file)?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.storage.sync()?;
            info!("swept {removed} files left by interrupted commits");
        }
        Ok(removed)
    }

    /// Segment names used by any remaining readable generation.
    fn live_segments(&self) -> Result<BTreeSet<String>> {
        let mut live = BTreeSet::new();
        for generation in self.list_generations()? {
            match self.read_commit(generation) {
                Ok(descriptor) => {
                    live.extend(descriptor.segments.into_iter().map(|s| s.name));
                }
                Err(e) => warn!("skipping unreadable generation {generation}: {e}"),
            }
        }
        Ok(live)
    }

    /// Acquire the single-writer lock.
    pub fn lock(&self) -> Result<Box<dyn StorageLock>> {
        self.storage.lock_manager().acquire_lock(WRITE_LOCK)
    }
}

/// Keeps a generation registered as in use.
#[derive(Debug)]
pub struct GenerationGuard {
    generation: u64,
    references: Arc<Mutex<HashMap<u64, usize>>>,
}

impl GenerationGuard {
    /// The guarded generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        let mut references = self.references.lock();
        if let Some(count) = references.get_mut(&self.generation) {
            *count -= 1;
            if *count == 0 {
                references.remove(&self.generation);
            }
        }
    }
}
