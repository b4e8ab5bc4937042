//! The index writer: buffers documents into segments and commits them.
//!
//! Documents added to a writer are invisible to readers until `commit`
//! returns. Flushed segments that have not been committed yet are "pending";
//! a crash or a `rollback` discards them and the last committed generation
//! stays current.

use log::{debug, info, warn};

use crate::config::WriterConfig;
use crate::document::Document;
use crate::error::{Result, TesseraError};
use crate::index::commit::CommitDescriptor;
use crate::index::directory::Directory;
use crate::index::segment::{SegmentMeta, segment_name};
use crate::index::segment_writer::SegmentWriter;
use crate::index::{DocId, TERMINATED};
use crate::storage::traits::StorageLock;

/// Single writer of an index directory.
///
/// Holds the directory's write lock for its whole lifetime, so a second
/// writer on the same directory fails to open.
pub struct IndexWriter {
    directory: Directory,
    config: WriterConfig,
    lock: Option<Box<dyn StorageLock>>,
    generation: u64,
    committed: Vec<SegmentMeta>,
    pending: Vec<SegmentMeta>,
    current: Option<SegmentWriter>,
    next_segment: u64,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("generation", &self.generation)
            .field("committed_segments", &self.committed.len())
            .field("pending_segments", &self.pending.len())
            .field("buffered_docs", &self.buffered_docs())
            .field("next_segment", &self.next_segment)
            .finish()
    }
}

impl IndexWriter {
    /// Open a writer on `directory`, continuing from its current generation.
    pub fn open(directory: Directory, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        let lock = directory.lock()?;
        directory.sweep_unpublished(&[])?;

        let (generation, committed, next_segment) = match directory.read_current_commit()? {
            Some(descriptor) => (
                descriptor.generation,
                descriptor.segments,
                descriptor.next_segment,
            ),
            None => (0, Vec::new(), 0),
        };
        debug!(
            "opened writer at generation {generation} ({} segments)",
            committed.len()
        );

        Ok(IndexWriter {
            directory,
            config,
            lock: Some(lock),
            generation,
            committed,
            pending: Vec::new(),
            current: None,
            next_segment,
        })
    }

    /// The directory this writer publishes to.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Last generation this writer committed or opened at (0 if none).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Documents in the index including uncommitted ones.
    pub fn num_docs(&self) -> u64 {
        self.segment_docs() + self.buffered_docs() as u64
    }

    /// Documents added since the last commit.
    pub fn pending_docs(&self) -> u64 {
        self.pending.iter().map(|s| s.doc_count as u64).sum::<u64>() + self.buffered_docs() as u64
    }

    fn segment_docs(&self) -> u64 {
        self.committed
            .iter()
            .chain(&self.pending)
            .map(|s| s.doc_count as u64)
            .sum()
    }

    fn buffered_docs(&self) -> u32 {
        self.current.as_ref().map_or(0, |w| w.num_docs())
    }

    fn check_open(&self) -> Result<()> {
        if self.lock.is_none() {
            return Err(TesseraError::index("index writer is closed"));
        }
        Ok(())
    }

    /// Add a document and return its global doc id.
    ///
    /// The id is valid in every snapshot that includes this document.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        self.check_open()?;

        let base = self.segment_docs();
        if base + self.buffered_docs() as u64 >= TERMINATED as u64 {
            return Err(TesseraError::index("index is full"));
        }

        let spatial_levels = &self.config.spatial_levels;
        let next_segment = &mut self.next_segment;
        let writer = self.current.get_or_insert_with(|| {
            let name = segment_name(*next_segment);
            *next_segment += 1;
            SegmentWriter::new(name, spatial_levels.clone())
        });
        let local = writer.add_document(doc)?;

        if writer.num_docs() as usize >= self.config.max_buffered_docs {
            self.flush()?;
        }

        Ok(base as DocId + local)
    }

    /// Flush buffered documents into a pending segment.
    ///
    /// If writing the segment fails its documents are dropped, its partial
    /// files are removed and the error is returned.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;

        let Some(writer) = self.current.take() else {
            return Ok(());
        };
        if writer.is_empty() {
            return Ok(());
        }

        let name = writer.name().to_string();
        match writer.flush(&self.directory) {
            Ok(meta) => {
                self.pending.push(meta);
                Ok(())
            }
            Err(e) => {
                warn!("flushing segment {name} failed: {e}");
                self.delete_segment_files(&name);
                Err(e)
            }
        }
    }

    /// Durably publish all added documents as a new generation.
    ///
    /// Returns the generation now current. Without pending documents this is
    /// the existing generation, except on a directory that has never been
    /// committed, where an empty generation 1 is published. On failure the
    /// previous generation stays current and pending segments are kept, so
    /// the commit can be attempted again.
    pub fn commit(&mut self) -> Result<u64> {
        self.flush()?;

        if self.pending.is_empty() && self.generation > 0 {
            debug!("nothing to commit at generation {}", self.generation);
            return Ok(self.generation);
        }

        let mut segments = self.committed.clone();
        segments.extend(self.pending.iter().cloned());
        let descriptor = CommitDescriptor::new(self.generation + 1, segments, self.next_segment)?;

        self.directory.publish_commit(&descriptor)?;

        self.generation = descriptor.generation;
        self.committed = descriptor.segments;
        self.pending.clear();
        Ok(self.generation)
    }

    /// Discard everything added since the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;

        let discarded = self.pending_docs();
        self.current = None;
        for meta in std::mem::take(&mut self.pending) {
            self.delete_segment_files(&meta.name);
        }
        if discarded > 0 {
            info!("rolled back {discarded} uncommitted documents");
        }
        Ok(())
    }

    /// Delete every generation that is neither current nor held by a reader.
    ///
    /// Segment files that no remaining generation uses are removed too,
    /// except this writer's pending segments. Returns the deleted generations.
    pub fn delete_unused_generations(&self) -> Result<Vec<u64>> {
        self.check_open()?;

        let mut deleted = Vec::new();
        for generation in self.directory.list_generations()? {
            if generation != self.generation && !self.directory.is_referenced(generation) {
                self.directory.delete_generation(generation)?;
                deleted.push(generation);
            }
        }

        let keep: Vec<&str> = self
            .pending
            .iter()
            .map(|meta| meta.name.as_str())
            .chain(self.current.as_ref().map(|writer| writer.name()))
            .collect();
        self.directory.sweep_unpublished(&keep)?;
        Ok(deleted)
    }

    /// Discard uncommitted documents and release the write lock.
    pub fn close(&mut self) -> Result<()> {
        if self.lock.is_none() {
            return Ok(());
        }
        self.rollback()?;
        if let Some(mut lock) = self.lock.take() {
            lock.release()?;
        }
        Ok(())
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock.is_none()
    }

    fn delete_segment_files(&self, name: &str) {
        let storage = self.directory.storage();
        let meta = SegmentMeta {
            name: name.to_string(),
            doc_count: 0,
            fields: Default::default(),
        };
        for file in meta.files() {
            if storage.file_exists(&file) {
                if let Err(e) = storage.delete_file(&file) {
                    warn!("could not delete {file}: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::field::{Field, Store};
    use crate::index::reader::IndexReader;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::Storage;
    use std::sync::Arc;

    fn doc(id: &str) -> Document {
        Document::builder()
            .add(Field::string("id", id, Store::Yes))
            .build()
            .unwrap()
    }

    fn directory() -> (Arc<MemoryStorage>, Directory) {
        let storage = Arc::new(MemoryStorage::new_default());
        (storage.clone(), Directory::create_or_open(storage))
    }

    #[test]
    fn test_global_doc_ids_continue_across_segments() {
        let (_, directory) = directory();
        let config = WriterConfig {
            max_buffered_docs: 2,
            ..WriterConfig::default()
        };
        let mut writer = IndexWriter::open(directory, config).unwrap();

        let ids: Vec<DocId> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| writer.add_document(&doc(id)).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(writer.pending.len(), 2);

        assert_eq!(writer.commit().unwrap(), 1);
        assert_eq!(writer.committed.len(), 3);
        assert_eq!(writer.add_document(&doc("f")).unwrap(), 5);
    }

    #[test]
    fn test_second_writer_is_locked_out() {
        let (_, directory) = directory();
        let mut first = IndexWriter::open(directory.clone(), WriterConfig::default()).unwrap();
        assert!(IndexWriter::open(directory.clone(), WriterConfig::default()).is_err());

        first.close().unwrap();
        assert!(IndexWriter::open(directory, WriterConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_commit_behaviour() {
        let (_, directory) = directory();
        let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default()).unwrap();

        assert_eq!(writer.commit().unwrap(), 1);
        assert_eq!(writer.commit().unwrap(), 1);
        writer.add_document(&doc("a")).unwrap();
        assert_eq!(writer.commit().unwrap(), 2);
        assert_eq!(directory.current_generation().unwrap(), Some(2));
    }

    #[test]
    fn test_rollback_discards_pending_segments() {
        let (storage, directory) = directory();
        let config = WriterConfig {
            max_buffered_docs: 1,
            ..WriterConfig::default()
        };
        let mut writer = IndexWriter::open(directory, config).unwrap();
        writer.add_document(&doc("a")).unwrap();
        writer.add_document(&doc("b")).unwrap();
        assert!(storage.file_count() >= 8);

        writer.rollback().unwrap();
        assert_eq!(writer.pending_docs(), 0);
        assert!(!storage.list_files().unwrap().iter().any(|f| f.starts_with("seg_")));
    }

    #[test]
    fn test_reopen_continues_generation_and_counter() {
        let (_, directory) = directory();
        let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default()).unwrap();
        writer.add_document(&doc("a")).unwrap();
        writer.commit().unwrap();
        writer.close().unwrap();

        let mut writer = IndexWriter::open(directory, WriterConfig::default()).unwrap();
        assert_eq!(writer.generation(), 1);
        assert_eq!(writer.num_docs(), 1);
        writer.add_document(&doc("b")).unwrap();
        assert_eq!(writer.commit().unwrap(), 2);
        assert_eq!(writer.committed[1].name, "seg_00000001");
    }

    #[test]
    fn test_closed_writer_rejects_documents() {
        let (_, directory) = directory();
        let mut writer = IndexWriter::open(directory, WriterConfig::default()).unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(writer.add_document(&doc("a")).is_err());
    }

    #[test]
    fn test_cleanup_keeps_pending_and_drops_strays() {
        let (storage, directory) = directory();
        let config = WriterConfig {
            max_buffered_docs: 1,
            ..WriterConfig::default()
        };
        let mut writer = IndexWriter::open(directory.clone(), config).unwrap();
        writer.add_document(&doc("a")).unwrap();
        writer.commit().unwrap();
        writer.add_document(&doc("b")).unwrap();
        directory
            .write_file("seg_00000009.post", |w| w.write_u8(0))
            .unwrap();

        writer.delete_unused_generations().unwrap();
        let files = storage.list_files().unwrap();
        assert!(!files.iter().any(|f| f.starts_with("seg_00000009")));
        assert!(files.iter().any(|f| f.starts_with("seg_00000001")));

        assert_eq!(writer.commit().unwrap(), 2);
        assert_eq!(IndexReader::open(&directory).unwrap().num_docs(), 2);
    }
}
