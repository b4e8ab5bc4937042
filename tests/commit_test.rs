//! Commit protocol: atomic publication, reopen, corruption and cleanup.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use tessera::prelude::*;
use tessera::storage::{LockManager, StorageInput, StorageOutput};

/// Memory storage that can refuse to publish the `CURRENT` pointer,
/// standing in for a crash after the segment files are durable.
#[derive(Debug)]
struct CrashingStorage {
    inner: Arc<MemoryStorage>,
    crash_before_publish: AtomicBool,
}

impl CrashingStorage {
    fn new(inner: Arc<MemoryStorage>) -> Self {
        CrashingStorage {
            inner,
            crash_before_publish: AtomicBool::new(false),
        }
    }

    fn arm(&self) {
        self.crash_before_publish.store(true, Ordering::SeqCst);
    }
}

impl Storage for CrashingStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.inner.open_input(name)
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.inner.create_output(name)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.inner.file_exists(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.inner.delete_file(name)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.inner.list_files()
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.inner.file_size(name)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        if new_name == "CURRENT" && self.crash_before_publish.load(Ordering::SeqCst) {
            return Err(TesseraError::storage("simulated crash before publish"));
        }
        self.inner.rename_file(old_name, new_name)
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }

    fn lock_manager(&self) -> Arc<dyn LockManager> {
        self.inner.lock_manager()
    }
}

type Hook = Box<dyn FnOnce() -> Result<()> + Send>;

/// Memory storage that runs a hook once, right after the `CURRENT` pointer
/// has been read, standing in for a writer committing at that moment.
struct InterleavingStorage {
    inner: Arc<MemoryStorage>,
    after_current_read: Mutex<Option<Hook>>,
}

impl std::fmt::Debug for InterleavingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterleavingStorage")
            .field("inner", &self.inner)
            .finish()
    }
}

impl Storage for InterleavingStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let input = self.inner.open_input(name)?;
        if name == "CURRENT" {
            let hook = self.after_current_read.lock().take();
            if let Some(hook) = hook {
                hook()?;
            }
        }
        Ok(input)
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.inner.create_output(name)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.inner.file_exists(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.inner.delete_file(name)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.inner.list_files()
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.inner.file_size(name)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.inner.rename_file(old_name, new_name)
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }

    fn lock_manager(&self) -> Arc<dyn LockManager> {
        self.inner.lock_manager()
    }
}

fn doc(id: &str, body: &str) -> Result<Document> {
    Document::builder()
        .add(Field::string("id", id, Store::Yes))
        .add(Field::text("body", body, Store::Yes))
        .build()
}

fn ids(reader: &IndexReader) -> Result<Vec<String>> {
    (0..reader.num_docs() as DocId)
        .map(|doc| {
            let stored = reader.stored_fields(doc)?;
            Ok(stored
                .get("id")
                .and_then(|v| v.as_text())
                .unwrap_or_default()
                .to_string())
        })
        .collect()
}

#[test]
fn test_crash_before_publish_keeps_previous_generation() -> Result<()> {
    let memory = Arc::new(MemoryStorage::new_default());
    let crashing = Arc::new(CrashingStorage::new(Arc::clone(&memory)));
    let directory = Directory::create_or_open(crashing.clone());

    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    writer.add_document(&doc("a", "first batch")?)?;
    writer.add_document(&doc("b", "first batch")?)?;
    assert_eq!(writer.commit()?, 1);

    writer.add_document(&doc("c", "second batch")?)?;
    crashing.arm();
    assert!(writer.commit().is_err());
    drop(writer);

    // Reopen over the bytes the "crashed" process left behind.
    let recovered = Directory::create_or_open(memory.clone());
    let reader = IndexReader::open(&recovered)?;
    assert_eq!(reader.generation(), 1);
    assert_eq!(ids(&reader)?, vec!["a", "b"]);
    assert_eq!(reader.doc_freq("body", "second"), 0);

    // The descriptor of the failed commit is on disk but not published.
    assert!(memory.file_exists("commit_2"));
    assert_eq!(recovered.list_generations()?, vec![1]);
    let err = IndexReader::open_generation(&recovered, 2).unwrap_err();
    assert!(matches!(err, TesseraError::Index(_)));

    // A new writer sweeps the leftovers and continues from generation 1.
    let mut writer = IndexWriter::open(recovered.clone(), WriterConfig::default())?;
    writer.add_document(&doc("c", "second batch")?)?;
    assert_eq!(writer.commit()?, 2);

    let reader = IndexReader::open(&recovered)?;
    assert_eq!(ids(&reader)?, vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn test_segments_of_failed_commit_are_swept() -> Result<()> {
    let memory = Arc::new(MemoryStorage::new_default());
    let crashing = Arc::new(CrashingStorage::new(Arc::clone(&memory)));
    let config = WriterConfig {
        max_buffered_docs: 1,
        ..WriterConfig::default()
    };

    let mut writer = IndexWriter::open(Directory::create_or_open(crashing.clone()), config.clone())?;
    writer.add_document(&doc("a", "kept")?)?;
    writer.commit()?;
    writer.add_document(&doc("b", "lost")?)?;
    writer.add_document(&doc("c", "lost")?)?;
    crashing.arm();
    assert!(writer.commit().is_err());
    drop(writer);

    let segment_files = |prefix: &str| -> Result<usize> {
        Ok(memory
            .list_files()?
            .iter()
            .filter(|name| name.starts_with(prefix))
            .count())
    };
    assert!(segment_files("seg_00000002")? > 0);

    // The retry flushes one segment where the crashed attempt flushed two.
    let recovered = Directory::create_or_open(memory.clone());
    let mut writer = IndexWriter::open(recovered.clone(), config)?;
    assert_eq!(segment_files("seg_00000001")?, 0);
    assert_eq!(segment_files("seg_00000002")?, 0);
    assert!(!memory.file_exists("commit_2"));

    writer.add_document(&doc("b", "retried")?)?;
    assert_eq!(writer.commit()?, 2);
    assert_eq!(segment_files("seg_00000002")?, 0);
    assert!(!memory.list_files()?.iter().any(|name| name.ends_with(".tmp")));
    assert_eq!(ids(&IndexReader::open(&recovered)?)?, vec!["a", "b"]);
    Ok(())
}

#[test]
fn test_failed_commit_can_be_retried() -> Result<()> {
    let memory = Arc::new(MemoryStorage::new_default());
    let crashing = Arc::new(CrashingStorage::new(Arc::clone(&memory)));
    let directory = Directory::create_or_open(crashing.clone());

    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    writer.add_document(&doc("a", "only")?)?;
    crashing.arm();
    assert!(writer.commit().is_err());
    assert_eq!(IndexReader::open(&directory)?.generation(), 0);

    crashing.crash_before_publish.store(false, Ordering::SeqCst);
    assert_eq!(writer.commit()?, 1);
    assert_eq!(ids(&IndexReader::open(&directory)?)?, vec!["a"]);
    Ok(())
}

#[test]
fn test_reopen_is_idempotent() -> Result<()> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    for (id, body) in [("1", "red fox"), ("2", "red red car"), ("3", "blue fox")] {
        writer.add_document(&doc(id, body)?)?;
    }
    writer.commit()?;

    let query = BooleanQuery::builder()
        .should(TermQuery::new("body", "red"))
        .should(TermQuery::new("body", "fox"))
        .build();

    let run = || -> Result<TopDocs> {
        let reader = Arc::new(IndexReader::open(&directory)?);
        IndexSearcher::new(reader, SearchConfig::default()).search(
            &query,
            10,
            &SearchOptions::default(),
        )
    };
    let first = run()?;
    let second = run()?;
    assert_eq!(first, second);
    assert_eq!(first.total_hits, 3);

    // Pending documents stay invisible until committed.
    writer.add_document(&doc("4", "red")?)?;
    assert_eq!(run()?, first);
    Ok(())
}

#[test]
fn test_reader_keeps_its_snapshot() -> Result<()> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    writer.add_document(&doc("1", "old")?)?;
    writer.commit()?;

    let reader = IndexReader::open(&directory)?;
    writer.add_document(&doc("2", "new")?)?;
    writer.commit()?;

    assert_eq!(reader.generation(), 1);
    assert_eq!(reader.num_docs(), 1);

    let reloaded = reader.reload()?;
    assert_eq!(reloaded.generation(), 2);
    assert_eq!(reloaded.num_docs(), 2);
    assert!(Arc::ptr_eq(&reader.segments()[0], &reloaded.segments()[0]));
    Ok(())
}

#[test]
fn test_reader_open_survives_concurrent_commit_and_cleanup() -> Result<()> {
    let storage = Arc::new(InterleavingStorage {
        inner: Arc::new(MemoryStorage::new_default()),
        after_current_read: Mutex::new(None),
    });
    let directory = Directory::create_or_open(storage.clone());

    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    writer.add_document(&doc("a", "first")?)?;
    writer.commit()?;

    // The reader sees generation 1 in CURRENT; before it registers, the
    // writer publishes generation 2 and deletes generation 1.
    *storage.after_current_read.lock() = Some(Box::new(move || {
        writer.add_document(&doc("b", "second")?)?;
        writer.commit()?;
        assert_eq!(writer.delete_unused_generations()?, vec![1]);
        Ok(())
    }));

    let reader = IndexReader::open(&directory)?;
    assert_eq!(reader.generation(), 2);
    assert_eq!(ids(&reader)?, vec!["a", "b"]);
    assert!(!directory.is_referenced(1));
    assert_eq!(directory.list_generations()?, vec![2]);
    Ok(())
}

#[test]
fn test_damaged_segment_is_corruption() -> Result<()> {
    let memory = Arc::new(MemoryStorage::new_default());
    let directory = Directory::create_or_open(memory.clone());
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    writer.add_document(&doc("1", "intact")?)?;
    writer.commit()?;

    let postings = memory
        .list_files()?
        .into_iter()
        .find(|name| name.ends_with(".post"))
        .unwrap();
    let mut bytes = memory.read_all(&postings)?;
    bytes[0] ^= 0xff;
    memory.overwrite(&postings, bytes);

    let err = IndexReader::open(&directory).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {err}");
    Ok(())
}

#[test]
fn test_single_writer_per_directory() -> Result<()> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    assert!(IndexWriter::open(directory.clone(), WriterConfig::default()).is_err());

    writer.close()?;
    assert!(writer.is_closed());
    assert!(writer.add_document(&doc("1", "late")?).is_err());
    assert!(IndexWriter::open(directory, WriterConfig::default()).is_ok());
    Ok(())
}

#[test]
fn test_unused_generations_are_deleted() -> Result<()> {
    let memory = Arc::new(MemoryStorage::new_default());
    let directory = Directory::create_or_open(memory.clone());
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;

    writer.add_document(&doc("1", "one")?)?;
    writer.commit()?;
    let pinned = IndexReader::open(&directory)?;

    writer.add_document(&doc("2", "two")?)?;
    writer.commit()?;
    writer.add_document(&doc("3", "three")?)?;
    writer.commit()?;

    // Generation 1 is held by a reader, 3 is current.
    assert_eq!(writer.delete_unused_generations()?, vec![2]);
    assert_eq!(directory.list_generations()?, vec![1, 3]);

    drop(pinned);
    assert_eq!(writer.delete_unused_generations()?, vec![1]);

    // Segments shared with the current generation survive.
    let reader = IndexReader::open(&directory)?;
    assert_eq!(ids(&reader)?, vec!["1", "2", "3"]);
    Ok(())
}
