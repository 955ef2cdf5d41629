use super::{DatasetRef, Record, PART};
use crate::errors::StoreError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Cursor, Write},
    path::{Path, PathBuf},
};

/// The output of one job: for every stream, one part per reduce partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    streams: BTreeMap<String, Vec<Vec<Record>>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-part dataset on the default stream.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut dataset = Self::new();
        dataset.push_part(PART, records);
        dataset
    }

    pub fn push_part(&mut self, stream: &str, records: Vec<Record>) {
        self.streams
            .entry(stream.to_string())
            .or_default()
            .push(records);
    }

    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn parts(&self, stream: &str) -> &[Vec<Record>] {
        self.streams.get(stream).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records of one stream, or of every stream, in part order.
    pub fn records(&self, stream: Option<&str>) -> Vec<Record> {
        match stream {
            Some(stream) => self.parts(stream).concat(),
            None => self.streams.values().flatten().flatten().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.values().flatten().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where jobs read their input and write their output. Paths are opaque
/// names; a dataset is written once and never modified afterwards.
pub trait DatasetStore: Send + Sync {
    /// Fails if `path` already holds a dataset.
    fn write(&self, path: &str, dataset: Dataset) -> Result<(), StoreError>;

    /// A stream missing from an existing dataset reads as empty.
    fn read(&self, dataset: &DatasetRef) -> Result<Vec<Record>, StoreError>;

    fn exists(&self, path: &str) -> bool;

    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Fails if `from` is missing or `to` already exists.
    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError>;
}

/// In-memory store, shared between the runner and whoever inspects the
/// results.
#[derive(Debug, Default)]
pub struct MemStore {
    datasets: RwLock<FxHashMap<String, Dataset>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an input dataset on the default stream.
    pub fn put(&self, path: &str, records: Vec<Record>) -> Result<(), StoreError> {
        self.write(path, Dataset::from_records(records))
    }

    pub fn get(&self, path: &str) -> Option<Dataset> {
        self.datasets.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.datasets.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl DatasetStore for MemStore {
    fn write(&self, path: &str, dataset: Dataset) -> Result<(), StoreError> {
        let mut datasets = self.datasets.write();
        if datasets.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        datasets.insert(path.to_string(), dataset);
        Ok(())
    }

    fn read(&self, dataset: &DatasetRef) -> Result<Vec<Record>, StoreError> {
        self.datasets
            .read()
            .get(&dataset.path)
            .map(|d| d.records(dataset.stream.as_deref()))
            .ok_or_else(|| StoreError::NotFound(dataset.path.clone()))
    }

    fn exists(&self, path: &str) -> bool {
        self.datasets.read().contains_key(path)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.datasets
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut datasets = self.datasets.write();
        if datasets.contains_key(to) {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        let dataset = datasets
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        datasets.insert(to.to_string(), dataset);
        Ok(())
    }
}

/// A directory per dataset holding one file per part, named
/// `{stream}-r-{partition:05}`. Each file is a sequence of
/// `[i32 key][u32 len][len bytes]` entries, big-endian.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn part_name(stream: &str, partition: usize) -> String {
        format!("{stream}-r-{partition:05}")
    }

    fn write_part(file: &Path, records: &[Record]) -> Result<(), StoreError> {
        let mut out = BufWriter::new(fs::File::create(file)?);
        for record in records {
            out.write_i32::<BigEndian>(record.key)?;
            out.write_u32::<BigEndian>(record.value.len() as u32)?;
            out.write_all(&record.value)?;
        }
        out.flush()?;
        Ok(())
    }

    fn read_part(file: &Path) -> Result<Vec<Record>, StoreError> {
        let bytes = fs::read(file)?;
        let corrupt = |reason: String| StoreError::CorruptPart {
            path: file.to_path_buf(),
            reason,
        };
        let mut cursor = Cursor::new(bytes.as_slice());
        let mut records = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let header = cursor
                .read_i32::<BigEndian>()
                .and_then(|key| Ok((key, cursor.read_u32::<BigEndian>()?)));
            let (key, len) =
                header.map_err(|_| corrupt("truncated record header".to_string()))?;
            let start = cursor.position() as usize;
            let end = start + len as usize;
            let value = bytes.get(start..end).ok_or_else(|| {
                corrupt(format!(
                    "record for key {key} needs {len} bytes, {} remain",
                    bytes.len() - start
                ))
            })?;
            records.push(Record::new(key, value.to_vec()));
            cursor.set_position(end as u64);
        }
        Ok(records)
    }
}

impl DatasetStore for DiskStore {
    fn write(&self, path: &str, dataset: Dataset) -> Result<(), StoreError> {
        let dir = self.dir(path);
        if dir.exists() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        fs::create_dir_all(&dir)?;
        for (stream, parts) in dataset.streams.iter() {
            for (partition, records) in parts.iter().enumerate() {
                Self::write_part(&dir.join(Self::part_name(stream, partition)), records)?;
            }
        }
        Ok(())
    }

    fn read(&self, dataset: &DatasetRef) -> Result<Vec<Record>, StoreError> {
        let dir = self.dir(&dataset.path);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(dataset.path.clone()));
        }
        let prefix = dataset.stream.as_ref().map(|s| format!("{s}-r-"));
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let wanted = match &prefix {
                Some(prefix) => name.starts_with(prefix.as_str()),
                None => name.contains("-r-"),
            };
            if wanted {
                files.push((name, entry.path()));
            }
        }
        files.sort();

        let mut records = Vec::new();
        for (_, file) in files {
            records.extend(Self::read_part(&file)?);
        }
        Ok(records)
    }

    fn exists(&self, path: &str) -> bool {
        self.dir(path).exists()
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let dir = self.dir(path);
        if !dir.exists() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let (src, dst) = (self.dir(from), self.dir(to));
        if !src.exists() {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if dst.exists() {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(src, dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::substrate::{BRANCH, CHAIN};
    use pretty_assertions::assert_eq;

    fn sample() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.push_part(CHAIN, vec![Record::new(1, vec![1, 2]), Record::new(3, vec![])]);
        dataset.push_part(CHAIN, vec![Record::new(2, vec![9])]);
        dataset.push_part(BRANCH, vec![Record::new(-7, vec![0; 300])]);
        dataset
    }

    fn exercise(store: &impl DatasetStore) {
        store.write("out", sample()).unwrap();
        assert!(matches!(
            store.write("out", Dataset::new()),
            Err(StoreError::AlreadyExists(_))
        ));

        assert_eq!(
            store.read(&DatasetRef::stream("out", CHAIN)).unwrap(),
            vec![
                Record::new(1, vec![1, 2]),
                Record::new(3, vec![]),
                Record::new(2, vec![9])
            ]
        );
        assert_eq!(store.read(&DatasetRef::stream("out", BRANCH)).unwrap().len(), 1);
        assert!(store.read(&DatasetRef::stream("out", PART)).unwrap().is_empty());
        assert_eq!(store.read(&DatasetRef::all("out")).unwrap().len(), 4);

        store.rename("out", "nested/final").unwrap();
        assert!(!store.exists("out"));
        assert!(store.exists("nested/final"));
        assert!(matches!(
            store.read(&DatasetRef::all("out")),
            Err(StoreError::NotFound(_))
        ));

        store.write("other", Dataset::new()).unwrap();
        assert!(matches!(
            store.rename("other", "nested/final"),
            Err(StoreError::AlreadyExists(_))
        ));
        store.delete("other").unwrap();
        assert!(matches!(store.delete("other"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn mem_store() {
        exercise(&MemStore::new());
    }

    #[test]
    fn disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        exercise(&store);
        assert!(dir.path().join("nested/final/chain-r-00001").is_file());
    }

    #[test]
    fn corrupt_parts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        store
            .write("in", Dataset::from_records(vec![Record::new(5, vec![1, 2, 3])]))
            .unwrap();
        let part = dir.path().join("in/part-r-00000");
        let mut bytes = fs::read(&part).unwrap();
        bytes.pop();
        fs::write(&part, bytes).unwrap();
        assert!(matches!(
            store.read(&DatasetRef::all("in")),
            Err(StoreError::CorruptPart { .. })
        ));
    }
}
