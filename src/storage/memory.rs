use crate::model::NovelRecord;
use crate::storage::traits::{NovelRepository, StorageResult};
use std::collections::BTreeMap;

/// Process-local repository; nothing survives the run
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    novels: BTreeMap<String, NovelRecord>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing records, keyed by their URL
    pub fn with_records(records: impl IntoIterator<Item = NovelRecord>) -> Self {
        Self {
            novels: records.into_iter().map(|r| (r.url.clone(), r)).collect(),
        }
    }
}

impl NovelRepository for InMemoryRepository {
    fn get_by_url(&self, url: &str) -> StorageResult<Option<NovelRecord>> {
        Ok(self.novels.get(url).cloned())
    }

    fn save(&mut self, record: &NovelRecord) -> StorageResult<()> {
        self.novels.insert(record.url.clone(), record.clone());
        Ok(())
    }

    fn list_urls(&self) -> StorageResult<Vec<String>> {
        Ok(self.novels.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NovelSnapshot;

    #[test]
    fn test_save_replaces_record() {
        let mut repo = InMemoryRepository::new();
        let snapshot = NovelSnapshot {
            title: "First".to_string(),
            ..Default::default()
        };
        let mut record = NovelRecord::from_snapshot("https://example.com/n", &snapshot, &[]);
        repo.save(&record).unwrap();

        record.title = "Renamed".to_string();
        repo.save(&record).unwrap();

        let loaded = repo.get_by_url("https://example.com/n").unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(repo.list_urls().unwrap().len(), 1);
    }
}
