//! Turns the record set (and optional note files) into a searchable index.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use sekretarz_core::domain::record::{Record, RecordSetFingerprint};

use crate::embedding::{cosine_similarity, Embedder, EmbeddingError};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("could not read notes from `{path}`: {source}")]
    Notes { path: PathBuf, source: std::io::Error },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentSource {
    /// Position of the record in the store.
    Record(usize),
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextDocument {
    pub source: DocumentSource,
    pub text: String,
}

/// One document per record, in store order. Nothing is filtered out.
pub fn documents_from(records: &[Record]) -> Vec<ContextDocument> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| ContextDocument {
            source: DocumentSource::Record(position),
            text: record.to_document_text(),
        })
        .collect()
}

/// Reads every `.txt` and `.md` file directly under `dir`, sorted by path.
pub async fn load_note_documents(dir: &Path) -> Result<Vec<ContextDocument>, ContextError> {
    let notes_error = |source| ContextError::Notes { path: dir.to_path_buf(), source };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(notes_error)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(notes_error)? {
        let path = entry.path();
        let is_note = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| matches!(extension.to_ascii_lowercase().as_str(), "txt" | "md"))
            .unwrap_or(false);
        if is_note && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ContextError::Notes { path: path.clone(), source })?;
        documents.push(ContextDocument { source: DocumentSource::File(path), text });
    }

    info!(event_name = "context.notes.loaded", notes = documents.len(), dir = %dir.display(), "notes ingested");
    Ok(documents)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub position: usize,
    pub score: f32,
    pub document: ContextDocument,
}

/// Brute-force cosine index over embedded documents.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    documents: Vec<ContextDocument>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn build(
        documents: Vec<ContextDocument>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, ContextError> {
        let embeddings = documents
            .iter()
            .map(|document| embedder.embed(&document.text))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { embedder, documents, embeddings })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[ContextDocument] {
        &self.documents
    }

    /// Top `top_k` documents scoring at least `threshold`, best first; ties keep document order.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>, ContextError> {
        let query_embedding = self.embedder.embed(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(position, embedding)| (position, cosine_similarity(&query_embedding, embedding)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|(left_pos, left_score), (right_pos, right_score)| {
            right_score.partial_cmp(left_score).unwrap_or(Ordering::Equal).then(left_pos.cmp(right_pos))
        });
        scored.truncate(top_k);

        debug!(event_name = "context.search", hits = scored.len(), top_k, threshold, "index searched");

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredDocument {
                position,
                score,
                document: self.documents[position].clone(),
            })
            .collect())
    }
}

/// Owns the current index and rebuilds it whenever the record set fingerprint moves.
pub struct ContextBuilder {
    embedder: Arc<dyn Embedder>,
    notes: Vec<ContextDocument>,
    built: Option<(RecordSetFingerprint, Arc<VectorIndex>)>,
    rebuilds: u64,
}

impl ContextBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, notes: Vec<ContextDocument>) -> Self {
        Self { embedder, notes, built: None, rebuilds: 0 }
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Index for the given record set, or `None` when there is nothing to index.
    pub fn index_for(
        &mut self,
        fingerprint: RecordSetFingerprint,
        records: &[Record],
    ) -> Result<Option<Arc<VectorIndex>>, ContextError> {
        if records.is_empty() && self.notes.is_empty() {
            self.built = None;
            return Ok(None);
        }

        if let Some((built_from, index)) = &self.built {
            if *built_from == fingerprint {
                return Ok(Some(Arc::clone(index)));
            }
        }

        let mut documents = documents_from(records);
        documents.extend(self.notes.iter().cloned());
        let index = Arc::new(VectorIndex::build(documents, Arc::clone(&self.embedder))?);

        self.rebuilds += 1;
        info!(
            event_name = "context.index.rebuilt",
            version = fingerprint.version,
            records = records.len(),
            notes = self.notes.len(),
            documents = index.len(),
            "context index rebuilt"
        );

        self.built = Some((fingerprint, Arc::clone(&index)));
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use sekretarz_core::domain::record::{ProjectStatus, Record, RecordSetFingerprint};

    use super::{documents_from, load_note_documents, ContextBuilder, DocumentSource, VectorIndex};
    use crate::embedding::{Embedder, HashingEmbedder};

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashingEmbedder::new(1024).expect("embedder"))
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new("Acme", "PL", "Widget", ProjectStatus::InProgress, "Dostawa opóźniona"),
            Record::new("Borealis", "NO", "Gadget", ProjectStatus::Planned, ""),
        ]
    }

    #[test]
    fn every_record_becomes_a_document_even_with_empty_feedback() {
        let documents = documents_from(&records());

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].source, DocumentSource::Record(1));
        assert!(documents[1].text.contains(r#""Feedback":"""#));
    }

    #[test]
    fn search_ranks_the_matching_record_first() {
        let index = VectorIndex::build(documents_from(&records()), embedder()).expect("index");

        let hits = index.search("Jaki jest status projektu Acme?", 2, 0.1).expect("search");

        assert!(!hits.is_empty());
        assert_eq!(hits[0].position, 0);
        assert!(hits[0].document.text.contains("W Trakcie"));
    }

    #[test]
    fn search_is_stable_for_an_unchanged_index() {
        let index = VectorIndex::build(documents_from(&records()), embedder()).expect("index");

        let first = index.search("Widget Gadget", 2, 0.0).expect("search");
        let second = index.search("Widget Gadget", 2, 0.0).expect("search");

        assert_eq!(first, second);
    }

    #[test]
    fn threshold_filters_weak_matches() {
        let index = VectorIndex::build(documents_from(&records()), embedder()).expect("index");

        assert!(index.search("xqzv", 2, 0.5).expect("search").is_empty());
    }

    #[test]
    fn builder_reuses_index_until_fingerprint_changes() {
        let mut builder = ContextBuilder::new(embedder(), Vec::new());
        let mut current = records();
        let fingerprint = RecordSetFingerprint::compute(0, &current);

        let first = builder.index_for(fingerprint, &current).expect("build").expect("index");
        let again = builder.index_for(fingerprint, &current).expect("build").expect("index");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(builder.rebuild_count(), 1);

        current.push(Record::new("Ceres", "CZ", "Sensor", ProjectStatus::Question, "Cena?"));
        let moved = RecordSetFingerprint::compute(1, &current);
        let rebuilt = builder.index_for(moved, &current).expect("build").expect("index");

        assert_eq!(rebuilt.len(), 3);
        assert_eq!(builder.rebuild_count(), 2);
    }

    #[test]
    fn empty_knowledge_base_has_no_index() {
        let mut builder = ContextBuilder::new(embedder(), Vec::new());

        let index = builder.index_for(RecordSetFingerprint::compute(0, &[]), &[]).expect("build");

        assert!(index.is_none());
        assert_eq!(builder.rebuild_count(), 0);
    }

    #[tokio::test]
    async fn notes_are_loaded_from_text_and_markdown_files() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("b.md"), "# Notatka\nKlienci pytają o API.").expect("write");
        std::fs::write(dir.path().join("a.txt"), "Widget ma nową wersję.").expect("write");
        std::fs::write(dir.path().join("skip.csv"), "x,y").expect("write");

        let notes = load_note_documents(dir.path()).await.expect("notes");

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].source, DocumentSource::File(dir.path().join("a.txt")));

        let mut builder = ContextBuilder::new(embedder(), notes);
        let index = builder.index_for(RecordSetFingerprint::compute(0, &[]), &[]).expect("build");
        assert_eq!(index.map(|index| index.len()), Some(2));
    }
}
