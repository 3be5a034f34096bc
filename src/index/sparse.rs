//! Tantivy BM25 index over job postings

use super::manifest::IndexManifest;
use crate::model::Corpus;
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::tokenizer::{Token, TokenStream};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use thiserror::Error;

/// Title tokens count three times, body tokens once
pub const TITLE_WEIGHT: usize = 3;

const WRITER_MEMORY: usize = 50_000_000;

#[derive(Error, Debug)]
pub enum SparseIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] tantivy::TantivyError),
}

/// Lexical index over `title x3 + body`, scored with tantivy's BM25
/// (k1 = 1.2, b = 0.75)
pub struct SparseIndex {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    text_field: Field,
    len: usize,
}

impl SparseIndex {
    /// Load the cached index in `index_path`, or rebuild it when the cache
    /// is missing or was built from a different corpus.
    ///
    /// Returns the index and whether it was rebuilt.
    pub fn build_or_load(
        index_path: &Path,
        corpus: &Corpus,
    ) -> Result<(Self, bool), SparseIndexError> {
        let ids = corpus.ids();

        match Self::load(index_path, &ids) {
            Ok(Some(index)) => {
                tracing::info!("Loaded sparse index ({} jobs) from {}", index.len, index_path.display());
                return Ok((index, false));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Sparse index cache unusable, rebuilding: {}", e),
        }

        let index = Self::build(index_path.to_path_buf(), corpus)?;
        Ok((index, true))
    }

    /// Open a cached index; `Ok(None)` on a cache miss
    fn load(index_path: &Path, ids: &[String]) -> Result<Option<Self>, SparseIndexError> {
        let Some(manifest) = IndexManifest::read(index_path) else {
            tracing::info!("No sparse index manifest in {}", index_path.display());
            return Ok(None);
        };

        if !manifest.matches_ids(ids) {
            tracing::warn!(
                "Sparse index id list differs from corpus ({} cached, {} in corpus)",
                manifest.ids.len(),
                ids.len()
            );
            return Ok(None);
        }

        let index = Index::open_in_dir(index_path)?;
        let schema = index.schema();
        let (id_field, text_field) = Self::fields(&schema)?;
        let reader = Self::reader(&index)?;

        let num_docs = reader.searcher().num_docs() as usize;
        if num_docs != ids.len() {
            tracing::warn!(
                "Sparse index holds {} documents, manifest lists {}",
                num_docs,
                ids.len()
            );
            return Ok(None);
        }

        Ok(Some(Self {
            index,
            reader,
            id_field,
            text_field,
            len: num_docs,
        }))
    }

    fn build(index_path: PathBuf, corpus: &Corpus) -> Result<Self, SparseIndexError> {
        if index_path.exists() {
            std::fs::remove_dir_all(&index_path)?;
        }
        std::fs::create_dir_all(&index_path)?;

        let mut schema_builder = Schema::builder();
        let id_field = schema_builder.add_text_field("job_id", STRING | STORED);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_dir(&index_path, schema)
            .map_err(|e| SparseIndexError::InitializationError(e.to_string()))?;

        // One indexing thread keeps document order identical across rebuilds
        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_MEMORY)
            .map_err(|e| SparseIndexError::InitializationError(e.to_string()))?;

        for job in corpus.jobs() {
            let weighted = weighted_text(&job.title, &job.text);
            writer
                .add_document(doc!(
                    id_field => job.id.as_str(),
                    text_field => weighted,
                ))
                .map_err(|e| SparseIndexError::InsertError(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| SparseIndexError::InsertError(e.to_string()))?;
        writer
            .wait_merging_threads()
            .map_err(|e| SparseIndexError::InsertError(e.to_string()))?;

        IndexManifest::new(corpus.ids()).write(&index_path)?;

        let reader = Self::reader(&index)?;
        tracing::info!("Built sparse index with {} jobs in {}", corpus.len(), index_path.display());

        Ok(Self {
            index,
            reader,
            id_field,
            text_field,
            len: corpus.len(),
        })
    }

    fn fields(schema: &Schema) -> Result<(Field, Field), SparseIndexError> {
        let id_field = schema.get_field("job_id").map_err(|_| {
            SparseIndexError::InitializationError("Missing 'job_id' field in schema".to_string())
        })?;
        let text_field = schema.get_field("text").map_err(|_| {
            SparseIndexError::InitializationError("Missing 'text' field in schema".to_string())
        })?;
        Ok((id_field, text_field))
    }

    fn reader(index: &Index) -> Result<IndexReader, SparseIndexError> {
        index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SparseIndexError::InitializationError(e.to_string()))
    }

    /// Tokenize a free-text condition with the same analyzer as the documents
    fn tokenize(&self, text: &str) -> Result<Vec<String>, SparseIndexError> {
        let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        stream.process(&mut |token: &Token| tokens.push(token.text.clone()));
        Ok(tokens)
    }

    /// Top `limit` job ids for a free-text condition, best first.
    ///
    /// Each query token is an optional clause, so the score is the BM25 sum
    /// over tokens (repeated tokens count repeatedly).
    pub fn search(&self, condition: &str, limit: usize) -> Result<Vec<String>, SparseIndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let tokens = self.tokenize(condition)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|token| {
                let term = Term::from_field_text(self.text_field, token);
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        // Only documents matching at least one token come back, so the list
        // can be shorter than `limit`; zero-score documents are never padded in
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| SparseIndexError::SearchError(e.to_string()))?;

        let mut ids = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| SparseIndexError::SearchError(e.to_string()))?;

            let id = retrieved
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    SparseIndexError::SearchError("Missing or invalid job_id field".to_string())
                })?;
            ids.push(id.to_string());
        }

        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Field text with the title repeated `TITLE_WEIGHT` times
fn weighted_text(title: &str, body: &str) -> String {
    let mut parts = vec![title; TITLE_WEIGHT];
    parts.push(body);
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobDocument, JobMetadata};
    use tempfile::TempDir;

    fn job(id: &str, title: &str, text: &str) -> JobDocument {
        JobDocument {
            id: id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            metadata: JobMetadata::default(),
        }
    }

    fn corpus() -> Corpus {
        Corpus::new(vec![
            job("J1", "Rust Engineer", "Build storage engines and network services."),
            job("J2", "Pastry Chef", "Bake croissants and manage the kitchen."),
            job("J3", "Data Analyst", "SQL dashboards; some Rust scripting a plus."),
        ])
    }

    #[test]
    fn test_weighted_text() {
        assert_eq!(weighted_text("Chef", "Cooks"), "Chef\nChef\nChef\nCooks");
    }

    #[test]
    fn test_build_and_search() {
        let temp = TempDir::new().unwrap();
        let (index, built) = SparseIndex::build_or_load(&temp.path().join("sparse"), &corpus()).unwrap();
        assert!(built);
        assert_eq!(index.len(), 3);

        // Title weighting puts the Rust Engineer ahead of the body mention
        let hits = index.search("rust", 10).unwrap();
        assert_eq!(hits, vec!["J1", "J3"]);

        let hits = index.search("croissants kitchen", 10).unwrap();
        assert_eq!(hits, vec!["J2"]);
    }

    #[test]
    fn test_query_syntax_is_not_interpreted() {
        let temp = TempDir::new().unwrap();
        let (index, _) = SparseIndex::build_or_load(&temp.path().join("sparse"), &corpus()).unwrap();

        let hits = index.search("SQL: (dashboards) AND \"", 10).unwrap();
        assert_eq!(hits.first().map(String::as_str), Some("J3"));
        assert!(index.search("", 10).unwrap().is_empty());
        assert!(index.search("rust", 0).unwrap().is_empty());
    }

    #[test]
    fn test_reload_from_cache() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sparse");
        let corpus = corpus();

        {
            let (_, built) = SparseIndex::build_or_load(&path, &corpus).unwrap();
            assert!(built);
        }

        let (index, built) = SparseIndex::build_or_load(&path, &corpus).unwrap();
        assert!(!built);
        assert_eq!(index.search("chef", 5).unwrap(), vec!["J2"]);
    }

    #[test]
    fn test_changed_corpus_triggers_rebuild() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sparse");
        SparseIndex::build_or_load(&path, &corpus()).unwrap();

        let smaller = Corpus::new(vec![job("J9", "Welder", "Metal work.")]);
        let (index, built) = SparseIndex::build_or_load(&path, &smaller).unwrap();
        assert!(built);
        assert_eq!(index.len(), 1);
        assert_eq!(index.search("welder", 5).unwrap(), vec!["J9"]);
    }

    /// Empty every segment file of the given kinds, as an interrupted write
    /// would leave them
    fn truncate_segment_files(path: &Path, extensions: &[&str]) -> usize {
        let mut truncated = 0;
        for entry in std::fs::read_dir(path).unwrap() {
            let file = entry.unwrap().path();
            let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if extensions.contains(&ext) {
                std::fs::OpenOptions::new()
                    .write(true)
                    .open(&file)
                    .unwrap()
                    .set_len(0)
                    .unwrap();
                truncated += 1;
            }
        }
        truncated
    }

    #[test]
    fn test_truncated_segment_files_trigger_rebuild() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sparse");
        let corpus = corpus();
        SparseIndex::build_or_load(&path, &corpus).unwrap();

        let truncated = truncate_segment_files(&path, &["idx", "store", "term"]);
        assert!(truncated > 0);
        // The manifest still matches the corpus
        assert!(IndexManifest::read(&path).is_some());

        let (index, built) = SparseIndex::build_or_load(&path, &corpus).unwrap();
        assert!(built);
        assert_eq!(index.len(), 3);
        assert_eq!(index.search("rust", 10).unwrap(), vec!["J1", "J3"]);

        let (_, built) = SparseIndex::build_or_load(&path, &corpus).unwrap();
        assert!(!built);
    }

    #[test]
    fn test_missing_meta_json_triggers_rebuild() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sparse");
        let corpus = corpus();
        SparseIndex::build_or_load(&path, &corpus).unwrap();

        std::fs::remove_file(path.join("meta.json")).unwrap();

        let (index, built) = SparseIndex::build_or_load(&path, &corpus).unwrap();
        assert!(built);
        assert_eq!(index.search("croissants", 5).unwrap(), vec!["J2"]);
    }
}
