//! Tantivy-based title search over the topic pool.
//!
//! Matching is case-insensitive and word-prefix based: every word of the query must start
//! some word of the title, so "mach learn" finds "Machine Learning for Crop Yield".

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::DocSetCollector;
use tantivy::query::{BooleanQuery, Occur, Query, RegexQuery};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Topic;

/// Search index schema fields.
struct TopicFields {
    topic_id: Field,
    title: Field,
}

/// Tantivy search index for topic titles.
pub struct TopicIndex {
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: TopicFields,
}

impl TopicIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        let topic_id = schema_builder.add_text_field("topic_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT);
        let schema = schema_builder.build();

        let fields = TopicFields { topic_id, title };

        // Try to open existing index or create new one
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from the topic pool.
    pub async fn rebuild(&self, topics: &[Topic]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for topic in topics {
            writer.add_document(self.document(topic))?;
        }
        writer.commit()?;

        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} topics", topics.len());
        Ok(())
    }

    /// Index a single topic, replacing any previous document for it.
    pub async fn index_topic(&self, topic: &Topic) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.topic_id, &topic.id));
        writer.add_document(self.document(topic))?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Ids of all topics whose title matches every word of `query_str`.
    ///
    /// A query without any searchable word yields no ids; callers treat that as "no
    /// filter".
    pub fn search(&self, query_str: &str) -> Result<HashSet<String>, AppError> {
        let words = query_words(query_str);
        if words.is_empty() {
            return Ok(HashSet::new());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(words.len());
        for word in words {
            let prefix = RegexQuery::from_pattern(&format!("{}.*", word), self.fields.title)
                .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;
            clauses.push((Occur::Must, Box::new(prefix)));
        }
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let matches = searcher
            .search(&query, &DocSetCollector)
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let ids = matches
            .into_iter()
            .filter_map(|address| {
                let doc: TantivyDocument = searcher.doc(address).ok()?;
                let id = doc.get_first(self.fields.topic_id)?.as_str()?.to_string();
                Some(id)
            })
            .collect();

        Ok(ids)
    }

    fn document(&self, topic: &Topic) -> TantivyDocument {
        doc!(
            self.fields.topic_id => topic.id.clone(),
            self.fields.title => topic.title.clone()
        )
    }
}

/// Split a query the way the default tokenizer splits titles, lower-cased.
fn query_words(query_str: &str) -> Vec<String> {
    query_str
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
