use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use researchmind_core::{Chunk, Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, POSITION_FIELD, TEXT_FIELD};

const WRITER_MEMORY: usize = 20_000_000;

fn index_err(e: impl std::fmt::Display) -> Error { Error::Index(e.to_string()) }

/// BM25 scorer over one immutable chunk list.
///
/// Built in RAM from the complete chunk list; any change to the list means
/// building a new one.
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	position_field: Field,
	text_field: Field,
	len: usize,
}

impl LexicalIndex {
	pub fn build(chunks: &[Chunk]) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let position_field = schema.get_field(POSITION_FIELD).map_err(index_err)?;
		let text_field = schema.get_field(TEXT_FIELD).map_err(index_err)?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY).map_err(index_err)?;
		for (position, chunk) in chunks.iter().enumerate() {
			writer
				.add_document(doc!(position_field => position as u64, text_field => chunk.text.as_str()))
				.map_err(index_err)?;
		}
		writer.commit().map_err(index_err)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		debug!(chunks = chunks.len(), "lexical index built");
		Ok(Self { index, reader, position_field, text_field, len: chunks.len() })
	}

	pub fn len(&self) -> usize { self.len }
	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Query terms after the same analysis the chunks went through.
	pub fn analyze(&self, query: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.text_field).map_err(index_err)?;
		let mut stream = analyzer.token_stream(query);
		let mut tokens = Vec::new();
		while stream.advance() { tokens.push(stream.token().text.clone()); }
		Ok(tokens)
	}

	/// BM25 score for every chunk position; chunks sharing no term with the
	/// query score 0.
	pub fn score(&self, query: &str) -> Result<Vec<f32>> {
		let mut scores = vec![0f32; self.len];
		if self.len == 0 { return Ok(scores); }
		let tokens = self.analyze(query)?;
		if tokens.is_empty() { return Ok(scores); }

		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.text_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.len)).map_err(index_err)?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(index_err)?;
			let position = doc
				.get_first(self.position_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| Error::Index("document without position".into()))? as usize;
			if let Some(slot) = scores.get_mut(position) { *slot = score; }
		}
		Ok(scores)
	}

	/// The `k` best positions by score, ties by position. Zero-score
	/// positions fill the list when fewer than `k` chunks match.
	pub fn top_k(&self, query: &str, k: usize) -> Result<Vec<(usize, f32)>> {
		Ok(rank(&self.score(query)?, k))
	}
}

/// Positions of `scores` ordered by score descending, stable on ties.
pub fn rank(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
	let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
	ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
	ranked.truncate(k);
	ranked
}
