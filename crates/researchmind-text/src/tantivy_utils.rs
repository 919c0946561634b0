use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

pub const LEXICAL_TOKENIZER: &str = "lexical";
pub const POSITION_FIELD: &str = "position";
pub const TEXT_FIELD: &str = "text";

/// Chunk position (stored) plus the analysed text; term frequencies are
/// all BM25 needs, so positions are not indexed.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _position_field = schema_builder.add_u64_field(POSITION_FIELD, INDEXED | STORED | FAST);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(LEXICAL_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

/// Lower-cased whitespace splitting, no stemming or stop words.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(LEXICAL_TOKENIZER, tokenizer);
}
