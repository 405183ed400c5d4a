//! Tokeniser pipeline feeding the indexer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// One indexable unit cut out of a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token text after any normalisation.
    pub text: String,
    /// Ordinal of this token in the stream, counted from 0.
    pub position: u32,
    /// Byte offset where the source word begins.
    pub start: usize,
    /// Byte offset just past the source word.
    pub end: usize,
}

impl Token {
    pub fn new(text: String, position: u32, start: usize, end: usize) -> Self {
        Self {
            text,
            position,
            start,
            end,
        }
    }
}

/// Turns text into a token stream.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// A shareable, type-erased tokenizer.
pub type BoxedTokenizer = Arc<dyn Tokenizer>;

/// Walk the whitespace-delimited words of `text`, handing each one to
/// `emit` together with its byte range.
fn scan_words(text: &str, mut emit: impl FnMut(&str, usize, usize)) {
    let mut word_start = None;
    for (at, ch) in text.char_indices() {
        match (ch.is_whitespace(), word_start) {
            (true, Some(start)) => {
                emit(&text[start..at], start, at);
                word_start = None;
            }
            (false, None) => word_start = Some(at),
            _ => {}
        }
    }
    if let Some(start) = word_start {
        emit(&text[start..], start, text.len());
    }
}

/// Lowercase and keep only alphanumeric characters.
fn normalise(word: &str) -> String {
    word.chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Scan, normalise, then apply `transform` to produce each token's text.
/// Words that normalise to nothing yield no token and claim no position.
fn normalised_tokens(text: &str, transform: impl Fn(&str) -> String) -> Vec<Token> {
    let mut tokens = Vec::new();
    scan_words(text, |word, start, end| {
        let cleaned = normalise(word);
        if !cleaned.is_empty() {
            let position = tokens.len() as u32;
            tokens.push(Token::new(transform(&cleaned), position, start, end));
        }
    });
    tokens
}

/// Splits on whitespace and keeps words as written.
#[derive(Debug, Clone, Default)]
pub struct SimpleTokenizer;

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        scan_words(text, |word, start, end| {
            let position = tokens.len() as u32;
            tokens.push(Token::new(word.to_string(), position, start, end));
        });
        tokens
    }
}

/// Splits on whitespace, strips punctuation and lowercases.
#[derive(Debug, Clone, Default)]
pub struct LowercaseTokenizer;

impl Tokenizer for LowercaseTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        normalised_tokens(text, |word| word.to_string())
    }
}

/// Supported stemmer languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[allow(missing_docs)]
pub enum Language {
    Danish,
    Dutch,
    #[default]
    English,
    Finnish,
    French,
    German,
    Italian,
    Norwegian,
    Portuguese,
    Russian,
    Spanish,
    Swedish,
}

impl Language {
    fn to_algorithm(self) -> Algorithm {
        match self {
            Language::Danish => Algorithm::Danish,
            Language::Dutch => Algorithm::Dutch,
            Language::English => Algorithm::English,
            Language::Finnish => Algorithm::Finnish,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Italian => Algorithm::Italian,
            Language::Norwegian => Algorithm::Norwegian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Russian => Algorithm::Russian,
            Language::Spanish => Algorithm::Spanish,
            Language::Swedish => Algorithm::Swedish,
        }
    }
}

/// Parse a language name ("english", "en", ...) into a [`Language`].
pub fn parse_language(name: &str) -> Option<Language> {
    let lang = match name.to_ascii_lowercase().as_str() {
        "da" | "danish" => Language::Danish,
        "nl" | "dutch" => Language::Dutch,
        "en" | "english" => Language::English,
        "fi" | "finnish" => Language::Finnish,
        "fr" | "french" => Language::French,
        "de" | "german" => Language::German,
        "it" | "italian" => Language::Italian,
        "no" | "norwegian" => Language::Norwegian,
        "pt" | "portuguese" => Language::Portuguese,
        "ru" | "russian" => Language::Russian,
        "es" | "spanish" => Language::Spanish,
        "sv" | "swedish" => Language::Swedish,
        _ => return None,
    };
    Some(lang)
}

/// Tokenizer that lowercases, cleans and stems words
pub struct StemmerTokenizer {
    stemmer: rust_stemmers::Stemmer,
    language: Language,
}

impl StemmerTokenizer {
    pub fn new(language: Language) -> Self {
        Self {
            stemmer: rust_stemmers::Stemmer::create(language.to_algorithm()),
            language,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

impl Clone for StemmerTokenizer {
    fn clone(&self) -> Self {
        Self::new(self.language)
    }
}

impl std::fmt::Debug for StemmerTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StemmerTokenizer")
            .field("language", &self.language)
            .finish()
    }
}

impl Tokenizer for StemmerTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        normalised_tokens(text, |word| self.stemmer.stem(word).to_string())
    }
}

/// Registry of named tokenizers. Registering a duplicate name replaces the
/// prior entry.
pub struct TokenizerRegistry {
    tokenizers: Arc<RwLock<HashMap<String, BoxedTokenizer>>>,
}

impl TokenizerRegistry {
    /// Create a new tokenizer registry with default tokenizers registered
    pub fn new() -> Self {
        let registry = Self {
            tokenizers: Arc::new(RwLock::new(HashMap::new())),
        };
        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        self.register("default", LowercaseTokenizer);
        self.register("simple", SimpleTokenizer);
        self.register("lowercase", LowercaseTokenizer);
        self.register("en_stem", StemmerTokenizer::new(Language::English));
        self.register("english", StemmerTokenizer::new(Language::English));
        self.register("fr_stem", StemmerTokenizer::new(Language::French));
        self.register("french", StemmerTokenizer::new(Language::French));
        self.register("de_stem", StemmerTokenizer::new(Language::German));
        self.register("german", StemmerTokenizer::new(Language::German));
        self.register("es_stem", StemmerTokenizer::new(Language::Spanish));
        self.register("spanish", StemmerTokenizer::new(Language::Spanish));
    }

    /// Register a tokenizer under a name, replacing any existing entry.
    pub fn register<T: Tokenizer + 'static>(&self, name: impl Into<String>, tokenizer: T) {
        self.tokenizers
            .write()
            .insert(name.into(), Arc::new(tokenizer));
    }

    /// Look up a tokenizer by name.
    pub fn get(&self, name: &str) -> Option<BoxedTokenizer> {
        self.tokenizers.read().get(name).cloned()
    }
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenize `text` and feed the tokens into `doc` as terms with positions.
///
/// Positions are 1-based and continue from the document's current length, so
/// repeated calls append as further prose.
pub fn index_text(doc: &mut Document, text: &str, tokenizer: &dyn Tokenizer) {
    let base = doc.length();
    for token in tokenizer.tokenize(text) {
        doc.add_posting(token.text.into_bytes(), base + token.position + 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tokenizer_words_and_spans() {
        let tokens = SimpleTokenizer.tokenize("  hello \t world ");

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[0].position, 0);
        assert_eq!((tokens[0].start, tokens[0].end), (2, 7));
        assert_eq!(tokens[1].text, "world");
        assert_eq!(tokens[1].position, 1);
        assert_eq!((tokens[1].start, tokens[1].end), (10, 15));
    }

    #[test]
    fn test_lowercase_tokenizer_strips_punctuation() {
        let tokens = LowercaseTokenizer.tokenize("Hello, World!");

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].text, "world");
        // Spans cover the source words, punctuation included.
        assert_eq!((tokens[0].start, tokens[0].end), (0, 6));
        assert_eq!((tokens[1].start, tokens[1].end), (7, 13));
    }

    #[test]
    fn test_punctuation_only_words_claim_no_position() {
        let tokens = LowercaseTokenizer.tokenize("one -- two");

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "one");
        assert_eq!(tokens[1].text, "two");
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_stemmer_tokenizer() {
        let tokenizer = StemmerTokenizer::new(Language::English);
        let tokens = tokenizer.tokenize("running quickly");

        assert_eq!(tokens[0].text, "run");
        assert_eq!(tokens[1].text, "quick");
    }

    #[test]
    fn test_registry_lookup_and_replace() {
        let registry = TokenizerRegistry::new();
        assert!(registry.get("default").is_some());
        assert!(registry.get("missing").is_none());

        registry.register("default", SimpleTokenizer);
        let t = registry.get("default").unwrap();
        // SimpleTokenizer keeps case; the replaced default lowercased.
        assert_eq!(t.tokenize("ABC")[0].text, "ABC");
    }

    #[test]
    fn test_index_text_positions() {
        let mut doc = Document::new();
        index_text(&mut doc, "the cat sat", &LowercaseTokenizer);
        index_text(&mut doc, "the mat", &LowercaseTokenizer);

        assert_eq!(doc.term(b"the").unwrap().wdf, 2);
        assert_eq!(doc.term(b"the").unwrap().positions, vec![1, 4]);
        assert_eq!(doc.term(b"mat").unwrap().positions, vec![5]);
        assert_eq!(doc.length(), 5);
    }
}
