use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokenizers::{
    pre_tokenizers::whitespace::Whitespace, OffsetReferential, OffsetType, PreTokenizedString,
    PreTokenizer,
};

/// The padding token, always id 0
pub static PAD_TOKEN: &str = "<pad>";

/// The unknown token, always id 1
pub static UNK_TOKEN: &str = "<unk>";

/// Id of the padding token
pub const PAD_ID: usize = 0;

/// Id of the unknown token
pub const UNK_ID: usize = 1;

/// Split text into lowercase word and punctuation tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let lowercase = text.to_lowercase();
    let mut pretokenized = PreTokenizedString::from(lowercase.as_str());

    if Whitespace::default().pre_tokenize(&mut pretokenized).is_err() {
        return lowercase.split_whitespace().map(str::to_string).collect();
    }

    pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(token, _, _)| token.to_string())
        .collect()
}

/// Token to id mapping, with ids assigned in first-seen order after the pad and unknown tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary over tokenized documents
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a [String]>) -> Self {
        let mut vocabulary = Self::from(vec![PAD_TOKEN.to_string(), UNK_TOKEN.to_string()]);

        for token in documents.into_iter().flatten() {
            if !vocabulary.ids.contains_key(token) {
                vocabulary.ids.insert(token.clone(), vocabulary.tokens.len());
                vocabulary.tokens.push(token.clone());
            }
        }

        vocabulary
    }

    /// The id of a known token
    pub fn get(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    /// The id of a token, falling back to the unknown token
    pub fn id(&self, token: &str) -> usize {
        self.get(token).unwrap_or(UNK_ID)
    }

    /// Encode tokens into exactly `seq_length` ids, padding or truncating at the end
    pub fn encode(&self, tokens: &[String], seq_length: usize) -> Vec<usize> {
        let mut ids: Vec<usize> = tokens
            .iter()
            .take(seq_length)
            .map(|token| self.id(token))
            .collect();

        ids.resize(seq_length, PAD_ID);
        ids
    }

    /// Number of tokens, including the pad and unknown tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary holds no tokens at all
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(tokens: Vec<String>) -> Self {
        let ids = tokens
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id))
            .collect();

        Self { tokens, ids }
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.tokens
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_tokenize_splits_words_and_punctuation() {
        assert_eq!(
            tokenize("Crash on   startup, again!"),
            vec!["crash", "on", "startup", ",", "again", "!"]
        );
    }

    #[test]
    fn test_build_assigns_ids_in_first_seen_order() {
        let documents = [tokenize("b a"), tokenize("a c")];
        let vocabulary = Vocabulary::build(documents.iter().map(Vec::as_slice));

        assert_eq!(vocabulary.len(), 5);
        assert_eq!(vocabulary.id(PAD_TOKEN), PAD_ID);
        assert_eq!(vocabulary.id("b"), 2);
        assert_eq!(vocabulary.id("a"), 3);
        assert_eq!(vocabulary.id("c"), 4);
        assert_eq!(vocabulary.id("zebra"), UNK_ID);
    }

    #[test]
    fn test_encode_pads_and_truncates() {
        let documents = [tokenize("x y z")];
        let vocabulary = Vocabulary::build(documents.iter().map(Vec::as_slice));

        assert_eq!(vocabulary.encode(&tokenize("x q"), 4), vec![2, UNK_ID, 0, 0]);
        assert_eq!(vocabulary.encode(&tokenize("x y z"), 2), vec![2, 3]);
    }
}
