//! Fixed-vocabulary character tokenizer
//!
//! The vocabulary has four special symbols followed by the
//! printable ASCII range, one id per character. Sequences are always emitted
//! at a fixed length so every forward pass sees the same tensor shapes.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Total number of token ids
pub const VOCAB_SIZE: usize = 100;

/// Glyph used when an id has no symbol
pub const PLACEHOLDER: &str = "?";

const FIRST_PRINTABLE: u8 = 32;
const LAST_PRINTABLE: u8 = 126;

/// Special token ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad_token_id: u32,
    pub bos_token_id: u32,
    pub eos_token_id: u32,
    pub mask_token_id: u32,
}

impl SpecialTokens {
    pub const fn new() -> Self {
        Self { pad_token_id: 0, bos_token_id: 1, eos_token_id: 2, mask_token_id: 3 }
    }

    /// Number of ids reserved ahead of the printable range
    pub const fn count(&self) -> u32 {
        4
    }
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable id <-> symbol table, built once per process
#[derive(Debug)]
pub struct Vocabulary {
    id_to_token: Vec<Option<String>>,
    char_to_id: HashMap<char, u32>,
}

impl Vocabulary {
    fn build() -> Self {
        let special = SpecialTokens::new();
        let mut id_to_token: Vec<Option<String>> = vec![None; VOCAB_SIZE];
        let mut char_to_id = HashMap::new();

        id_to_token[special.pad_token_id as usize] = Some("<pad>".to_string());
        id_to_token[special.bos_token_id as usize] = Some("<bos>".to_string());
        id_to_token[special.eos_token_id as usize] = Some("<eos>".to_string());
        id_to_token[special.mask_token_id as usize] = Some("<mask>".to_string());

        let mut id = special.count() as usize;
        for byte in FIRST_PRINTABLE..=LAST_PRINTABLE {
            if id >= VOCAB_SIZE {
                break;
            }
            let c = byte as char;
            id_to_token[id] = Some(c.to_string());
            char_to_id.insert(c, id as u32);
            id += 1;
        }

        Self { id_to_token, char_to_id }
    }

    /// The process-wide vocabulary
    pub fn global() -> &'static Vocabulary {
        static VOCABULARY: OnceLock<Vocabulary> = OnceLock::new();
        VOCABULARY.get_or_init(Vocabulary::build)
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn char_to_id(&self, c: char) -> Option<u32> {
        self.char_to_id.get(&c).copied()
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).and_then(|t| t.as_deref())
    }
}

/// Character-level tokenizer over the global [`Vocabulary`]
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    vocab: &'static Vocabulary,
    special_tokens: SpecialTokens,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self { vocab: Vocabulary::global(), special_tokens: SpecialTokens::new() }
    }

    /// Encode text into exactly `seq_len` ids.
    ///
    /// Layout is `BOS, chars.., EOS`. Characters outside the vocabulary are
    /// dropped. Overlong input keeps the first `seq_len - 1` ids and ends in a
    /// forced EOS; short input is padded with PAD on the left.
    pub fn encode(&self, text: &str, seq_len: usize) -> Vec<u32> {
        let mut tokens = Vec::with_capacity(text.len() + 2);
        tokens.push(self.special_tokens.bos_token_id);
        tokens.extend(text.chars().filter_map(|c| self.vocab.char_to_id(c)));
        tokens.push(self.special_tokens.eos_token_id);

        if seq_len == 0 {
            return Vec::new();
        }
        if tokens.len() > seq_len {
            tokens.truncate(seq_len - 1);
            tokens.push(self.special_tokens.eos_token_id);
            return tokens;
        }

        let padding = seq_len - tokens.len();
        let mut padded = vec![self.special_tokens.pad_token_id; padding];
        padded.extend(tokens);
        padded
    }

    /// Decode ids into text, skipping PAD/BOS/EOS
    pub fn decode(&self, token_ids: &[u32]) -> String {
        token_ids
            .iter()
            .filter(|&&id| !self.is_structural(id))
            .map(|&id| self.token_str(id))
            .collect()
    }

    /// Display string for one id; unknown ids render as [`PLACEHOLDER`]
    pub fn token_str(&self, id: u32) -> &'static str {
        self.vocab.id_to_token(id).unwrap_or(PLACEHOLDER)
    }

    pub fn token_to_id(&self, c: char) -> Option<u32> {
        self.vocab.char_to_id(c)
    }

    /// Replace the token at `index` with MASK.
    ///
    /// Returns `false` and leaves `token_ids` untouched when the index is out
    /// of range.
    pub fn apply_mask(&self, token_ids: &mut [u32], index: usize) -> bool {
        match token_ids.get_mut(index) {
            Some(slot) => {
                *slot = self.special_tokens.mask_token_id;
                true
            }
            None => false,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    fn is_structural(&self, id: u32) -> bool {
        id == self.special_tokens.pad_token_id
            || id == self.special_tokens.bos_token_id
            || id == self.special_tokens.eos_token_id
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_layout() {
        let vocab = Vocabulary::global();
        assert_eq!(vocab.len(), VOCAB_SIZE);
        assert_eq!(vocab.char_to_id(' '), Some(4));
        assert_eq!(vocab.char_to_id('A'), Some(37));
        assert_eq!(vocab.char_to_id('~'), Some(98));
        assert_eq!(vocab.id_to_token(99), None);
        assert_eq!(vocab.id_to_token(3), Some("<mask>"));
    }

    #[test]
    fn test_encode_pads_left() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.encode("Hi!", 16);

        assert_eq!(tokens.len(), 16);
        assert!(tokens[..11].iter().all(|&t| t == 0));
        assert_eq!(&tokens[11..], &[1, 44, 77, 5, 2]);
    }

    #[test]
    fn test_encode_truncates_with_forced_eos() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.encode("abcdefghij", 6);

        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], 1);
        assert_eq!(tokens[5], 2);
        assert_eq!(tokenizer.decode(&tokens), "abcd");
    }

    #[test]
    fn test_encode_seq_len_one() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.encode("hello", 1), vec![2]);
        assert_eq!(tokenizer.encode("", 1), vec![2]);
    }

    #[test]
    fn test_out_of_vocabulary_dropped() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.encode("héllo\n", 12);
        assert_eq!(tokenizer.decode(&tokens), "hllo");
    }

    #[test]
    fn test_round_trip() {
        let tokenizer = Tokenizer::new();
        for text in ["", "a", "Hello, world!", " ~{}|", "0123456789abc"] {
            let seq_len = text.len() + 2;
            assert_eq!(tokenizer.decode(&tokenizer.encode(text, seq_len)), text);
            assert_eq!(tokenizer.decode(&tokenizer.encode(text, seq_len + 7)), text);
        }
    }

    #[test]
    fn test_decode_mask_and_unknown() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.decode(&[1, 37, 3, 99, 500, 2, 0]), "A<mask>??");
    }

    #[test]
    fn test_apply_mask() {
        let tokenizer = Tokenizer::new();
        let mut tokens = tokenizer.encode("ab", 4);
        assert!(tokenizer.apply_mask(&mut tokens, 1));
        assert_eq!(tokens[1], 3);
        assert!(!tokenizer.apply_mask(&mut tokens, 4));
        assert_eq!(tokens.len(), 4);
    }
}
