use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

pub(crate) static TOKENIZER: Lazy<CoreBPE> =
    Lazy::new(|| cl100k_base().expect("Failed to load tokenizer"));

/// Count tokens the way OpenAI models do (cl100k_base).
pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_with_special_tokens(text).len()
}
