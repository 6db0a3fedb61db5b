//! MHTML parsing: boundary tokenizing, part splitting, whole-file parsing and
//! transfer decoding.

pub mod encoding;
pub mod mhtml;
pub mod part;
pub mod tokenizer;
