pub mod keyword;
pub mod nlp;
