pub mod doc2json;
pub mod filter;
pub mod metadata;
pub mod package;
pub mod record;
pub mod xml;
