//! Text ⇄ document conversion

use serde_yaml::Value;

use crate::document::Document;
use crate::error::CodecError;

/// Parses and serializes model documents
pub trait DocumentCodec {
    fn parse(&self, text: &str) -> Result<Document, CodecError>;
    fn serialize(&self, document: &Document) -> Result<String, CodecError>;
}

/// YAML codec. JSON input parses too, YAML being a superset.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl DocumentCodec for YamlCodec {
    fn parse(&self, text: &str) -> Result<Document, CodecError> {
        let value: Value = serde_yaml::from_str(text)?;
        Document::from_value(value)
    }

    fn serialize(&self, document: &Document) -> Result<String, CodecError> {
        Ok(serde_yaml::to_string(document.as_value())?)
    }
}
