//! Opaque display content.
//!
//! Rendering (styles, click events, translation) belongs to the embedding
//! application. This type only carries the plain text alongside whatever
//! serialized markup the relay attached, and compares them for equality.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::codec::{self, Wire};
use crate::{ProtocolError, MAX_CONTENT_BYTES};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChatContent {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    markup: Option<String>,
}

impl ChatContent {
    /// Unstyled text.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_markup(text: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup.into()),
        }
    }

    pub fn plain_text(&self) -> &str {
        &self.text
    }

    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }
}

impl Wire for ChatContent {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        codec::put_string(dst, &self.text, MAX_CONTENT_BYTES)?;
        codec::put_bool(dst, self.markup.is_some());
        if let Some(markup) = &self.markup {
            codec::put_string(dst, markup, MAX_CONTENT_BYTES)?;
        }
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        let text = codec::get_string(src, MAX_CONTENT_BYTES)?;
        let markup = if codec::get_bool(src)? {
            Some(codec::get_string(src, MAX_CONTENT_BYTES)?)
        } else {
            None
        };
        Ok(Self { text, markup })
    }
}
