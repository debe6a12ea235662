use url::Url;

use crate::common::html::elements_with_id;

use super::{DkicError, CARRIER_ID};

/// The signature carrier as seen in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierElement {
    pub tag_name: String,
    /// Declared `type` attribute, if any.
    pub content_type: Option<String>,
    pub text: String,
}

/// Execution context of the document being checked.
///
/// Implemented by the embedding host. It gives the document's address and
/// access to the signature carrier in the rendered tree.
pub trait DocumentContext: Send + Sync {
    fn address(&self) -> &Url;

    /// Every element carrying the fixed carrier id, in document order.
    fn signature_elements(&self) -> Vec<CarrierElement>;
}

/// A document context backed by already-rendered markup.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    address: Url,
    markup: String,
}

impl RenderedDocument {
    pub fn new(address: Url, markup: impl Into<String>) -> Self {
        Self {
            address,
            markup: markup.into(),
        }
    }

    pub fn parse(address: &str, markup: impl Into<String>) -> Result<Self, DkicError> {
        let address = Url::parse(address)
            .map_err(|e| DkicError::InvalidDocumentAddress(format!("{}: {}", address, e)))?;
        Ok(Self::new(address, markup))
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }
}

impl DocumentContext for RenderedDocument {
    fn address(&self) -> &Url {
        &self.address
    }

    fn signature_elements(&self) -> Vec<CarrierElement> {
        elements_with_id(&self.markup, CARRIER_ID)
            .into_iter()
            .map(|el| CarrierElement {
                content_type: el.attribute("type").map(str::to_string),
                text: el.text(&self.markup).to_string(),
                tag_name: el.name,
            })
            .collect()
    }
}
