//! RegistrationDocument - CRPT "create document" request body
//!
//! Field names follow the remote API exactly; dates are ISO-8601 calendar
//! dates (`YYYY-MM-DD`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Document registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDocument {
    /// Participant description block
    pub description: Description,

    /// Document identifier
    pub doc_id: String,

    /// Document status
    pub doc_status: String,

    /// Document type (e.g. `LP_INTRODUCE_GOODS`)
    pub doc_type: String,

    /// Whether goods are imported
    #[serde(rename = "importRequest")]
    pub import_request: bool,

    /// Owner taxpayer id
    pub owner_inn: String,

    /// Participant taxpayer id
    pub participant_inn: String,

    /// Producer taxpayer id
    pub producer_inn: String,

    /// Production date
    pub production_date: NaiveDate,

    /// Production type
    pub production_type: String,

    /// Products covered by the document
    #[serde(default)]
    pub products: Vec<Product>,

    /// Registration date
    pub reg_date: NaiveDate,

    /// Registration number
    pub reg_number: String,
}

/// Participant description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn")]
    pub participant_inn: String,
}

/// Single product entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: NaiveDate,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

impl RegistrationDocument {
    /// Number of products in the document
    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}
