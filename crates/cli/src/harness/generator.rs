//! Sample RegistrationDocument generator.

use chrono::{Days, NaiveDate, Utc};
use contracts::{Description, Product, RegistrationDocument};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DOC_TYPE: &str = "LP_INTRODUCE_GOODS";
const TNVED_CODES: [&str; 4] = ["6401100000", "6402190000", "6403400000", "6404110000"];

/// Deterministic generator of plausible registration documents
pub struct DocumentGenerator {
    rng: StdRng,
    producer_id: u16,
    next_id: u64,
    today: NaiveDate,
}

impl DocumentGenerator {
    /// Create a generator for one producer; equal seeds yield equal documents
    pub fn new(producer_id: u16, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            producer_id,
            next_id: 0,
            today: Utc::now().date_naive(),
        }
    }

    /// Build the next document
    pub fn next_document(&mut self) -> RegistrationDocument {
        self.next_id += 1;
        let participant_inn = self.inn();
        let producer_inn = self.inn();
        let production_date = self.days_ago(30);
        let product_count = self.rng.random_range(1..=5);
        let products = (0..product_count)
            .map(|_| self.product(&participant_inn, &producer_inn, production_date))
            .collect();

        RegistrationDocument {
            description: Description {
                participant_inn: participant_inn.clone(),
            },
            doc_id: format!("doc-{}-{:06}", self.producer_id, self.next_id),
            doc_status: "DRAFT".to_string(),
            doc_type: DOC_TYPE.to_string(),
            import_request: self.rng.random_bool(0.1),
            owner_inn: participant_inn.clone(),
            participant_inn,
            producer_inn,
            production_date,
            production_type: "OWN_PRODUCTION".to_string(),
            products,
            reg_date: self.today,
            reg_number: format!("{:010}", self.rng.random_range(0..10_000_000_000u64)),
        }
    }

    fn product(
        &mut self,
        owner_inn: &str,
        producer_inn: &str,
        production_date: NaiveDate,
    ) -> Product {
        Product {
            certificate_document: "CONFORMITY_CERTIFICATE".to_string(),
            certificate_document_date: self.days_ago(365),
            certificate_document_number: format!("RU-{:08}", self.rng.random_range(0..100_000_000u32)),
            owner_inn: owner_inn.to_string(),
            producer_inn: producer_inn.to_string(),
            production_date,
            tnved_code: TNVED_CODES[self.rng.random_range(0..TNVED_CODES.len())].to_string(),
            uit_code: self.code(31),
            uitu_code: self.code(18),
        }
    }

    /// 10-digit legal entity taxpayer id
    fn inn(&mut self) -> String {
        format!("{:010}", self.rng.random_range(1_000_000_000..10_000_000_000u64))
    }

    fn code(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.rng.random_range(0..10u8)))
            .collect()
    }

    fn days_ago(&mut self, max: u64) -> NaiveDate {
        let days = self.rng.random_range(0..=max);
        self.today
            .checked_sub_days(Days::new(days))
            .unwrap_or(self.today)
    }
}

impl Iterator for DocumentGenerator {
    type Item = RegistrationDocument;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_document())
    }
}
