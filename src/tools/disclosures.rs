//! Corporate disclosure retrieval index
//!
//! Keyword retrieval over seeded disclosure excerpts (annual reports, risk
//! factor sections, rating commentary). Constructed explicitly and handed
//! to the tool registry; the document set is seeded lazily on first use
//! and is safe for concurrent reads across analysis runs.

use serde::Serialize;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Serialize)]
pub struct Disclosure {
    pub source: String,
    pub company: String,
    pub document_type: String,
    pub content: String,
}

/// A retrieval hit with its score, ready for a tool result payload.
#[derive(Debug, Clone, Serialize)]
pub struct DisclosureHit {
    pub source: String,
    pub company: String,
    pub document_type: String,
    pub excerpt: String,
    pub relevance_score: f32,
}

pub struct DisclosureIndex {
    documents: OnceCell<Vec<Disclosure>>,
    seed: Option<Vec<Disclosure>>,
}

impl DisclosureIndex {
    pub fn new() -> Self {
        Self { documents: OnceCell::new(), seed: None }
    }

    /// Build an index over a caller-supplied document set instead of the
    /// default seed.
    pub fn with_documents(docs: Vec<Disclosure>) -> Self {
        Self { documents: OnceCell::new(), seed: Some(docs) }
    }

    async fn documents(&self) -> &Vec<Disclosure> {
        self.documents
            .get_or_init(|| async {
                match &self.seed {
                    Some(docs) => docs.clone(),
                    None => default_corpus(),
                }
            })
            .await
    }

    /// Rank documents by keyword overlap with the query, optionally
    /// restricted to one company, returning the `k` best hits.
    pub async fn search(&self, query: &str, company: Option<&str>, k: usize) -> Vec<DisclosureHit> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|t| t.len() > 2)
            .map(str::to_string)
            .collect();

        let mut hits: Vec<DisclosureHit> = self
            .documents()
            .await
            .iter()
            .filter(|d| match company {
                Some(c) => d.company.eq_ignore_ascii_case(c) || d.company == "Global",
                None => true,
            })
            .filter_map(|d| {
                let haystack = d.content.to_lowercase();
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if matched == 0 || terms.is_empty() {
                    return None;
                }
                Some(DisclosureHit {
                    source: d.source.clone(),
                    company: d.company.clone(),
                    document_type: d.document_type.clone(),
                    excerpt: d.content.chars().take(400).collect(),
                    relevance_score: matched as f32 / terms.len() as f32,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }
}

impl Default for DisclosureIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn default_corpus() -> Vec<Disclosure> {
    vec![
        Disclosure {
            source: "AAPL 10-K 2024, Item 1A".into(),
            company: "Apple".into(),
            document_type: "annual_report".into(),
            content: "Substantially all of the Company's hardware products are \
                manufactured by outsourcing partners located primarily in China, \
                Taiwan, Vietnam and India. Restrictions on international trade, \
                tariffs or export controls affecting semiconductors could \
                materially adversely affect the Company's business and supply \
                chain."
                .into(),
        },
        Disclosure {
            source: "AAPL 10-K 2024, MD&A".into(),
            company: "Apple".into(),
            document_type: "annual_report".into(),
            content: "The Company maintains significant cash, cash equivalents \
                and marketable securities balances, and total term debt of \
                approximately $97 billion. Liquidity remains sufficient to meet \
                obligations, with strong free cash flow generation and an \
                investment-grade credit profile."
                .into(),
        },
        Disclosure {
            source: "Fitch Global Corporates Outlook 2025".into(),
            company: "Global".into(),
            document_type: "rating_commentary".into(),
            content: "Credit conditions for global technology issuers remain \
                stable, though escalating US-China tensions around export \
                controls on advanced semiconductors present a deteriorating \
                geopolitical risk backdrop for hardware supply chains."
                .into(),
        },
        Disclosure {
            source: "WEF Global Risks Report 2025".into(),
            company: "Global".into(),
            document_type: "risk_outlook".into(),
            content: "Geoeconomic confrontation, including sanctions, tariffs \
                and investment screening, ranks among the top five global risks \
                by severity. Concentration of advanced chip fabrication in \
                Taiwan remains a singular systemic vulnerability."
                .into(),
        },
    ]
}
