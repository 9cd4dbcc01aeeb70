use tabled::{settings::Style, Table, Tabled};
use crate::storage::{DbStats, IdentityMapping};

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Collection")]
    collection: String,
    #[tabled(rename = "Documents")]
    documents: usize,
    #[tabled(rename = "Imported")]
    imported: usize,
}

#[derive(Tabled)]
struct IdentityRow {
    #[tabled(rename = "Collection")]
    collection: String,
    #[tabled(rename = "Legacy id")]
    legacy_id: String,
    #[tabled(rename = "Document id")]
    document_id: String,
}

pub fn stats_table(stats: &DbStats) -> String {
    let rows: Vec<StatsRow> = stats
        .collections
        .iter()
        .map(|c| StatsRow {
            collection: c.collection.to_string(),
            documents: c.documents,
            imported: c.with_legacy_id,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn identity_table(mappings: &[IdentityMapping]) -> String {
    if mappings.is_empty() {
        return String::new();
    }

    let rows: Vec<IdentityRow> = mappings
        .iter()
        .map(|m| IdentityRow {
            collection: m.collection.clone(),
            legacy_id: m.legacy_id.clone(),
            document_id: m.document_id.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
