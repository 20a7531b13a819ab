//! Memory assembly for prompt injection.

use crate::error::MemoryError;
use crate::store::VectorMemoryStore;

/// Separator placed between recalled records.
pub const RECORD_SEPARATOR: &str = "\n";

/// Retrieve the top `k` records for `query` and join their content in rank order.
///
/// An absent store or an empty result yields an empty string. No truncation is
/// applied; callers bound the size through `k`.
pub async fn assemble(
    store: Option<&VectorMemoryStore>,
    query: &str,
    k: usize,
) -> Result<String, MemoryError> {
    let Some(store) = store else {
        return Ok(String::new());
    };
    let records = store.similarity_search(query, k).await?;
    Ok(records
        .iter()
        .map(|record| record.content.as_str())
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR))
}
