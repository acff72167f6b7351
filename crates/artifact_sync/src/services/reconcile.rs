//! Merges server-known artifact ids with a commit's new ones

use crate::models::artifact::Artifact;
use crate::models::types::UpdatePayload;
use indexmap::IndexSet;

/// Builds the element update for a commit.
///
/// Server-known ids keep their order and come first. New ids follow in the
/// commit's iteration order, skipping any id already present. Output depends
/// only on the inputs and their order, so resending it is idempotent.
pub fn build_update<'a, I>(
    owning_element_id: &str,
    initial_ids: &IndexSet<String>,
    new_artifacts: I,
) -> UpdatePayload
where
    I: IntoIterator<Item = &'a Artifact>,
{
    let mut merged: IndexSet<&str> = initial_ids.iter().map(String::as_str).collect();
    for artifact in new_artifacts {
        merged.insert(artifact.id());
    }

    UpdatePayload {
        id: owning_element_id.to_string(),
        artifact_ids: merged.into_iter().map(str::to_string).collect(),
    }
}
