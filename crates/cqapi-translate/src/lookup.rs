//! Presence checks of concept ids in a target catalog.

use std::collections::HashSet;

use cqapi_query::{Catalog, ConqueryId, QueryError};

use crate::error::{TranslateError, TranslateResult};

/// Returns true if a concept id (already moved to the catalog's dataset)
/// exists in `catalog`.
///
/// | Below dataset | Looked up in |
/// |---------------|--------------|
/// | root concept | catalog keys |
/// | first child | the root's `children` |
/// | deeper | `known_descendants` |
///
/// The catalog only lists the first child level, so deeper ids under a
/// root the catalog has need the known set from a concept listing; without
/// it they fail with [`TranslateError::MissingDescendantIds`]. Ids under a
/// missing root are never found.
pub fn find_concept_id(
    id: &ConqueryId,
    catalog: &Catalog,
    known_descendants: Option<&HashSet<ConqueryId>>,
) -> TranslateResult<bool> {
    match id.path().len() {
        0 => Err(QueryError::MissingRootConcept(id.to_string()).into()),
        1 => Ok(catalog.contains_concept(id)),
        2 => {
            let root = id.root_concept_id()?;
            Ok(catalog
                .get(&root)
                .is_some_and(|concept| concept.has_child(id)))
        }
        _ => {
            if !catalog.contains_concept(&id.root_concept_id()?) {
                return Ok(false);
            }
            known_descendants
                .map(|known| known.contains(id))
                .ok_or_else(|| TranslateError::MissingDescendantIds(id.to_string()))
        }
    }
}
