//! Foreign-key resolution for a normalized row.

use crate::error::{LoadError, ResolutionError};
use crate::store::InteractionStore;
use crate::types::{InteractionValue, Site};

/// `exhibition_id` for the exhibition whose public id is `EXH_0<site>`.
pub async fn resolve_exhibition<S>(store: &S, site: Site) -> Result<i32, LoadError>
where
    S: InteractionStore + ?Sized,
{
    store
        .resolve_exhibition(site)
        .await?
        .ok_or_else(|| {
            ResolutionError::Exhibition {
                public_id: site.public_id(),
            }
            .into()
        })
}

/// `rating_id` for a rating score, `request_id` for a request subtype.
pub async fn resolve_value_id<S>(store: &S, value: &InteractionValue) -> Result<i32, LoadError>
where
    S: InteractionStore + ?Sized,
{
    let kind = value.kind();
    let lookup = value.lookup_value();
    store
        .resolve_value_id(kind, lookup)
        .await?
        .ok_or_else(|| ResolutionError::Value { kind, value: lookup }.into())
}
