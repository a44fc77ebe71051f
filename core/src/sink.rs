use crate::definition::TrackingDefinition;
use crate::entity::CanonicalEntity;
use crate::error::Result;
use crate::result::QueryResult;

/// Persisted store used for tracking history and ad hoc query output.
pub trait OutputStore {
    /// Whether the store is reachable right now.
    fn available(&self) -> bool;

    /// Writes every entity as a tracking record for `definition` and returns
    /// those whose identity had no prior record under the same definition.
    /// A host's attached domains are checked as identities of their own.
    fn tracking_output(
        &mut self,
        entities: &[CanonicalEntity],
        definition: &TrackingDefinition,
    ) -> Result<Vec<CanonicalEntity>>;

    /// Stores one query result outside of tracking, either the raw payload or
    /// its canonical entities.
    fn query_output(&mut self, result: &QueryResult, raw: bool) -> Result<()>;
}

/// Delivers the new entities of one tracking run for one definition.
/// Implementations do nothing for an empty batch and never fail.
pub trait Notifier {
    fn notify(&self, definition: &TrackingDefinition, entities: &[CanonicalEntity]);
}
