//! Per-project set of professionals already engaged (assigned or invited).

use std::collections::HashSet;

use thiserror::Error;

use crate::{ProfessionalId, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("professional {0} is already engaged with this project")]
pub struct AlreadyEngaged(pub ProfessionalId);

/// Professionals hidden from discovery because they are already engaged with
/// the active project.
///
/// Membership has two layers:
/// - `members`: confirmed by the project-team service, or by a successful
///   assignment call that the next team refresh has not yet confirmed.
/// - `in_flight`: optimistic entries whose assignment call has not returned.
///
/// A team refresh replaces `members` wholesale (the server always wins) but
/// leaves `in_flight` alone; those entries are settled by their own call.
///
/// The set is scoped to one project. Switching projects means building a new
/// set, never merging.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    project: Option<ProjectId>,
    members: HashSet<ProfessionalId>,
    in_flight: HashSet<ProfessionalId>,
}

impl ExclusionSet {
    #[must_use]
    pub fn for_project(project: Option<ProjectId>) -> Self {
        Self {
            project,
            members: HashSet::new(),
            in_flight: HashSet::new(),
        }
    }

    #[must_use]
    pub fn project(&self) -> Option<&ProjectId> {
        self.project.as_ref()
    }

    #[must_use]
    pub fn contains(&self, id: &ProfessionalId) -> bool {
        self.members.contains(id) || self.in_flight.contains(id)
    }

    #[must_use]
    pub fn is_pending(&self, id: &ProfessionalId) -> bool {
        self.in_flight.contains(id)
    }

    /// Number of distinct professionals hidden.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
            + self
                .in_flight
                .iter()
                .filter(|id| !self.members.contains(*id))
                .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.in_flight.is_empty()
    }

    /// Optimistically hide `id` ahead of its assignment call.
    ///
    /// Fails if `id` is already hidden for any reason, which is what makes
    /// a second assignment of the same professional a rejected no-op.
    pub fn begin(&mut self, id: ProfessionalId) -> Result<(), AlreadyEngaged> {
        if self.contains(&id) {
            return Err(AlreadyEngaged(id));
        }
        self.in_flight.insert(id);
        Ok(())
    }

    /// The assignment call succeeded: keep `id` hidden until the next refresh.
    pub fn commit(&mut self, id: &ProfessionalId) {
        if self.in_flight.remove(id) {
            self.members.insert(id.clone());
        }
    }

    /// The assignment call failed: undo the optimistic insert.
    ///
    /// Returns whether the professional becomes visible again. An entry that
    /// an authoritative refresh confirmed in the meantime stays hidden.
    pub fn rollback(&mut self, id: &ProfessionalId) -> bool {
        self.in_flight.remove(id) && !self.members.contains(id)
    }

    /// Replace confirmed membership with the project-team service's view.
    pub fn reconcile<I>(&mut self, team: I)
    where
        I: IntoIterator<Item = ProfessionalId>,
    {
        self.members = team.into_iter().collect();
    }
}
