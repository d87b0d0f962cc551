use crate::record::{Person, ThesisSummary};

/// In-memory snapshot of the reference dataset, loaded once per batch.
///
/// Additions become visible to every subsequent lookup immediately, so two
/// similar rows in the same run reconcile against each other instead of
/// both creating new entities. Single-owner and single-threaded; callers
/// must append a creation before matching the next row.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    people: Vec<Person>,
    theses: Vec<ThesisSummary>,
}

impl ReferenceCache {
    pub fn new(people: Vec<Person>, theses: Vec<ThesisSummary>) -> Self {
        Self { people, theses }
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn theses(&self) -> &[ThesisSummary] {
        &self.theses
    }

    pub fn add_person(&mut self, person: Person) {
        tracing::debug!(id = person.id, "caching created person");
        self.people.push(person);
    }

    pub fn add_thesis(&mut self, thesis: ThesisSummary) {
        tracing::debug!(id = thesis.id, "caching created thesis");
        self.theses.push(thesis);
    }

    /// Highest person id currently known; seeds shadow-id allocation.
    pub fn max_person_id(&self) -> i64 {
        self.people.iter().map(|p| p.id).max().unwrap_or(0)
    }

    pub fn max_thesis_id(&self) -> i64 {
        self.theses.iter().map(|t| t.id).max().unwrap_or(0)
    }
}
