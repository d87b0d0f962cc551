use csv2thesis_client::{BlockingApi, NewPerson, RemoteError};
use csv2thesis_core::{Person, ReferenceCache, ThesisPlan};

use crate::logging;

/// Where resolved creations go: the real API, or a shadow for dry runs.
pub trait CommitSink {
    fn create_person(&mut self, person: &NewPerson) -> Result<Person, RemoteError>;
    fn create_thesis(&mut self, plan: &ThesisPlan) -> Result<i64, RemoteError>;
}

pub struct ApiSink<'a> {
    api: &'a BlockingApi,
}

impl<'a> ApiSink<'a> {
    pub fn new(api: &'a BlockingApi) -> Self {
        Self { api }
    }
}

impl CommitSink for ApiSink<'_> {
    fn create_person(&mut self, person: &NewPerson) -> Result<Person, RemoteError> {
        self.api.create_person(person)
    }

    fn create_thesis(&mut self, plan: &ThesisPlan) -> Result<i64, RemoteError> {
        self.api.create_thesis(plan)
    }
}

/// Dry-run sink: allocates ids above everything the cache knows, so later
/// rows reconcile against simulated creations exactly as they would against
/// real ones. Never touches the remote.
pub struct ShadowSink {
    next_person_id: i64,
    next_thesis_id: i64,
}

impl ShadowSink {
    pub fn seeded(cache: &ReferenceCache) -> Self {
        Self {
            next_person_id: cache.max_person_id() + 1,
            next_thesis_id: cache.max_thesis_id() + 1,
        }
    }
}

impl CommitSink for ShadowSink {
    fn create_person(&mut self, person: &NewPerson) -> Result<Person, RemoteError> {
        let id = self.next_person_id;
        self.next_person_id += 1;
        logging::stage(
            "dry-run",
            format!(
                "would create person {} {} as #{id}",
                person.first_name, person.last_name
            ),
        );
        Ok(Person {
            id,
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            email: Some(person.email.clone()),
            external_id: person.external_id.clone(),
        })
    }

    fn create_thesis(&mut self, plan: &ThesisPlan) -> Result<i64, RemoteError> {
        let id = self.next_thesis_id;
        self.next_thesis_id += 1;
        logging::stage(
            "dry-run",
            format!(
                "would create [{}] {} as #{id}",
                plan.thesis_type.as_str(),
                plan.title.as_deref().unwrap_or("Untitled")
            ),
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv2thesis_core::{Phase, ThesisSummary, ThesisType};

    fn new_person(first: &str, last: &str) -> NewPerson {
        NewPerson {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!(
                "{}.{}@example.com",
                first.to_lowercase(),
                last.to_lowercase()
            ),
            external_id: None,
            comments: None,
        }
    }

    #[test]
    fn shadow_ids_start_above_cache_maxima() {
        let mut cache = ReferenceCache::default();
        cache.add_person(Person {
            id: 41,
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            email: None,
            external_id: None,
        });
        cache.add_thesis(ThesisSummary {
            id: 7,
            thesis_type: ThesisType::Bachelor,
            title: None,
            student_ids: vec![41],
        });
        let mut sink = ShadowSink::seeded(&cache);
        let created = sink.create_person(&new_person("Anna", "Mueller")).unwrap();
        assert_eq!(created.id, 42);
        let second = sink.create_person(&new_person("Eva", "Kurz")).unwrap();
        assert_eq!(second.id, 43);

        let plan = ThesisPlan {
            thesis_type: ThesisType::Bachelor,
            title: None,
            student_ids: vec![42],
            supervisor_ids: vec![],
            phase: Phase::default(),
            date_first_contact: None,
            date_registration: None,
            date_deadline: None,
            date_presentation: None,
            note: None,
        };
        assert_eq!(sink.create_thesis(&plan).unwrap(), 8);
    }
}
