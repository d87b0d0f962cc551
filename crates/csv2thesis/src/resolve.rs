use anyhow::Result;

use csv2thesis_client::NewPerson;
use csv2thesis_core::{
    find_person_matches, find_similar_theses, PersonDraft, ReferenceCache, Role, ThesisDraft,
    ThesisPlan, ThesisSummary,
};

use crate::logging;
use crate::policy::{DecisionPolicy, MatchDecision};
use crate::sink::CommitSink;

#[derive(Debug, Clone)]
pub enum RowOutcome {
    Done { thesis_id: i64 },
    Skipped { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub match_threshold: f64,
    pub title_threshold: f64,
}

/// Drive one draft through matching, per-group decisions, participant
/// creation, the duplicate check, and the thesis commit.
///
/// Every creation lands in the cache before the duplicate check runs and
/// before the caller moves to the next row, so rows within a batch
/// reconcile against each other. Nothing is rolled back: participants
/// created before a later step fails or is declined stay in the remote,
/// and the outcome message names them.
pub fn resolve_row(
    draft: &ThesisDraft,
    cache: &mut ReferenceCache,
    policy: &mut dyn DecisionPolicy,
    sink: &mut dyn CommitSink,
    options: &ResolveOptions,
) -> Result<RowOutcome> {
    logging::verbose(format!(
        "row {}: matching {} participant group(s)",
        draft.row_index,
        draft.people.len()
    ));

    let mut decisions: Vec<MatchDecision> = Vec::with_capacity(draft.people.len());
    for group in &draft.people {
        let candidates = find_person_matches(group, cache.people(), options.match_threshold);
        decisions.push(policy.choose_match(group, &candidates)?);
    }

    // A required role with no surviving group ends the row here, before
    // anything is created.
    for role in draft.thesis_type.required_roles() {
        let satisfied = draft
            .people
            .iter()
            .zip(&decisions)
            .any(|(group, decision)| {
                group.role_or_student() == *role && !matches!(decision, MatchDecision::Skip)
            });
        if !satisfied {
            return Ok(RowOutcome::Skipped {
                message: format!("required {} group skipped", role.as_str()),
            });
        }
    }

    let mut student_ids = Vec::new();
    let mut supervisor_ids = Vec::new();
    let mut created_ids: Vec<i64> = Vec::new();
    for (group, decision) in draft.people.iter().zip(decisions) {
        let id = match decision {
            MatchDecision::Skip => {
                logging::stage("resolve", format!("skipping {group}"));
                continue;
            }
            MatchDecision::UseExisting(person) => {
                logging::stage("resolve", format!("using existing #{} for {group}", person.id));
                person.id
            }
            MatchDecision::CreateNew => {
                let request = new_person_request(group);
                match sink.create_person(&request) {
                    Ok(person) => {
                        logging::stage("create", format!("created person #{}: {person}", person.id));
                        let id = person.id;
                        cache.add_person(person);
                        created_ids.push(id);
                        id
                    }
                    Err(err) => {
                        return Ok(RowOutcome::Failed {
                            message: with_orphans(
                                format!("creating person {group} failed: {err}"),
                                &created_ids,
                            ),
                        });
                    }
                }
            }
        };
        match group.role_or_student() {
            Role::Student => student_ids.push(id),
            Role::Supervisor => supervisor_ids.push(id),
        }
    }

    let plan = ThesisPlan::from_draft(draft, student_ids, supervisor_ids);

    let hits = find_similar_theses(&plan, cache.theses(), options.title_threshold);
    if hits.is_empty() {
        logging::verbose(format!("row {}: no similar theses", draft.row_index));
    } else if !policy.confirm_duplicate(&plan, &hits)? {
        return Ok(RowOutcome::Skipped {
            message: with_orphans("possible duplicate".to_string(), &created_ids),
        });
    }

    if !policy.confirm_commit(&plan)? {
        return Ok(RowOutcome::Skipped {
            message: with_orphans("declined by operator".to_string(), &created_ids),
        });
    }

    match sink.create_thesis(&plan) {
        Ok(thesis_id) => {
            cache.add_thesis(ThesisSummary {
                id: thesis_id,
                thesis_type: plan.thesis_type,
                title: plan.title.clone(),
                student_ids: plan.student_ids.clone(),
            });
            logging::stage("create", format!("created thesis #{thesis_id}"));
            Ok(RowOutcome::Done { thesis_id })
        }
        Err(err) => Ok(RowOutcome::Failed {
            message: with_orphans(format!("thesis commit failed: {err}"), &created_ids),
        }),
    }
}

fn new_person_request(group: &PersonDraft) -> NewPerson {
    let email = match &group.email {
        Some(email) => email.clone(),
        None => {
            let placeholder = format!(
                "{}.{}@example.com",
                group.first_name.to_lowercase().replace(' ', "."),
                group.last_name.to_lowercase().replace(' ', ".")
            );
            logging::stage(
                "create",
                format!("no email for {group}, using placeholder {placeholder}"),
            );
            placeholder
        }
    };
    NewPerson {
        first_name: group.first_name.clone(),
        last_name: group.last_name.clone(),
        email,
        external_id: group.external_id.clone(),
        comments: group
            .role
            .filter(|role| *role == Role::Supervisor)
            .map(|role| format!("Role: {}", role.as_str())),
    }
}

/// Nothing is compensated after a partial commit; say so instead of hiding it.
fn with_orphans(base: String, created_ids: &[i64]) -> String {
    if created_ids.is_empty() {
        return base;
    }
    let ids = created_ids
        .iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{base}; participant(s) already created remain, remote id(s) {ids} orphaned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testing::ScriptedPolicy;
    use crate::policy::AutoPolicy;
    use crate::sink::ShadowSink;
    use csv2thesis_client::RemoteError;
    use csv2thesis_core::{Person, Phase, ThesisType};

    fn options() -> ResolveOptions {
        ResolveOptions {
            match_threshold: 0.8,
            title_threshold: 0.6,
        }
    }

    fn person_draft(first: &str, last: &str, role: Option<Role>) -> PersonDraft {
        PersonDraft {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: None,
            external_id: None,
            role,
        }
    }

    fn draft(people: Vec<PersonDraft>) -> ThesisDraft {
        ThesisDraft {
            thesis_type: ThesisType::Bachelor,
            title: Some("Graph partitioning".to_string()),
            people,
            phase: Phase::default(),
            date_first_contact: None,
            date_registration: None,
            date_deadline: None,
            date_presentation: None,
            note: None,
            warnings: vec![],
            row_index: 2,
        }
    }

    fn known_person(id: i64, first: &str, last: &str, email: Option<&str>) -> Person {
        Person {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.map(str::to_string),
            external_id: None,
        }
    }

    /// Sink that fails thesis creation after letting people through.
    struct FailingThesisSink {
        inner: ShadowSink,
    }

    impl CommitSink for FailingThesisSink {
        fn create_person(&mut self, person: &NewPerson) -> Result<Person, RemoteError> {
            self.inner.create_person(person)
        }

        fn create_thesis(&mut self, _plan: &ThesisPlan) -> Result<i64, RemoteError> {
            Err(RemoteError::Status {
                method: "POST",
                url: "http://test/api/theses/".to_string(),
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    #[test]
    fn unmatched_people_are_created_and_cached() {
        let mut cache = ReferenceCache::default();
        let mut policy = AutoPolicy;
        let mut sink = ShadowSink::seeded(&cache);
        let draft = draft(vec![
            person_draft("Anna", "Mueller", Some(Role::Student)),
            person_draft("Jan", "Weber", Some(Role::Supervisor)),
        ]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        assert!(matches!(outcome, RowOutcome::Done { .. }));
        assert_eq!(cache.people().len(), 2);
        assert_eq!(cache.theses().len(), 1);
        assert_eq!(cache.theses()[0].student_ids.len(), 1);
    }

    #[test]
    fn confident_fuzzy_match_reuses_the_person() {
        // umlaut variant of a known person, no email on the draft side
        let mut cache = ReferenceCache::new(
            vec![known_person(1, "Anna", "Mueller", Some("a.mueller@uni.de"))],
            vec![],
        );
        let mut policy = AutoPolicy;
        let mut sink = ShadowSink::seeded(&cache);
        let draft = draft(vec![person_draft("Anna", "Müller", Some(Role::Student))]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        assert!(matches!(outcome, RowOutcome::Done { .. }));
        assert_eq!(cache.people().len(), 1, "no new person expected");
        assert_eq!(cache.theses()[0].student_ids, vec![1]);
    }

    #[test]
    fn ambiguous_match_creates_new_in_auto_mode() {
        let mut cache = ReferenceCache::new(
            vec![known_person(1, "Anna", "Mueller", None)],
            vec![],
        );
        let mut policy = AutoPolicy;
        let mut sink = ShadowSink::seeded(&cache);
        // ~0.86 average: above the match threshold, below auto-accept
        let draft = draft(vec![person_draft("Anna", "Mülller", Some(Role::Student))]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        assert!(matches!(outcome, RowOutcome::Done { .. }));
        assert_eq!(cache.people().len(), 2, "original and new entity expected");
    }

    #[test]
    fn skipping_the_student_skips_the_row() {
        let mut cache = ReferenceCache::default();
        let mut policy = ScriptedPolicy::default();
        policy.decisions.push_back(MatchDecision::Skip);
        let mut sink = ShadowSink::seeded(&cache);
        let draft = draft(vec![person_draft("Anna", "Mueller", Some(Role::Student))]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        match outcome {
            RowOutcome::Skipped { message } => assert!(message.contains("required student")),
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(cache.people().is_empty(), "nothing may be created");
    }

    #[test]
    fn skipping_a_supervisor_keeps_the_row() {
        let mut cache = ReferenceCache::default();
        let mut policy = ScriptedPolicy::default();
        policy.decisions.push_back(MatchDecision::CreateNew);
        policy.decisions.push_back(MatchDecision::Skip);
        let mut sink = ShadowSink::seeded(&cache);
        let draft = draft(vec![
            person_draft("Anna", "Mueller", Some(Role::Student)),
            person_draft("Jan", "Weber", Some(Role::Supervisor)),
        ]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        assert!(matches!(outcome, RowOutcome::Done { .. }));
        assert_eq!(cache.people().len(), 1);
        assert!(cache.theses()[0].student_ids.len() == 1);
    }

    #[test]
    fn duplicate_decline_skips_and_reports_orphans() {
        let mut cache = ReferenceCache::new(
            vec![known_person(7, "Anna", "Mueller", Some("a@uni.de"))],
            vec![ThesisSummary {
                id: 3,
                thesis_type: ThesisType::Bachelor,
                title: Some("Old title".to_string()),
                student_ids: vec![7, 9],
            }],
        );
        let mut policy = ScriptedPolicy::default();
        // reuse the known student, create the supervisor, then decline
        policy
            .decisions
            .push_back(MatchDecision::UseExisting(known_person(
                7,
                "Anna",
                "Mueller",
                None,
            )));
        policy.decisions.push_back(MatchDecision::CreateNew);
        policy.duplicate_answers.push_back(false);
        let mut sink = ShadowSink::seeded(&cache);
        let draft = draft(vec![
            person_draft("Anna", "Mueller", Some(Role::Student)),
            person_draft("Jan", "Weber", Some(Role::Supervisor)),
        ]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        match outcome {
            RowOutcome::Skipped { message } => {
                assert!(message.contains("possible duplicate"));
                assert!(message.contains("orphaned"));
            }
            other => panic!("expected skip, got {other:?}"),
        }
        assert_eq!(policy.duplicate_prompts, 1);
        assert_eq!(cache.theses().len(), 1, "no thesis committed");
    }

    #[test]
    fn duplicate_fires_on_student_overlap_despite_title() {
        let mut cache = ReferenceCache::new(
            vec![known_person(7, "Anna", "Mueller", Some("a@uni.de"))],
            vec![ThesisSummary {
                id: 3,
                thesis_type: ThesisType::Bachelor,
                title: Some("Entirely different words".to_string()),
                student_ids: vec![7, 9],
            }],
        );
        let mut policy = ScriptedPolicy::default();
        policy
            .decisions
            .push_back(MatchDecision::UseExisting(known_person(
                7,
                "Anna",
                "Mueller",
                None,
            )));
        let mut sink = ShadowSink::seeded(&cache);
        let draft = draft(vec![person_draft("Anna", "Mueller", Some(Role::Student))]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        assert!(matches!(outcome, RowOutcome::Done { .. }));
        assert_eq!(policy.duplicate_prompts, 1, "duplicate warning expected");
    }

    #[test]
    fn thesis_commit_failure_names_orphaned_creations() {
        let cache_seed = ReferenceCache::default();
        let mut cache = ReferenceCache::default();
        let mut policy = AutoPolicy;
        let mut sink = FailingThesisSink {
            inner: ShadowSink::seeded(&cache_seed),
        };
        let draft = draft(vec![person_draft("Anna", "Mueller", Some(Role::Student))]);
        let outcome = resolve_row(&draft, &mut cache, &mut policy, &mut sink, &options()).unwrap();
        match outcome {
            RowOutcome::Failed { message } => {
                assert!(message.contains("thesis commit failed"));
                assert!(message.contains("500"));
                assert!(message.contains("orphaned"));
                assert!(message.contains("#1"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // the person exists remotely, so the cache keeps it
        assert_eq!(cache.people().len(), 1);
    }

    #[test]
    fn created_people_get_placeholder_emails() {
        let request = new_person_request(&person_draft("Anna Maria", "Mueller", None));
        assert_eq!(request.email, "anna.maria.mueller@example.com");
        let supervisor = new_person_request(&person_draft("Jan", "Weber", Some(Role::Supervisor)));
        assert_eq!(supervisor.comments.as_deref(), Some("Role: supervisor"));
    }
}
