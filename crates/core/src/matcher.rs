use std::cmp::Ordering;
use std::fmt;

use crate::record::{Person, PersonDraft};
use crate::similarity::similarity;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBasis {
    ExactId,
    ExactEmail,
    FuzzyName,
}

impl fmt::Display for MatchBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchBasis::ExactId => "exact-id",
            MatchBasis::ExactEmail => "exact-email",
            MatchBasis::FuzzyName => "fuzzy-name",
        };
        f.write_str(label)
    }
}

/// A scored potential correspondence between a draft group and a known
/// person. Produced fresh per call, never stored.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub person: Person,
    pub score: f64,
    pub basis: MatchBasis,
}

/// Rank the known people against one participant group.
///
/// An exact email match (case-insensitive) is definitive and returns alone;
/// an exact external-id match is next. Otherwise the average of first- and
/// last-name similarity must clear `threshold`. Output is ordered by score
/// descending with ties broken by ascending person id, so results are
/// stable across runs.
pub fn find_person_matches(
    draft: &PersonDraft,
    people: &[Person],
    threshold: f64,
) -> Vec<MatchCandidate> {
    if let Some(email) = draft.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        let needle = email.to_lowercase();
        if let Some(person) = people.iter().find(|p| {
            p.email
                .as_deref()
                .map(|e| e.trim().to_lowercase() == needle)
                .unwrap_or(false)
        }) {
            return vec![MatchCandidate {
                person: person.clone(),
                score: 1.0,
                basis: MatchBasis::ExactEmail,
            }];
        }
    }
    if let Some(ext) = draft
        .external_id
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        if let Some(person) = people.iter().find(|p| {
            p.external_id
                .as_deref()
                .map(|candidate| candidate.trim().eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        }) {
            return vec![MatchCandidate {
                person: person.clone(),
                score: 1.0,
                basis: MatchBasis::ExactId,
            }];
        }
    }
    let mut matches: Vec<MatchCandidate> = people
        .iter()
        .filter_map(|person| {
            let first = similarity(&draft.first_name, &person.first_name);
            let last = similarity(&draft.last_name, &person.last_name);
            let score = (first + last) / 2.0;
            if score >= threshold {
                Some(MatchCandidate {
                    person: person.clone(),
                    score,
                    basis: MatchBasis::FuzzyName,
                })
            } else {
                None
            }
        })
        .collect();
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.person.id.cmp(&b.person.id))
    });
    tracing::debug!(
        group = %draft,
        candidates = matches.len(),
        "fuzzy name matching complete"
    );
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: i64, first: &str, last: &str, email: Option<&str>, ext: Option<&str>) -> Person {
        Person {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.map(str::to_string),
            external_id: ext.map(str::to_string),
        }
    }

    fn draft(first: &str, last: &str, email: Option<&str>, ext: Option<&str>) -> PersonDraft {
        PersonDraft {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.map(str::to_string),
            external_id: ext.map(str::to_string),
            role: None,
        }
    }

    #[test]
    fn exact_email_wins_over_dissimilar_names() {
        let people = vec![
            person(1, "Totally", "Different", Some("a.mueller@uni.de"), None),
            person(2, "Anna", "Mueller", None, None),
        ];
        let matches = find_person_matches(
            &draft("Anna", "Mueller", Some("A.Mueller@Uni.DE"), None),
            &people,
            DEFAULT_MATCH_THRESHOLD,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].person.id, 1);
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[0].basis, MatchBasis::ExactEmail);
    }

    #[test]
    fn external_id_short_circuits_when_no_email_matches() {
        let people = vec![person(7, "Old", "Name", None, Some("s1234567"))];
        let matches = find_person_matches(
            &draft("New", "Name", Some("new@uni.de"), Some("S1234567")),
            &people,
            DEFAULT_MATCH_THRESHOLD,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].basis, MatchBasis::ExactId);
    }

    #[test]
    fn fuzzy_matching_filters_and_sorts() {
        let people = vec![
            person(3, "Anna", "Mueller", None, None),
            person(1, "Anne", "Mueller", None, None),
            person(2, "Bernd", "Zimmer", None, None),
        ];
        let matches =
            find_person_matches(&draft("Anna", "Müller", None, None), &people, 0.8);
        assert_eq!(matches.len(), 2);
        // id 3 is the perfect umlaut match, id 1 follows
        assert_eq!(matches[0].person.id, 3);
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[0].basis, MatchBasis::FuzzyName);
        assert_eq!(matches[1].person.id, 1);
        assert!(matches[1].score < 1.0);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let people = vec![
            person(9, "Anna", "Mueller", None, None),
            person(4, "Anna", "Mueller", None, None),
        ];
        let matches =
            find_person_matches(&draft("Anna", "Mueller", None, None), &people, 0.8);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].person.id, 4);
        assert_eq!(matches[1].person.id, 9);
    }

    #[test]
    fn empty_reference_set_yields_empty_list() {
        let matches = find_person_matches(
            &draft("Anna", "Mueller", None, None),
            &[],
            DEFAULT_MATCH_THRESHOLD,
        );
        assert!(matches.is_empty());
    }
}
