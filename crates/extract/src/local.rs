//! Deterministic row extraction for offline runs and tests.
//!
//! Maps columns onto draft fields by header keyword (German and English),
//! the same understanding the model prompt encodes. No network, no key.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use csv2thesis_core::{
    parse_flex_date, PersonDraft, Phase, Role, ThesisDraft, ThesisType,
};

use crate::ExtractError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
});

static TITLE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:prof|dr|dipl|ing|med|habil)\.?(?:-(?:ing|inf))?\.?\s+)+")
        .expect("academic title pattern")
});

const SUPERVISOR_KEYWORDS: &[&str] = &[
    "betreuer",
    "gutachter",
    "supervisor",
    "advisor",
    "prüfer",
    "pruefer",
    "reviewer",
];

pub(crate) fn extract(
    row: &BTreeMap<String, String>,
    row_index: usize,
) -> Result<ThesisDraft, ExtractError> {
    let mut warnings = Vec::new();

    let (first_name, last_name) = student_name(row).ok_or_else(|| ExtractError::RowUnusable {
        row: row_index,
        message: "student name missing".to_string(),
    })?;

    let student_email = find_value(row, &["mail"], Some(SUPERVISOR_KEYWORDS))
        .and_then(|value| EMAIL_RE.find(&value).map(|m| m.as_str().to_string()));
    let external_id = find_value(row, &["matrikel", "matr", "student_id", "studentid"], None);

    let mut people = vec![PersonDraft {
        first_name,
        last_name,
        email: student_email,
        external_id,
        role: Some(Role::Student),
    }];
    people.extend(supervisors(row));

    let thesis_type = match find_value(row, &["typ", "type", "art", "abschluss", "degree"], None) {
        Some(label) => ThesisType::from_label(&label),
        None => {
            warnings.push("thesis type not found, assuming other".to_string());
            ThesisType::Other
        }
    };

    let title = find_value(row, &["titel", "title", "thema", "topic"], None);

    let date_first_contact = date_value(row, &["kontakt", "contact"], &mut warnings);
    let date_registration = date_value(row, &["anmeld", "registr"], &mut warnings);
    let date_deadline = date_value(row, &["abgabe", "deadline", "submission"], &mut warnings);
    let date_presentation =
        date_value(row, &["vortrag", "kolloquium", "present", "defense"], &mut warnings);

    // "Note" is the German grade column; "Notes" is free text. Only the
    // exact header means a grade.
    let grade = find_value(row, &["grade", "zensur"], None).or_else(|| {
        row.iter()
            .find(|(header, value)| header.trim().to_lowercase() == "note" && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
    });
    let phase = if grade.is_some() {
        Phase::Completed
    } else if date_deadline.is_some() {
        Phase::Submitted
    } else {
        find_value(row, &["phase", "status"], None)
            .map(|label| Phase::from_label(&label))
            .unwrap_or_default()
    };

    let mut note_lines = Vec::new();
    if let Some(program) = find_value(row, &["studiengang", "program"], None) {
        note_lines.push(format!("Degree program: {program}"));
    }
    if let Some(grade) = grade {
        note_lines.push(format!("Grade: {grade}"));
    }
    if let Some(remark) = find_value(row, &["bemerkung", "kommentar", "comment", "notes"], None) {
        note_lines.push(remark);
    }

    Ok(ThesisDraft {
        thesis_type,
        title,
        people,
        phase,
        date_first_contact,
        date_registration,
        date_deadline,
        date_presentation,
        note: if note_lines.is_empty() {
            None
        } else {
            Some(note_lines.join("\n"))
        },
        warnings,
        row_index,
    })
}

fn student_name(row: &BTreeMap<String, String>) -> Option<(String, String)> {
    let first = find_value(row, &["vorname", "first"], Some(SUPERVISOR_KEYWORDS));
    let last = find_value(
        row,
        &["nachname", "surname", "last", "familienname"],
        Some(SUPERVISOR_KEYWORDS),
    );
    if let (Some(first), Some(last)) = (first, last) {
        return Some((first, last));
    }
    let full = find_value(row, &["student", "kandidat", "name"], Some(SUPERVISOR_KEYWORDS))?;
    split_name(&full)
}

/// Split "Last, First" or "First [Middle] Last" into a name pair, with
/// academic titles stripped first.
fn split_name(raw: &str) -> Option<(String, String)> {
    let cleaned = TITLE_PREFIX_RE.replace(raw.trim(), "").to_string();
    if let Some((last, first)) = cleaned.split_once(',') {
        let first = first.trim();
        let last = last.trim();
        if !first.is_empty() && !last.is_empty() {
            return Some((first.to_string(), last.to_string()));
        }
    }
    let (first, last) = cleaned.rsplit_once(' ')?;
    let first = first.trim();
    let last = last.trim();
    (!first.is_empty() && !last.is_empty()).then(|| (first.to_string(), last.to_string()))
}

fn supervisors(row: &BTreeMap<String, String>) -> Vec<PersonDraft> {
    let mut found = Vec::new();
    for (header, value) in row {
        let header_lower = header.to_lowercase();
        if !SUPERVISOR_KEYWORDS.iter().any(|kw| header_lower.contains(kw)) {
            continue;
        }
        let role = Role::from_label(&header_lower).unwrap_or(Role::Supervisor);
        for part in value.split([';', '/', '&']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let email = EMAIL_RE.find(part).map(|m| m.as_str().to_string());
            let name_part = EMAIL_RE.replace_all(part, "");
            let name_part = name_part.trim_matches(|c: char| {
                c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>' | ',')
            });
            if let Some((first, last)) = split_name(name_part) {
                found.push(PersonDraft {
                    first_name: first,
                    last_name: last,
                    email,
                    external_id: None,
                    role: Some(role),
                });
            }
        }
    }
    found
}

/// First column whose header contains one of `keywords` (and none of
/// `exclude`) with a non-empty value. BTreeMap iteration keeps the pick
/// deterministic.
fn find_value(
    row: &BTreeMap<String, String>,
    keywords: &[&str],
    exclude: Option<&[&str]>,
) -> Option<String> {
    for (header, value) in row {
        let header_lower = header.to_lowercase();
        if !keywords.iter().any(|kw| header_lower.contains(kw)) {
            continue;
        }
        if let Some(excluded) = exclude {
            if excluded.iter().any(|kw| header_lower.contains(kw)) {
                continue;
            }
        }
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn date_value(
    row: &BTreeMap<String, String>,
    keywords: &[&str],
    warnings: &mut Vec<String>,
) -> Option<chrono::NaiveDate> {
    let raw = find_value(row, keywords, None)?;
    let parsed = parse_flex_date(&raw);
    if parsed.is_none() {
        warnings.push(format!("could not parse date: {raw}"));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extracts_a_full_german_row() {
        let row = row(&[
            ("Name", "Müller, Anna"),
            ("Matrikelnummer", "1234567"),
            ("E-Mail", "anna.mueller@uni.de"),
            ("Art", "Bachelorarbeit"),
            ("Thema", "Graphpartitionierung"),
            ("Betreuer", "Prof. Dr. Jan Weber"),
            ("Abgabe", "15.09.2024"),
            ("Note", "1.3"),
        ]);
        let draft = extract(&row, 2).unwrap();
        assert_eq!(draft.thesis_type, ThesisType::Bachelor);
        assert_eq!(draft.title.as_deref(), Some("Graphpartitionierung"));
        let student = draft.students().next().unwrap();
        assert_eq!(student.first_name, "Anna");
        assert_eq!(student.last_name, "Müller");
        assert_eq!(student.email.as_deref(), Some("anna.mueller@uni.de"));
        assert_eq!(student.external_id.as_deref(), Some("1234567"));
        let supervisor = draft.supervisors().next().unwrap();
        assert_eq!(supervisor.first_name, "Jan");
        assert_eq!(supervisor.last_name, "Weber");
        assert!(draft.date_deadline.is_some());
        // grade present, so the thesis is treated as finished
        assert_eq!(draft.phase, Phase::Completed);
        assert!(draft.note.as_deref().unwrap().contains("Grade: 1.3"));
    }

    #[test]
    fn separate_name_columns_win() {
        let row = row(&[
            ("Vorname", "Anna"),
            ("Nachname", "Mueller"),
            ("Typ", "MSc"),
        ]);
        let draft = extract(&row, 3).unwrap();
        let student = draft.students().next().unwrap();
        assert_eq!(student.first_name, "Anna");
        assert_eq!(student.last_name, "Mueller");
        assert_eq!(draft.thesis_type, ThesisType::Master);
    }

    #[test]
    fn missing_student_name_is_unusable() {
        let row = row(&[("Typ", "Bachelor"), ("Thema", "Something")]);
        let err = extract(&row, 9).unwrap_err();
        assert!(matches!(err, ExtractError::RowUnusable { row: 9, .. }));
    }

    #[test]
    fn multiple_supervisors_split_on_separators() {
        let row = row(&[
            ("Student", "Eva Kurz"),
            ("Betreuer", "Prof. Anna Weber / Dr. Max Brandt (m.brandt@uni.de)"),
        ]);
        let draft = extract(&row, 4).unwrap();
        let supervisors: Vec<_> = draft.supervisors().collect();
        assert_eq!(supervisors.len(), 2);
        assert_eq!(supervisors[0].last_name, "Weber");
        assert_eq!(supervisors[1].email.as_deref(), Some("m.brandt@uni.de"));
    }

    #[test]
    fn unknown_type_yields_other_with_warning() {
        let row = row(&[("Student", "Eva Kurz")]);
        let draft = extract(&row, 5).unwrap();
        assert_eq!(draft.thesis_type, ThesisType::Other);
        assert!(draft.warnings.iter().any(|w| w.contains("thesis type")));
    }

    #[test]
    fn deadline_without_grade_implies_submitted() {
        let row = row(&[("Student", "Eva Kurz"), ("Abgabedatum", "2024-03-01")]);
        let draft = extract(&row, 6).unwrap();
        assert_eq!(draft.phase, Phase::Submitted);
    }

    #[test]
    fn split_name_handles_comma_and_titles() {
        assert_eq!(
            split_name("Prof. Dr. Jan Weber"),
            Some(("Jan".to_string(), "Weber".to_string()))
        );
        assert_eq!(
            split_name("Weber, Jan"),
            Some(("Jan".to_string(), "Weber".to_string()))
        );
        assert_eq!(split_name("Cher"), None);
    }
}
