use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThesisType {
    Bachelor,
    Master,
    Project,
    Other,
}

impl ThesisType {
    /// Parse a free-text type label. Unknown labels collapse to `Other`
    /// rather than failing, since import data never agrees on spelling.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "b" | "ba" | "bsc" | "bachelor" | "bachelorarbeit" => ThesisType::Bachelor,
            "m" | "ma" | "msc" | "master" | "masterarbeit" => ThesisType::Master,
            "p" | "proj" | "project" | "projektarbeit" => ThesisType::Project,
            _ => ThesisType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThesisType::Bachelor => "bachelor",
            ThesisType::Master => "master",
            ThesisType::Project => "project",
            ThesisType::Other => "other",
        }
    }

    /// Roles that must end up with at least one resolved participant
    /// before a thesis of this type may be committed.
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            ThesisType::Bachelor | ThesisType::Master | ThesisType::Project | ThesisType::Other => {
                &[Role::Student]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Supervisor,
}

impl Role {
    pub fn from_label(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if ["student", "kandidat", "candidate", "author"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            return Some(Role::Student);
        }
        if [
            "supervisor",
            "betreuer",
            "gutachter",
            "advisor",
            "reviewer",
            "prüfer",
            "pruefer",
        ]
        .iter()
        .any(|kw| lower.contains(kw))
        {
            return Some(Role::Supervisor);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Supervisor => "supervisor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    FirstContact,
    TopicDiscussion,
    LiteratureResearch,
    Registered,
    Working,
    Submitted,
    Defended,
    Reviewed,
    Completed,
    Abandoned,
}

impl Phase {
    /// Map free text onto a phase. Exact snake_case labels win; otherwise
    /// keyword inference handles the German and English shorthand that
    /// shows up in handcrafted spreadsheets.
    pub fn from_label(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "first_contact" => return Phase::FirstContact,
            "topic_discussion" => return Phase::TopicDiscussion,
            "literature_research" => return Phase::LiteratureResearch,
            "registered" => return Phase::Registered,
            "working" => return Phase::Working,
            "submitted" => return Phase::Submitted,
            "defended" => return Phase::Defended,
            "reviewed" => return Phase::Reviewed,
            "completed" => return Phase::Completed,
            "abandoned" => return Phase::Abandoned,
            _ => {}
        }
        let contains = |kws: &[&str]| kws.iter().any(|kw| lower.contains(kw));
        if contains(&["abandon", "abbruch", "cancel"]) {
            Phase::Abandoned
        } else if contains(&["complete", "done", "fertig", "finished"]) {
            Phase::Completed
        } else if contains(&["review", "begutacht", "graded"]) {
            Phase::Reviewed
        } else if contains(&["defend", "vortrag", "present", "kolloquium"]) {
            Phase::Defended
        } else if contains(&["submit", "abgegeben", "abgabe"]) {
            Phase::Submitted
        } else if contains(&["work", "writing", "arbeit"]) {
            Phase::Working
        } else if contains(&["register", "anmeld"]) {
            Phase::Registered
        } else if contains(&["research", "recherch", "literature"]) {
            Phase::LiteratureResearch
        } else if contains(&["topic", "thema"]) {
            Phase::TopicDiscussion
        } else {
            Phase::FirstContact
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::FirstContact => "first_contact",
            Phase::TopicDiscussion => "topic_discussion",
            Phase::LiteratureResearch => "literature_research",
            Phase::Registered => "registered",
            Phase::Working => "working",
            Phase::Submitted => "submitted",
            Phase::Defended => "defended",
            Phase::Reviewed => "reviewed",
            Phase::Completed => "completed",
            Phase::Abandoned => "abandoned",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::FirstContact
    }
}

/// One participant group extracted from a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub external_id: Option<String>,
    pub role: Option<Role>,
}

impl PersonDraft {
    pub fn role_or_student(&self) -> Role {
        self.role.unwrap_or(Role::Student)
    }
}

impl fmt::Display for PersonDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)?;
        if let Some(email) = &self.email {
            write!(f, " ({email})")?;
        }
        if let Some(ext) = &self.external_id {
            write!(f, " [ID: {ext}]")?;
        }
        Ok(())
    }
}

/// A fully extracted source row, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThesisDraft {
    pub thesis_type: ThesisType,
    pub title: Option<String>,
    pub people: Vec<PersonDraft>,
    pub phase: Phase,
    pub date_first_contact: Option<NaiveDate>,
    pub date_registration: Option<NaiveDate>,
    pub date_deadline: Option<NaiveDate>,
    pub date_presentation: Option<NaiveDate>,
    pub note: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub row_index: usize,
}

impl ThesisDraft {
    pub fn students(&self) -> impl Iterator<Item = &PersonDraft> {
        self.people
            .iter()
            .filter(|p| p.role_or_student() == Role::Student)
    }

    pub fn supervisors(&self) -> impl Iterator<Item = &PersonDraft> {
        self.people
            .iter()
            .filter(|p| p.role_or_student() == Role::Supervisor)
    }
}

impl fmt::Display for ThesisDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{}] {}",
            self.thesis_type.as_str(),
            self.title.as_deref().unwrap_or("Untitled")
        )?;
        for person in self.students() {
            writeln!(f, "  Student: {person}")?;
        }
        let supervisors: Vec<String> = self.supervisors().map(|p| p.to_string()).collect();
        if supervisors.is_empty() {
            writeln!(f, "  Supervisors: none")?;
        } else {
            writeln!(f, "  Supervisors: {}", supervisors.join(", "))?;
        }
        write!(f, "  Phase: {}", self.phase.as_str())?;
        let mut dates = Vec::new();
        if let Some(d) = self.date_first_contact {
            dates.push(format!("first contact {d}"));
        }
        if let Some(d) = self.date_registration {
            dates.push(format!("registration {d}"));
        }
        if let Some(d) = self.date_deadline {
            dates.push(format!("deadline {d}"));
        }
        if let Some(d) = self.date_presentation {
            dates.push(format!("presentation {d}"));
        }
        if !dates.is_empty() {
            write!(f, "\n  Dates: {}", dates.join(", "))?;
        }
        if !self.warnings.is_empty() {
            write!(f, "\n  Warnings: {}", self.warnings.join("; "))?;
        }
        Ok(())
    }
}

/// A person already known to the Thesis Manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "student_id")]
    pub external_id: Option<String>,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)?;
        if let Some(email) = &self.email {
            write!(f, " ({email})")?;
        }
        if let Some(ext) = &self.external_id {
            write!(f, " [ID: {ext}]")?;
        }
        Ok(())
    }
}

/// A thesis already known to the Thesis Manager, trimmed to the fields
/// duplicate detection needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThesisSummary {
    pub id: i64,
    pub thesis_type: ThesisType,
    pub title: Option<String>,
    pub student_ids: Vec<i64>,
}

/// The resolved form of one draft, ready to commit.
#[derive(Debug, Clone, Serialize)]
pub struct ThesisPlan {
    pub thesis_type: ThesisType,
    pub title: Option<String>,
    pub student_ids: Vec<i64>,
    pub supervisor_ids: Vec<i64>,
    pub phase: Phase,
    pub date_first_contact: Option<NaiveDate>,
    pub date_registration: Option<NaiveDate>,
    pub date_deadline: Option<NaiveDate>,
    pub date_presentation: Option<NaiveDate>,
    pub note: Option<String>,
}

impl ThesisPlan {
    pub fn from_draft(draft: &ThesisDraft, student_ids: Vec<i64>, supervisor_ids: Vec<i64>) -> Self {
        Self {
            thesis_type: draft.thesis_type,
            title: draft.title.clone(),
            student_ids,
            supervisor_ids,
            phase: draft.phase,
            date_first_contact: draft.date_first_contact,
            date_registration: draft.date_registration,
            date_deadline: draft.date_deadline,
            date_presentation: draft.date_presentation,
            note: draft.note.clone(),
        }
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d.%m.%Y", "%d.%m.%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%d-%m-%Y", "%d-%m-%y",
];

/// Parse the date formats that show up in handcrafted spreadsheets.
pub fn parse_flex_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Drop email values that cannot possibly be addresses.
pub fn sanitize_email(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| value.contains('@'))
}
