mod cache;
mod duplicate;
mod matcher;
mod record;
mod similarity;

pub use cache::ReferenceCache;
pub use duplicate::{find_similar_theses, DuplicateHit, DEFAULT_TITLE_THRESHOLD};
pub use matcher::{find_person_matches, MatchBasis, MatchCandidate, DEFAULT_MATCH_THRESHOLD};
pub use record::{
    parse_flex_date, sanitize_email, Person, PersonDraft, Phase, ThesisDraft, ThesisPlan,
    ThesisSummary, ThesisType, Role,
};
pub use similarity::{normalize_name, similarity};
