use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use csv2thesis_core::{DuplicateHit, MatchCandidate, Person, PersonDraft, ThesisPlan};

use crate::config::AUTO_ACCEPT_THRESHOLD;
use crate::logging;

const MAX_CHOICES: usize = 5;

#[derive(Debug, Clone)]
pub enum MatchDecision {
    UseExisting(Person),
    CreateNew,
    Skip,
}

/// Resolves the points where the import needs a judgement call: ambiguous
/// person matches, duplicate warnings, and the final commit. Interactive
/// and automatic implementations are interchangeable, and a scripted one
/// stands in for both under test.
pub trait DecisionPolicy {
    fn choose_match(
        &mut self,
        draft: &PersonDraft,
        candidates: &[MatchCandidate],
    ) -> Result<MatchDecision>;
    fn confirm_duplicate(&mut self, plan: &ThesisPlan, hits: &[DuplicateHit]) -> Result<bool>;
    fn confirm_commit(&mut self, plan: &ThesisPlan) -> Result<bool>;
}

/// Headless policy: a confident top match is reused, anything ambiguous
/// creates a new entity instead of guessing, duplicates warn and continue.
pub struct AutoPolicy;

impl DecisionPolicy for AutoPolicy {
    fn choose_match(
        &mut self,
        draft: &PersonDraft,
        candidates: &[MatchCandidate],
    ) -> Result<MatchDecision> {
        match candidates.first() {
            Some(top) if top.score >= AUTO_ACCEPT_THRESHOLD => {
                logging::stage(
                    "match",
                    format!(
                        "auto-accepted #{} for {draft} ({})",
                        top.person.id,
                        format_candidate(top)
                    ),
                );
                Ok(MatchDecision::UseExisting(top.person.clone()))
            }
            Some(top) => {
                logging::stage(
                    "match",
                    format!(
                        "best match for {draft} is only {:.0}%, creating new",
                        top.score * 100.0
                    ),
                );
                Ok(MatchDecision::CreateNew)
            }
            None => {
                logging::stage("match", format!("no match for {draft}, creating new"));
                Ok(MatchDecision::CreateNew)
            }
        }
    }

    fn confirm_duplicate(&mut self, _plan: &ThesisPlan, hits: &[DuplicateHit]) -> Result<bool> {
        logging::stage(
            "duplicates",
            format!("{} similar thesis(es) found, continuing anyway", hits.len()),
        );
        for hit in hits.iter().take(MAX_CHOICES) {
            logging::stage("duplicates", format_hit(hit));
        }
        Ok(true)
    }

    fn confirm_commit(&mut self, _plan: &ThesisPlan) -> Result<bool> {
        Ok(true)
    }
}

/// Blocking prompts on the operator's terminal. Generic over the streams so
/// tests can script answers.
pub struct InteractivePolicy<R, W> {
    input: R,
    output: W,
}

impl InteractivePolicy<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> InteractivePolicy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt_yes_no(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "{question} [{hint}]: ").context("failed to write prompt")?;
            self.output.flush().context("failed to flush prompt")?;
            let mut line = String::new();
            if self
                .input
                .read_line(&mut line)
                .context("failed to read answer")?
                == 0
            {
                return Ok(default);
            }
            match line.trim().to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer 'y' or 'n'")?,
            }
        }
    }

    fn prompt_pick(&mut self, count: usize) -> Result<PickAnswer> {
        loop {
            write!(self.output, "Choose [1-{count}, 0 = create new, s = skip]: ")
                .context("failed to write prompt")?;
            self.output.flush().context("failed to flush prompt")?;
            let mut line = String::new();
            if self
                .input
                .read_line(&mut line)
                .context("failed to read answer")?
                == 0
            {
                return Ok(PickAnswer::CreateNew);
            }
            let answer = line.trim().to_lowercase();
            if answer == "s" || answer == "skip" {
                return Ok(PickAnswer::Skip);
            }
            match answer.parse::<usize>() {
                Ok(0) => return Ok(PickAnswer::CreateNew),
                Ok(n) if n <= count => return Ok(PickAnswer::Choice(n - 1)),
                _ => writeln!(self.output, "Please enter a number between 0 and {count}")?,
            }
        }
    }
}

enum PickAnswer {
    Choice(usize),
    CreateNew,
    Skip,
}

impl<R: BufRead, W: Write> DecisionPolicy for InteractivePolicy<R, W> {
    fn choose_match(
        &mut self,
        draft: &PersonDraft,
        candidates: &[MatchCandidate],
    ) -> Result<MatchDecision> {
        writeln!(self.output)?;
        writeln!(self.output, "Resolving {draft}")?;
        if candidates.is_empty() {
            return if self.prompt_yes_no("No match found. Create a new person?", true)? {
                Ok(MatchDecision::CreateNew)
            } else {
                Ok(MatchDecision::Skip)
            };
        }
        let top = &candidates[0];
        let mut pool = candidates;
        if top.score >= AUTO_ACCEPT_THRESHOLD {
            writeln!(self.output, "Found match: {}", format_candidate(top))?;
            if self.prompt_yes_no("Use this match?", true)? {
                return Ok(MatchDecision::UseExisting(top.person.clone()));
            }
            pool = &candidates[1..];
            if pool.is_empty() {
                return if self.prompt_yes_no("Create a new person?", true)? {
                    Ok(MatchDecision::CreateNew)
                } else {
                    Ok(MatchDecision::Skip)
                };
            }
        }
        writeln!(self.output, "Similar people found:")?;
        let shown = pool.len().min(MAX_CHOICES);
        for (i, candidate) in pool.iter().take(shown).enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, format_candidate(candidate))?;
        }
        writeln!(self.output, "  0. Create new")?;
        writeln!(self.output, "  s. Skip this person")?;
        match self.prompt_pick(shown)? {
            PickAnswer::Choice(i) => Ok(MatchDecision::UseExisting(pool[i].person.clone())),
            PickAnswer::CreateNew => Ok(MatchDecision::CreateNew),
            PickAnswer::Skip => Ok(MatchDecision::Skip),
        }
    }

    fn confirm_duplicate(&mut self, _plan: &ThesisPlan, hits: &[DuplicateHit]) -> Result<bool> {
        writeln!(self.output)?;
        writeln!(self.output, "Similar theses already exist:")?;
        for hit in hits.iter().take(MAX_CHOICES) {
            writeln!(self.output, "  {}", format_hit(hit))?;
        }
        self.prompt_yes_no("This might be a duplicate. Continue anyway?", false)
    }

    fn confirm_commit(&mut self, plan: &ThesisPlan) -> Result<bool> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Ready to create [{}] {}",
            plan.thesis_type.as_str(),
            plan.title.as_deref().unwrap_or("Untitled")
        )?;
        writeln!(self.output, "  Students: {:?}", plan.student_ids)?;
        writeln!(self.output, "  Supervisors: {:?}", plan.supervisor_ids)?;
        writeln!(self.output, "  Phase: {}", plan.phase.as_str())?;
        self.prompt_yes_no("Create this thesis?", true)
    }
}

pub fn format_candidate(candidate: &MatchCandidate) -> String {
    format!(
        "{} - {:.0}% match ({})",
        candidate.person,
        candidate.score * 100.0,
        candidate.basis
    )
}

pub fn format_hit(hit: &DuplicateHit) -> String {
    format!(
        "[{}] {} ({})",
        hit.thesis.thesis_type.as_str(),
        hit.thesis.title.as_deref().unwrap_or("Untitled"),
        hit.reason
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted policy for resolver and batch tests. Empty queues fall back
    /// to the automatic defaults.
    #[derive(Default)]
    pub struct ScriptedPolicy {
        pub decisions: VecDeque<MatchDecision>,
        pub duplicate_answers: VecDeque<bool>,
        pub commit_answers: VecDeque<bool>,
        pub duplicate_prompts: usize,
    }

    impl DecisionPolicy for ScriptedPolicy {
        fn choose_match(
            &mut self,
            _draft: &PersonDraft,
            candidates: &[MatchCandidate],
        ) -> Result<MatchDecision> {
            if let Some(decision) = self.decisions.pop_front() {
                return Ok(decision);
            }
            AutoPolicy.choose_match(_draft, candidates)
        }

        fn confirm_duplicate(
            &mut self,
            _plan: &ThesisPlan,
            _hits: &[DuplicateHit],
        ) -> Result<bool> {
            self.duplicate_prompts += 1;
            Ok(self.duplicate_answers.pop_front().unwrap_or(true))
        }

        fn confirm_commit(&mut self, _plan: &ThesisPlan) -> Result<bool> {
            Ok(self.commit_answers.pop_front().unwrap_or(true))
        }
    }
}
