use crate::walker::{SessionOutcome, SessionReport};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub rotations: u32,
    pub sessions: u32,
    pub sessions_quota_met: u32,
    pub sessions_stagnant: u32,
    pub sessions_nav_failed: u32,
    pub context_failures: u32,
    pub links_visited: u32,
    pub visit_failures: u32,
    pub candidates_discarded: u32,
    pub duplicates: u32,
    pub keyword_misses: u32,
    pub accepted: u32,
    pub shards_written: u32,
    pub halted_without_progress: bool,
}

impl RunStats {
    pub fn record_session(&mut self, report: &SessionReport) {
        self.sessions += 1;
        match report.outcome {
            SessionOutcome::QuotaMet => self.sessions_quota_met += 1,
            SessionOutcome::Stagnant => self.sessions_stagnant += 1,
            SessionOutcome::NavFailed => self.sessions_nav_failed += 1,
        }
        self.links_visited += report.links_visited;
        self.visit_failures += report.visit_failures;
        self.candidates_discarded += report.discarded;
        self.duplicates += report.duplicates;
        self.keyword_misses += report.keyword_misses;
        self.accepted += report.accepted;
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Crawl Complete ===")?;
        writeln!(f, "Rotations:          {}", self.rotations)?;
        writeln!(f, "Sessions:           {}", self.sessions)?;
        writeln!(f, "  quota met:        {}", self.sessions_quota_met)?;
        writeln!(f, "  stagnant:         {}", self.sessions_stagnant)?;
        writeln!(f, "  nav failed:       {}", self.sessions_nav_failed)?;
        writeln!(f, "  no context:       {}", self.context_failures)?;
        writeln!(f, "Links visited:      {}", self.links_visited)?;
        writeln!(f, "Visit failures:     {}", self.visit_failures)?;
        writeln!(f, "Discarded:          {} (missing fields)", self.candidates_discarded)?;
        writeln!(f, "Duplicates:         {}", self.duplicates)?;
        writeln!(f, "Keyword misses:     {}", self.keyword_misses)?;
        writeln!(f, "Accepted:           {}", self.accepted)?;
        writeln!(f, "Shards written:     {}", self.shards_written)?;
        if self.halted_without_progress {
            writeln!(f, "\nStopped: a full rotation produced no new posts")?;
        }
        Ok(())
    }
}
