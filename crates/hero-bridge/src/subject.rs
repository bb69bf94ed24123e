/// What an inbound subject carries, decided by its dot-separated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    /// Agent announcements, e.g. `chimera.v1.dev.hero.agents.embedder`.
    Agent,
    /// Task submissions and completions, e.g. `chi.v1.dev.hero.tasks.new`.
    Task,
    /// Liveness reports, e.g. `hero.v1.dev.ops.status.embedder`.
    Status,
}

/// A subject split into the parts the bridge cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject<'a> {
    /// The subject as received.
    pub raw: &'a str,
    /// First token; used as framework tag and task source.
    pub source: &'a str,
    /// Classified kind; `None` when nothing matched.
    pub kind: Option<SubjectKind>,
}

impl<'a> Subject<'a> {
    /// Classify a subject. `agents` wins over `tasks`, which wins over `status`.
    pub fn parse(raw: &'a str) -> Self {
        let tokens: Vec<&str> = raw.split('.').collect();
        let has = |token: &str| tokens.iter().any(|t| *t == token);

        let kind = if has("agents") {
            Some(SubjectKind::Agent)
        } else if has("tasks") {
            Some(SubjectKind::Task)
        } else if has("status") {
            Some(SubjectKind::Status)
        } else {
            None
        };

        Self {
            raw,
            source: tokens.first().copied().unwrap_or_default(),
            kind,
        }
    }
}
