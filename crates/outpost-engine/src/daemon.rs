//! The posting daemon's per-run pipeline.
//!
//! Stages run in a fixed order (discover, react, community-watch,
//! reciprocate, proactive, daily report) and every one of them degrades to a
//! logged no-op when its collaborator is missing or fails. The run always
//! reaches finalize, where `DaemonState` is persisted unless it is a dry run.

use chrono::{DateTime, Utc};
use outpost_clients::{ComposeRequest, Collaborators, Draft, Opportunity, ScanRequest};
use outpost_core::{
    Clock, DailyReport, Drafting, FailureKind, LedgerRow, PublishEvent, RelationshipNote,
    RunFailure, TopicRotation, TopicSlot,
};
use outpost_ledger::Ledger;
use outpost_state::{DaemonState, RateDecision, RateLimiter, StateStore};
use uuid::Uuid;

use crate::settings::DaemonSettings;
use crate::EngineError;

const COMMUNITY_PLATFORM: &str = "moltbook";
const GITHUB_PLATFORM: &str = "github";
const AUDIENCE: &str = "AI agents and developers";
const NEWCOMER_AUDIENCE: &str = "newcomers arriving at the project discussions";
const REACTIVE_STRATEGY: &str = "REACTIVE";
const REPLY_TITLE_CHARS: usize = 60;
const PROACTIVE_TITLE_CHARS: usize = 80;
/// Proactive slots tried per unit of run budget before giving up.
const ATTEMPTS_PER_BUDGET: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonRunSummary {
    pub run_id: String,
    /// Opportunities that passed the score filter.
    pub opportunities: usize,
    /// Publishes counted against the run budget, dry-run drafts included.
    pub budget_used: u32,
    /// Post ids actually published this run.
    pub published: Vec<String>,
    pub proactive: u32,
    pub replies: usize,
    pub reciprocated: Vec<String>,
    /// First limiter denial of the run, if any.
    pub rate_limited: Option<String>,
    pub report_sent: bool,
    pub failures: Vec<RunFailure>,
}

/// Mutable state threaded through the stages of one run.
struct Run<'a> {
    id: String,
    clock: &'a dyn Clock,
    state: DaemonState,
    summary: DaemonRunSummary,
}

impl Run<'_> {
    fn fail(&mut self, failure: RunFailure) {
        self.summary.failures.push(failure);
    }
}

enum PublishOutcome {
    Published,
    DryRun,
    Failed,
}

/// Hours since the Unix epoch; keys the proactive rotation.
fn epoch_hour(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp().div_euclid(3600)).unwrap_or(0)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Title for a reply to `original`, without stacking `Re:` prefixes.
fn reply_title(original: &str) -> String {
    if original.starts_with("Re:") {
        truncate_chars(original, 70)
    } else {
        format!("Re: {}", truncate_chars(original, REPLY_TITLE_CHARS))
    }
}

pub struct OpportunityPipeline {
    settings: DaemonSettings,
    limiter: RateLimiter,
    collaborators: Collaborators,
    ledger: Option<Ledger>,
    rotation: TopicRotation,
}

impl std::fmt::Debug for OpportunityPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpportunityPipeline")
            .field("settings", &self.settings)
            .field("limiter", &self.limiter)
            .field("collaborators", &self.collaborators)
            .field("ledger", &self.ledger.is_some())
            .field("rotation", &self.rotation.len())
            .finish()
    }
}

impl OpportunityPipeline {
    #[must_use]
    pub fn new(
        settings: DaemonSettings,
        limiter: RateLimiter,
        collaborators: Collaborators,
        ledger: Option<Ledger>,
        rotation: TopicRotation,
    ) -> Self {
        Self {
            settings,
            limiter,
            collaborators,
            ledger,
            rotation,
        }
    }

    /// Execute one scheduled pass.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::State`] if `DaemonState` cannot be loaded or saved.
    pub async fn run(
        &self,
        store: &dyn StateStore<DaemonState>,
        clock: &dyn Clock,
    ) -> Result<DaemonRunSummary, EngineError> {
        let id = Uuid::new_v4().to_string();
        let started = clock.now();
        let mut state = store.load()?;
        state.prune(started);

        tracing::info!(
            run_id = %id,
            dry_run = self.settings.dry_run,
            events_in_window = state.events.len(),
            budget = self.settings.max_posts_per_run,
            "daemon run starting"
        );

        let mut run = Run {
            summary: DaemonRunSummary {
                run_id: id.clone(),
                ..DaemonRunSummary::default()
            },
            id,
            clock,
            state,
        };

        let opportunities = self.discover(&mut run).await;
        self.react(&mut run, &opportunities).await;
        self.community_watch(&mut run).await;
        self.reciprocate(&mut run).await;
        self.proactive(&mut run).await;
        self.daily_report(&mut run).await;

        // Finalize
        run.state.last_run = Some(clock.now());
        if self.settings.dry_run {
            tracing::info!(run_id = %run.id, "dry run: daemon state not persisted");
        } else {
            store.save(&run.state)?;
        }

        let summary = run.summary;
        tracing::info!(
            run_id = %summary.run_id,
            budget_used = summary.budget_used,
            published = summary.published.len(),
            proactive = summary.proactive,
            replies = summary.replies,
            reciprocated = summary.reciprocated.len(),
            failures = summary.failures.len(),
            "daemon run complete"
        );
        Ok(summary)
    }

    fn budget_left(&self, run: &Run<'_>) -> bool {
        run.summary.budget_used < self.settings.max_posts_per_run
    }

    /// Ask the limiter; the first denial of the run is recorded.
    fn rate_allows(&self, run: &mut Run<'_>, stage: &str) -> bool {
        match self.limiter.can_publish(&run.state, run.clock.now()) {
            RateDecision::Allowed => true,
            RateDecision::Denied { reason } => {
                tracing::info!(run_id = %run.id, stage, reason = %reason, "rate limited");
                if run.summary.rate_limited.is_none() {
                    run.fail(RunFailure::new(FailureKind::RateLimited, stage, reason.clone()));
                    run.summary.rate_limited = Some(reason);
                }
                false
            }
        }
    }

    fn unavailable(run: &mut Run<'_>, stage: &str, collaborator: &str) {
        tracing::warn!(run_id = %run.id, stage, collaborator, "collaborator unavailable, skipping stage");
        run.fail(RunFailure::new(
            FailureKind::CollaboratorUnavailable,
            stage,
            format!("{collaborator} not configured"),
        ));
    }

    async fn discover(&self, run: &mut Run<'_>) -> Vec<Opportunity> {
        let Some(scanner) = self.collaborators.scanner.as_deref() else {
            Self::unavailable(run, "discover", "scanner");
            return Vec::new();
        };

        let request = ScanRequest {
            since: run.clock.now() - self.settings.scan_window,
            min_score: self.settings.min_score,
            limit: self.settings.scan_limit,
        };
        let mut found = match scanner.scan(&request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(run_id = %run.id, stage = "discover", error = %e, "scan failed");
                run.fail(RunFailure::new(
                    FailureKind::CollaboratorUnavailable,
                    "discover",
                    e.to_string(),
                ));
                return Vec::new();
            }
        };

        found.retain(|o| o.score >= self.settings.min_score);
        found.sort_by(|a, b| b.score.cmp(&a.score));
        run.summary.opportunities = found.len();
        tracing::info!(
            run_id = %run.id,
            stage = "discover",
            opportunities = found.len(),
            min_score = self.settings.min_score,
            "discovery complete"
        );
        found
    }

    async fn react(&self, run: &mut Run<'_>, opportunities: &[Opportunity]) {
        if opportunities.is_empty() {
            return;
        }
        let Some(composer) = self.collaborators.composer.as_deref() else {
            Self::unavailable(run, "react", "composer");
            return;
        };
        if !self.settings.dry_run && self.collaborators.publisher.is_none() {
            Self::unavailable(run, "react", "publisher");
            return;
        }

        for opp in opportunities {
            if !self.budget_left(run) || !self.rate_allows(run, "react") {
                break;
            }
            tracing::info!(
                run_id = %run.id,
                stage = "react",
                community = %opp.community,
                post_id = %opp.post_id,
                score = opp.score,
                author = %opp.author,
                "reacting to opportunity"
            );

            let request = ComposeRequest {
                goal: opp.angle.clone(),
                platform: COMMUNITY_PLATFORM.to_string(),
                audience: AUDIENCE.to_string(),
                context: Some(format!(
                    "Responding to: \"{}\" by {} in {}",
                    opp.title, opp.author, opp.community
                )),
                tone: None,
                max_words: self.settings.reply_max_words,
            };
            let draft = match composer.compose(&request).await {
                Ok(draft) => draft,
                Err(e) => {
                    tracing::warn!(run_id = %run.id, stage = "react", post_id = %opp.post_id, error = %e, "draft failed");
                    run.fail(
                        RunFailure::new(FailureKind::CollaboratorUnavailable, "react", e.to_string())
                            .for_post(&opp.post_id),
                    );
                    continue;
                }
            };

            let title = reply_title(&opp.title);
            let outcome = self
                .publish(run, "react", &opp.community, &title, &draft, REACTIVE_STRATEGY)
                .await;
            if matches!(outcome, PublishOutcome::Published) {
                let note = RelationshipNote {
                    at: run.clock.now(),
                    platform: COMMUNITY_PLATFORM.to_string(),
                    counterparty: opp.author.clone(),
                    note: format!(
                        "Responded to '{}' in {}",
                        truncate_chars(&opp.title, 50),
                        opp.community
                    ),
                    tags: vec!["community_engagement".to_string(), opp.community.clone()],
                };
                self.note_relationship(run, "react", &note).await;
            }
        }
    }

    /// Publish one draft and account for it. Dry runs count against the
    /// budget without touching the publisher, state or ledger.
    async fn publish(
        &self,
        run: &mut Run<'_>,
        stage: &str,
        community: &str,
        title: &str,
        draft: &Draft,
        strategy: &str,
    ) -> PublishOutcome {
        if self.settings.dry_run {
            tracing::info!(
                run_id = %run.id,
                stage,
                community,
                title,
                words = draft.word_count(),
                "dry run: would publish"
            );
            run.summary.budget_used += 1;
            return PublishOutcome::DryRun;
        }
        let Some(publisher) = self.collaborators.publisher.as_deref() else {
            Self::unavailable(run, stage, "publisher");
            return PublishOutcome::Failed;
        };

        let outcome = match publisher.publish(community, title, &draft.text).await {
            Ok(publication) => {
                let at = run.clock.now();
                run.state.record_publish(PublishEvent {
                    at,
                    community: community.to_string(),
                    post_id: publication.post_id.clone(),
                });
                run.summary.budget_used += 1;
                run.summary.published.push(publication.post_id.clone());
                tracing::info!(
                    run_id = %run.id,
                    stage,
                    community,
                    post_id = %publication.post_id,
                    verified = publication.verified,
                    "published"
                );

                let row = LedgerRow {
                    published_at: at,
                    community: community.to_string(),
                    title: title.to_string(),
                    post_id: publication.post_id.clone(),
                    strategy: strategy.to_string(),
                    model: draft.model.clone(),
                    word_count: draft.word_count(),
                    url: publication.url,
                };
                self.log_post(run, stage, &row).await;
                PublishOutcome::Published
            }
            Err(e) => {
                tracing::warn!(run_id = %run.id, stage, community, error = %e, "publish failed");
                run.fail(RunFailure::new(
                    FailureKind::CollaboratorUnavailable,
                    stage,
                    format!("publish to {community} failed: {e}"),
                ));
                PublishOutcome::Failed
            }
        };

        if self.budget_left(run) && !self.settings.publish_delay.is_zero() {
            tokio::time::sleep(self.settings.publish_delay).await;
        }
        outcome
    }

    async fn log_post(&self, run: &mut Run<'_>, stage: &str, row: &LedgerRow) {
        let Some(ledger) = &self.ledger else {
            tracing::warn!(run_id = %run.id, stage, post_id = %row.post_id, "no ledger configured, post not logged");
            return;
        };
        if let Err(e) = ledger.append_post(row).await {
            tracing::error!(run_id = %run.id, stage, post_id = %row.post_id, error = %e, "post log append failed");
            run.fail(
                RunFailure::new(FailureKind::PartialWriteFailure, stage, e.to_string())
                    .for_post(&row.post_id),
            );
        }
    }

    async fn note_relationship(&self, run: &mut Run<'_>, stage: &str, note: &RelationshipNote) {
        if self.settings.dry_run {
            return;
        }
        let Some(log) = self.collaborators.relationships.as_deref() else {
            tracing::debug!(run_id = %run.id, stage, "no relationship log configured");
            return;
        };
        if let Err(e) = log.note(note).await {
            tracing::warn!(
                run_id = %run.id,
                stage,
                counterparty = %note.counterparty,
                error = %e,
                "relationship note failed"
            );
            run.fail(RunFailure::new(
                FailureKind::PartialWriteFailure,
                stage,
                e.to_string(),
            ));
        }
    }

    /// Welcome at most one new inbound discussion. Gated by the limiter,
    /// free of the run budget.
    async fn community_watch(&self, run: &mut Run<'_>) {
        let Some(watch) = self.collaborators.community_watch.as_deref() else {
            Self::unavailable(run, "community_watch", "community watch");
            return;
        };
        let since = run.clock.now() - self.settings.scan_window;
        let discussions = match watch.recent_discussions(since).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(run_id = %run.id, stage = "community_watch", error = %e, "discussion check failed");
                run.fail(RunFailure::new(
                    FailureKind::CollaboratorUnavailable,
                    "community_watch",
                    e.to_string(),
                ));
                return;
            }
        };
        tracing::info!(run_id = %run.id, stage = "community_watch", discussions = discussions.len(), "discussion check");

        let Some(discussion) = discussions.iter().find(|d| !run.state.has_replied(&d.id)) else {
            return;
        };
        if !self.rate_allows(run, "community_watch") {
            return;
        }
        let Some(composer) = self.collaborators.composer.as_deref() else {
            Self::unavailable(run, "community_watch", "composer");
            return;
        };

        let request = ComposeRequest {
            goal: discussion.host_action.clone(),
            platform: GITHUB_PLATFORM.to_string(),
            audience: NEWCOMER_AUDIENCE.to_string(),
            context: Some(format!("Discussion: {}", discussion.title)),
            tone: None,
            max_words: self.settings.reply_max_words,
        };
        let draft = match composer.compose(&request).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(run_id = %run.id, stage = "community_watch", error = %e, "draft failed");
                run.fail(RunFailure::new(
                    FailureKind::CollaboratorUnavailable,
                    "community_watch",
                    e.to_string(),
                ));
                return;
            }
        };

        if self.settings.dry_run {
            tracing::info!(
                run_id = %run.id,
                number = discussion.number,
                words = draft.word_count(),
                "dry run: would reply to discussion"
            );
            return;
        }
        match watch.reply(discussion, &draft.text).await {
            Ok(()) => {
                run.summary.replies += 1;
                run.state.record_reply(discussion.id.clone());
                tracing::info!(run_id = %run.id, number = discussion.number, author = %discussion.author, "replied to discussion");
            }
            Err(e) => {
                tracing::warn!(run_id = %run.id, number = discussion.number, error = %e, "discussion reply failed");
                run.fail(RunFailure::new(
                    FailureKind::CollaboratorUnavailable,
                    "community_watch",
                    e.to_string(),
                ));
            }
        }
    }

    fn is_self(&self, login: &str) -> bool {
        self.settings
            .self_login
            .as_deref()
            .is_some_and(|me| me.eq_ignore_ascii_case(login))
    }

    async fn reciprocate(&self, run: &mut Run<'_>) {
        let Some(reciprocation) = self.collaborators.reciprocation.as_deref() else {
            Self::unavailable(run, "reciprocate", "reciprocation");
            return;
        };
        let since = run.clock.now() - self.settings.scan_window;
        let followers = match reciprocation.recent_followers(since).await {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(run_id = %run.id, stage = "reciprocate", error = %e, "follower check failed");
                run.fail(RunFailure::new(
                    FailureKind::CollaboratorUnavailable,
                    "reciprocate",
                    e.to_string(),
                ));
                return;
            }
        };

        let candidates: Vec<_> = followers
            .iter()
            .filter(|f| !f.login.is_empty() && !self.is_self(&f.login))
            .take(self.settings.reciprocate_limit)
            .collect();
        tracing::info!(run_id = %run.id, stage = "reciprocate", new = followers.len(), considered = candidates.len(), "follower check");

        for follower in candidates {
            let login = follower.login.as_str();
            let note = RelationshipNote {
                at: run.clock.now(),
                platform: GITHUB_PLATFORM.to_string(),
                counterparty: login.to_string(),
                note: "Starred the repository".to_string(),
                tags: vec!["new_star".to_string(), "star_trade_candidate".to_string()],
            };
            self.note_relationship(run, "reciprocate", &note).await;

            if self.settings.dry_run {
                tracing::info!(run_id = %run.id, login, "dry run: would check reciprocation target");
                continue;
            }
            match reciprocation.has_reciprocation_target(login).await {
                Ok(true) => match reciprocation.reciprocate(login).await {
                    Ok(()) => {
                        tracing::info!(run_id = %run.id, login, "reciprocated");
                        run.summary.reciprocated.push(login.to_string());
                    }
                    Err(e) => {
                        tracing::warn!(run_id = %run.id, login, error = %e, "reciprocation failed");
                        run.fail(RunFailure::new(
                            FailureKind::CollaboratorUnavailable,
                            "reciprocate",
                            e.to_string(),
                        ));
                    }
                },
                Ok(false) => tracing::debug!(run_id = %run.id, login, "nothing to reciprocate"),
                Err(e) => {
                    tracing::warn!(run_id = %run.id, login, error = %e, "reciprocation target check failed");
                    run.fail(RunFailure::new(
                        FailureKind::CollaboratorUnavailable,
                        "reciprocate",
                        e.to_string(),
                    ));
                }
            }
        }
    }

    /// Spend the remaining budget on topics from the rotation, starting at
    /// the slot for the current hour.
    async fn proactive(&self, run: &mut Run<'_>) {
        if !self.budget_left(run) || self.rotation.is_empty() {
            return;
        }
        if run.summary.rate_limited.is_some() {
            return;
        }
        let Some(composer) = self.collaborators.composer.as_deref() else {
            Self::unavailable(run, "proactive", "composer");
            return;
        };
        if !self.settings.dry_run && self.collaborators.publisher.is_none() {
            Self::unavailable(run, "proactive", "publisher");
            return;
        }

        let hour = epoch_hour(run.clock.now());
        let max_attempts = self.settings.max_posts_per_run.saturating_mul(ATTEMPTS_PER_BUDGET);
        let mut attempt: u32 = 0;
        while self.budget_left(run) && attempt < max_attempts {
            if !self.rate_allows(run, "proactive") {
                break;
            }
            let Some(slot) = self.rotation.pick(hour, attempt as usize) else {
                break;
            };
            attempt += 1;
            tracing::info!(
                run_id = %run.id,
                stage = "proactive",
                strategy = %slot.strategy,
                community = %slot.community,
                topic = %slot.title,
                "proactive slot"
            );

            let request = self.proactive_request(slot);
            let draft = match composer.compose(&request).await {
                Ok(draft) => draft,
                Err(e) => {
                    tracing::warn!(run_id = %run.id, stage = "proactive", community = %slot.community, error = %e, "draft failed, skipping slot");
                    run.fail(RunFailure::new(
                        FailureKind::CollaboratorUnavailable,
                        "proactive",
                        e.to_string(),
                    ));
                    continue;
                }
            };

            let title = truncate_chars(&slot.title, PROACTIVE_TITLE_CHARS);
            match self
                .publish(run, "proactive", &slot.community, &title, &draft, &slot.strategy)
                .await
            {
                PublishOutcome::Published | PublishOutcome::DryRun => run.summary.proactive += 1,
                PublishOutcome::Failed => {}
            }
        }
    }

    fn proactive_request(&self, slot: &TopicSlot) -> ComposeRequest {
        let (context, tone, max_words) = match slot.drafting {
            Drafting::Financial => (
                Some(format!(
                    "Content type: {}. Medium length. Be precise about rules, numbers and \
                     jurisdictions; no investment advice.",
                    slot.kind.label()
                )),
                None,
                self.settings.proactive_max_words,
            ),
            Drafting::Social => (
                None,
                Some(slot.kind.tone().to_string()),
                self.settings.social_max_words,
            ),
        };
        ComposeRequest {
            goal: slot.title.clone(),
            platform: COMMUNITY_PLATFORM.to_string(),
            audience: AUDIENCE.to_string(),
            context,
            tone,
            max_words,
        }
    }

    /// Once per UTC day: summarize today's post log, send it, and record it.
    async fn daily_report(&self, run: &mut Run<'_>) {
        let now: DateTime<Utc> = run.clock.now();
        let today = now.date_naive();
        if !run.state.report_due(today) {
            return;
        }
        let (Some(ledger), Some(notifier)) = (&self.ledger, self.collaborators.notifier.as_deref())
        else {
            tracing::debug!(run_id = %run.id, "daily report skipped, ledger or notifier missing");
            return;
        };

        let log = match ledger.read_post_log().await {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(run_id = %run.id, stage = "report", error = %e, "post log read failed");
                run.fail(RunFailure::new(FailureKind::ReadFailure, "report", e.to_string()));
                return;
            }
        };
        let report = DailyReport::from_rows(today, &log.rows);
        let text = report.render();

        if self.settings.dry_run {
            tracing::info!(run_id = %run.id, report = %text, "dry run: daily report not sent");
            return;
        }
        if let Err(e) = notifier.notify(&text).await {
            tracing::warn!(run_id = %run.id, stage = "report", error = %e, "daily report not delivered");
            run.fail(RunFailure::new(
                FailureKind::CollaboratorUnavailable,
                "report",
                e.to_string(),
            ));
            return;
        }

        run.state.last_report = Some(today);
        run.summary.report_sent = true;
        tracing::info!(run_id = %run.id, date = %today, posts = report.posts, "daily report sent");
        if let Err(e) = ledger.append_daily_report(&report, true).await {
            tracing::warn!(run_id = %run.id, stage = "report", error = %e, "daily report row not recorded");
            run.fail(RunFailure::new(
                FailureKind::PartialWriteFailure,
                "report",
                e.to_string(),
            ));
        }
    }
}
