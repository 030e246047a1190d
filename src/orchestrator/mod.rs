//! Review orchestrator: stage sequencing, degradation, and lifecycle events.
//!
//! A run walks `fetch-change → extract-keys → fetch-issues →
//! fetch-knowledge [ok | degraded] → aggregate → score → draft`. Any stage
//! error ends the run, except a knowledge-base failure while
//! `resilience.continue_on_knowledge_base_error` is set, which is replaced
//! by an empty context plus a warning.
//!
//! The orchestrator holds no per-run state, so one instance can serve
//! concurrent runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, ConfigPatch, merge_config};
use crate::llm::{TextGenerator, Unconfigured};
use crate::llm::traced::TracedGenerator;
use crate::models::change::PublishResult;
use crate::models::context::{DraftComment, PublishRequest, RunMetadata};
use crate::models::{
    KnowledgeContext, ReviewContext, ReviewOutcome, ReviewRequest, ScoreResult, SourceReference,
};
use crate::providers::ProviderSet;
use crate::stages::{
    AggregateInput, AggregateStage, DraftStage, ExtractKeysStage, FetchChangeStage,
    FetchIssuesStage, FetchKnowledgeStage, PublishStage, ScoreStage, Stage, StageContext,
    StageError, StepSummary,
};
use crate::telemetry::{
    EventKind, EventSink, FanoutObserver, NoopObserver, ReviewObserver, TracingObserver,
};

/// Review steps in execution order, as `(id, label)` pairs.
pub const PIPELINE_STEPS: [(&str, &str); 7] = [
    (FetchChangeStage::ID, FetchChangeStage::DESCRIPTION),
    (ExtractKeysStage::ID, ExtractKeysStage::DESCRIPTION),
    (FetchIssuesStage::ID, FetchIssuesStage::DESCRIPTION),
    (FetchKnowledgeStage::ID, FetchKnowledgeStage::DESCRIPTION),
    (AggregateStage::ID, AggregateStage::DESCRIPTION),
    (ScoreStage::ID, ScoreStage::DESCRIPTION),
    (DraftStage::ID, DraftStage::DESCRIPTION),
];

struct StagesOutput {
    context: ReviewContext,
    score: ScoreResult,
    draft: DraftComment,
    warnings: Vec<String>,
}

/// Runs the review pipeline against one set of providers and one generator.
pub struct ReviewOrchestrator {
    config: Arc<Config>,
    providers: ProviderSet,
    generator: Arc<dyn TextGenerator>,
    observer: Arc<dyn ReviewObserver>,
}

impl ReviewOrchestrator {
    /// An orchestrator with built-in defaults and no observer.
    pub fn new(providers: ProviderSet, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            config: Arc::new(Config::default()),
            providers,
            generator,
            observer: Arc::new(NoopObserver),
        }
    }

    /// An orchestrator that only publishes and never reaches a model backend.
    pub fn publisher(providers: ProviderSet) -> Self {
        Self::new(providers, Arc::new(Unconfigured))
    }

    /// Use an already resolved configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Fold a partial override over the current configuration.
    pub fn with_overrides(mut self, patch: &ConfigPatch) -> Self {
        self.config = Arc::new(merge_config(&self.config, patch));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReviewObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn sink(&self) -> EventSink {
        let observability = &self.config.observability;
        let observer: Arc<dyn ReviewObserver> = if observability.verbose_logs {
            Arc::new(FanoutObserver::new(vec![
                self.observer.clone(),
                Arc::new(TracingObserver),
            ]))
        } else {
            self.observer.clone()
        };
        EventSink::new(observer, observability.enabled)
    }

    fn stage_context(&self, sink: &EventSink) -> StageContext {
        let generator = TracedGenerator::new(
            self.generator.clone(),
            sink.clone(),
            self.config.observability.preview_chars,
        );
        StageContext::new(self.config.clone(), self.providers.clone(), Arc::new(generator))
    }

    /// Run the full pipeline for one pull request.
    pub async fn run(&self, request: &ReviewRequest) -> Result<ReviewOutcome, StageError> {
        let sink = self.sink();
        let ctx = self.stage_context(&sink);
        let started = Instant::now();
        sink.emit(EventKind::PipelineStarted, None, Some(request.locator.clone()), None);

        match self.run_stages(request, &ctx, &sink).await {
            Ok(StagesOutput {
                context,
                score,
                draft,
                warnings,
            }) => {
                let elapsed = started.elapsed();
                sink.emit(
                    EventKind::PipelineCompleted,
                    None,
                    Some(format!("overall score {}/100", score.overall_score)),
                    Some(elapsed),
                );
                Ok(ReviewOutcome {
                    meta: RunMetadata {
                        run_id: sink.run_id().to_string(),
                        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        used_generator: draft.used_generator,
                    },
                    context,
                    score,
                    draft,
                    warnings,
                })
            }
            Err(e) => {
                sink.emit(
                    EventKind::PipelineFailed,
                    None,
                    Some(e.to_string()),
                    Some(started.elapsed()),
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &ReviewRequest,
        ctx: &StageContext,
        sink: &EventSink,
    ) -> Result<StagesOutput, StageError> {
        let mut warnings = Vec::new();
        let profile = request.profile.unwrap_or_default();

        let fetched = run_step(sink, &FetchChangeStage, FetchChangeStage.run(request, ctx)).await?;
        let keys = run_step(sink, &ExtractKeysStage, ExtractKeysStage.run(&fetched.change, ctx)).await?;
        let issues = run_step(sink, &FetchIssuesStage, FetchIssuesStage.run(&keys.0, ctx)).await?;

        let knowledge = match run_step(
            sink,
            &FetchKnowledgeStage,
            FetchKnowledgeStage.run(&fetched.change, &issues, ctx),
        )
        .await
        {
            Ok(knowledge) => knowledge,
            Err(e) if self.config.resilience.continue_on_knowledge_base_error => {
                let message =
                    format!("Knowledge base retrieval failed ({e}); continuing with empty knowledge context");
                tracing::warn!("{message}");
                sink.emit(
                    EventKind::Degraded,
                    Some(FetchKnowledgeStage::ID),
                    Some(message.clone()),
                    None,
                );
                warnings.push(message);
                KnowledgeContext::default()
            }
            Err(e) => return Err(e),
        };

        let input = AggregateInput {
            source: fetched.source,
            profile,
            change: fetched.change,
            issues,
            knowledge,
        };
        let context = run_step(sink, &AggregateStage, AggregateStage.run(input, ctx)).await?;
        let score = run_step(sink, &ScoreStage, ScoreStage.run(&context, ctx)).await?;
        let draft = run_step(sink, &DraftStage, DraftStage.run(&context, &score, ctx)).await?;

        Ok(StagesOutput {
            context,
            score,
            draft,
            warnings,
        })
    }

    /// Publish an edited comment through the publish gate.
    pub async fn publish_edited_comment(&self, request: &PublishRequest) -> Result<PublishResult, StageError> {
        let source = SourceReference::parse(&request.locator)?;
        let sink = self.sink();
        let ctx = self.stage_context(&sink);
        run_step(
            &sink,
            &PublishStage,
            PublishStage.run(&source, &request.body, request.confirmed, &ctx),
        )
        .await
    }
}

/// Bracket one stage with `step_started` and `step_succeeded`/`step_failed`.
async fn run_step<S, T, F>(sink: &EventSink, _stage: &S, work: F) -> Result<T, StageError>
where
    S: Stage,
    T: StepSummary,
    F: Future<Output = Result<T, StageError>>,
{
    sink.emit(EventKind::StepStarted, Some(S::ID), None, None);
    let started = Instant::now();
    match work.await {
        Ok(output) => {
            let summary = output.summary();
            tracing::debug!(step = S::ID, %summary, "step succeeded");
            sink.emit(EventKind::StepSucceeded, Some(S::ID), Some(summary), Some(started.elapsed()));
            Ok(output)
        }
        Err(e) => {
            sink.emit(EventKind::StepFailed, Some(S::ID), Some(e.to_string()), Some(started.elapsed()));
            Err(e)
        }
    }
}
