//! Fuse the three contexts, rank knowledge pages and map issue keys to pages.
//!
//! Pure: no I/O, no randomness. Ranking the same inputs twice gives the
//! same scores and order.

use std::collections::{BTreeMap, HashSet};

use super::{Stage, StageContext, StageError, StepSummary};
use crate::models::{
    ChangeContext, IssueContext, KnowledgeContext, KnowledgeDocument, ReviewContext, ReviewProfile,
    SourceReference,
};

/// Added when a page's URL is one of the strong links.
pub const STRONG_LINK_BOOST: u32 = 15;

pub struct AggregateStage;

impl Stage for AggregateStage {
    const ID: &'static str = "aggregate-context";
    const DESCRIPTION: &'static str = "Rank knowledge pages and build the traceability map";
}

/// Everything the aggregate stage fuses, handed over by value.
#[derive(Debug, Clone)]
pub struct AggregateInput {
    pub source: SourceReference,
    pub profile: ReviewProfile,
    pub change: ChangeContext,
    pub issues: IssueContext,
    pub knowledge: KnowledgeContext,
}

impl StepSummary for ReviewContext {
    fn summary(&self) -> String {
        let linked = self.traceability.values().filter(|urls| !urls.is_empty()).count();
        format!(
            "{} ranked pages, {}/{} issue keys traced",
            self.knowledge.documents.len(),
            linked,
            self.traceability.len()
        )
    }
}

impl AggregateStage {
    pub async fn run(&self, input: AggregateInput, ctx: &StageContext) -> Result<ReviewContext, StageError> {
        let AggregateInput {
            source,
            profile,
            change,
            issues,
            mut knowledge,
        } = input;

        let strong: HashSet<&str> = knowledge.strong_linked_urls.iter().map(String::as_str).collect();
        let ranked = rank_documents(
            &knowledge.documents,
            &issues.requested_keys,
            &change.signals.keywords,
            &strong,
            ctx.config.top_k,
        );
        let traceability = build_traceability(&issues.requested_keys, &ranked);
        knowledge.documents = ranked;

        Ok(ReviewContext {
            source,
            profile,
            change,
            issues,
            knowledge,
            traceability,
        })
    }
}

/// Score one page against the requested keys and keywords.
///
/// Returns a new document; the input is left untouched.
pub fn score_document(
    document: &KnowledgeDocument,
    keys: &[String],
    keywords: &[String],
    strong: &HashSet<&str>,
) -> KnowledgeDocument {
    let haystack = format!("{}\n{}\n{}", document.title, document.content, document.url).to_lowercase();

    let matched_issue_keys: Vec<String> = keys
        .iter()
        .filter(|k| haystack.contains(&k.to_lowercase()))
        .cloned()
        .collect();
    let matched_keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| haystack.contains(k.as_str()))
        .collect();

    let link_boost = if strong.contains(document.url.as_str()) {
        STRONG_LINK_BOOST
    } else {
        0
    };
    let key_boost = (12 * matched_issue_keys.len()).min(25) as u32;
    let keyword_boost = (2 * matched_keywords.len()).min(20) as u32;
    let score = (document.source.boost() + link_boost + key_boost + keyword_boost).min(100);

    KnowledgeDocument {
        relevance_score: Some(score),
        matched_issue_keys,
        matched_keywords,
        ..document.clone()
    }
}

/// Score every page, sort by score then title, keep the first `top_k`.
pub fn rank_documents(
    documents: &[KnowledgeDocument],
    keys: &[String],
    keywords: &[String],
    strong: &HashSet<&str>,
    top_k: usize,
) -> Vec<KnowledgeDocument> {
    let mut ranked: Vec<KnowledgeDocument> = documents
        .iter()
        .map(|d| score_document(d, keys, keywords, strong))
        .collect();
    ranked.sort_by(|a, b| {
        b.relevance_score
            .cmp(&a.relevance_score)
            .then_with(|| a.title.cmp(&b.title))
    });
    ranked.truncate(top_k);
    ranked
}

/// Map every key to the URLs of ranked pages that matched it.
///
/// Keys with no page map to an empty list.
pub fn build_traceability(keys: &[String], ranked: &[KnowledgeDocument]) -> BTreeMap<String, Vec<String>> {
    keys.iter()
        .map(|key| {
            let mut seen = HashSet::new();
            let urls = ranked
                .iter()
                .filter(|d| d.matched_issue_keys.contains(key))
                .filter(|d| seen.insert(d.url.as_str()))
                .map(|d| d.url.clone())
                .collect();
            (key.clone(), urls)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::models::Provenance;
    use crate::stages::testing::{context_with, empty_providers};

    fn doc(id: &str, title: &str, content: &str, source: Provenance) -> KnowledgeDocument {
        KnowledgeDocument::new(
            id,
            title,
            format!("https://wiki.example.com/pages/{id}"),
            content,
            source,
        )
    }

    fn keys() -> Vec<String> {
        vec!["PROJ-1".into(), "PROJ-2".into(), "PROJ-3".into()]
    }

    #[test]
    fn score_combines_all_boosts() {
        let d = doc("1", "Retry", "proj-1 proj-2 proj-3 retry timeout", Provenance::IssueLink);
        let strong: HashSet<&str> = [d.url.as_str()].into_iter().collect();
        let scored = score_document(&d, &keys(), &["retry".into(), "timeout".into()], &strong);
        // 45 + 15 + min(25, 36) + 4
        assert_eq!(scored.relevance_score, Some(89));
        assert_eq!(scored.matched_issue_keys, keys());
        assert!(d.relevance_score.is_none());
    }

    #[test]
    fn score_is_clamped_at_100() {
        let keywords: Vec<String> = (0..20).map(|i| format!("kw{i}")).collect();
        let content = format!("proj-1 proj-2 {}", keywords.join(" "));
        let d = doc("1", "Everything", &content, Provenance::IssueLink);
        let strong: HashSet<&str> = [d.url.as_str()].into_iter().collect();
        // 45 + 15 + 24 + 20 = 104
        let scored = score_document(&d, &keys(), &keywords, &strong);
        assert_eq!(scored.relevance_score, Some(100));
    }

    #[test]
    fn provenance_breaks_otherwise_equal_documents() {
        let docs = vec![
            doc("1", "Same", "PROJ-1", Provenance::KeywordQuery),
            doc("2", "Same", "PROJ-1", Provenance::IssueLink),
        ];
        let ranked = rank_documents(&docs, &keys(), &[], &HashSet::new(), 10);
        assert_eq!(ranked[0].id, "2");
        assert_eq!(ranked[0].relevance_score, Some(57));
        assert_eq!(ranked[1].relevance_score, Some(30));
    }

    #[test]
    fn ties_break_by_title_and_top_k_applies() {
        let docs = vec![
            doc("1", "Zeta", "", Provenance::ChangeLink),
            doc("2", "Alpha", "", Provenance::ChangeLink),
            doc("3", "Mid", "", Provenance::KeywordQuery),
        ];
        let ranked = rank_documents(&docs, &keys(), &[], &HashSet::new(), 2);
        let titles: Vec<_> = ranked.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let docs = vec![
            doc("1", "B", "PROJ-2 retry", Provenance::IssueQuery),
            doc("2", "A", "retry", Provenance::ChangeLink),
            doc("3", "C", "PROJ-1 PROJ-2", Provenance::KeywordQuery),
        ];
        let keywords = vec!["retry".to_string()];
        let once = rank_documents(&docs, &keys(), &keywords, &HashSet::new(), 10);
        let twice = rank_documents(&once, &keys(), &keywords, &HashSet::new(), 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn traceability_lists_every_key() {
        let docs = vec![
            doc("1", "A", "PROJ-1", Provenance::IssueLink),
            doc("2", "B", "PROJ-1 PROJ-2", Provenance::IssueLink),
        ];
        let ranked = rank_documents(&docs, &keys(), &[], &HashSet::new(), 10);
        let map = build_traceability(&keys(), &ranked);

        assert_eq!(map.len(), 3);
        assert_eq!(map["PROJ-1"].len(), 2);
        assert_eq!(map["PROJ-2"], vec!["https://wiki.example.com/pages/2"]);
        assert!(map["PROJ-3"].is_empty());
    }

    #[tokio::test]
    async fn run_builds_review_context() {
        let ctx = context_with(Config::default(), empty_providers());
        let input = AggregateInput {
            source: SourceReference::parse("https://github.com/acme/platform/pull/1").unwrap(),
            profile: ReviewProfile::Security,
            change: ChangeContext::default(),
            issues: IssueContext {
                requested_keys: vec!["PROJ-1".into()],
                issues: Vec::new(),
            },
            knowledge: KnowledgeContext {
                documents: vec![doc("1", "A", "PROJ-1", Provenance::ChangeLink)],
                ..KnowledgeContext::default()
            },
        };

        let review = AggregateStage.run(input, &ctx).await.unwrap();

        assert_eq!(review.profile, ReviewProfile::Security);
        assert_eq!(review.knowledge.documents[0].relevance_score, Some(50));
        assert_eq!(review.summary(), "1 ranked pages, 1/1 issue keys traced");
    }
}
