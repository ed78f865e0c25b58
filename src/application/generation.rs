use super::quota::{QuotaError, QuotaService};
use crate::domain::{AdmissionDecision, Caller, Refusal, UsageCounters};
use crate::infrastructure::{
    AccountRepository, ContentGenerator, GeneratedContent, GenerationRequest, GeneratorError,
};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated {
        content: GeneratedContent,
        words: u32,
        usage: UsageCounters,
    },
    Refused(Refusal),
}

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex is valid"))
}

/// Billable words: whitespace-separated tokens once HTML tags are removed.
pub fn count_words(text: &str) -> u32 {
    let stripped = html_tag_pattern().replace_all(text, " ");
    let count = stripped.split_whitespace().count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Admission check, external generation, then usage accounting.
pub struct GenerationService<A, G>
where
    A: AccountRepository,
    G: ContentGenerator,
{
    quota: Arc<QuotaService<A>>,
    generator: Arc<G>,
}

impl<A, G> GenerationService<A, G>
where
    A: AccountRepository,
    G: ContentGenerator,
{
    pub fn new(quota: Arc<QuotaService<A>>, generator: Arc<G>) -> Self {
        Self { quota, generator }
    }

    /// Usage is recorded only after the generator returns successfully. If
    /// this future is dropped mid-call nothing is charged.
    pub async fn generate(
        &self,
        caller: &Caller,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let admission = match self.quota.check_admission(caller).await? {
            AdmissionDecision::Admitted(admission) => admission,
            AdmissionDecision::Refused(refusal) => return Ok(GenerationOutcome::Refused(refusal)),
        };

        let content = match self.generator.generate(&request).await {
            Ok(content) => content,
            Err(e) => {
                error!(user_id = %admission.user_id, error = %e, "Generation failed, usage not charged");
                return Err(e.into());
            }
        };

        let words = count_words(&content.text);
        let usage = self.quota.record_usage(admission.user_id, words).await?;

        info!(
            user_id = %admission.user_id,
            words,
            model = %content.model,
            "Generated content"
        );

        Ok(GenerationOutcome::Generated {
            content,
            words,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_words_ignores_markup() {
        assert_eq!(count_words("<p>Hello <b>bright</b> world</p>"), 3);
        assert_eq!(count_words("one<br/>two"), 2);
    }

    #[test]
    fn count_words_handles_blank_text() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("<div></div>"), 0);
    }
}
