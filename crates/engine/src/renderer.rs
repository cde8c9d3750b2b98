//! Bulk rendering pass (pending -> rendered).
//!
//! Rendering itself is the pure function in `herald_core::render`; this
//! driver applies it to every pending target of a campaign and owns the
//! fallback policy: a target whose language has no template is retried with
//! the default language, and skipped only when the fallback fails too.

use herald_core::render::{self, DEFAULT_LANGUAGE};
use herald_core::state::skip_reason;
use herald_core::CoreError;
use herald_db::models::campaign::Campaign;
use herald_db::repositories::TargetRepo;
use herald_db::DbPool;

use crate::error::EngineError;

/// Counts from one bulk render pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderOutcome {
    pub rendered: u64,
    pub skipped: u64,
}

/// Runs the preview render over a campaign's pending targets.
pub struct RenderDriver;

impl RenderDriver {
    /// Render every pending target of the campaign.
    ///
    /// Deterministic for identical inputs, so re-running a preview produces
    /// identical text. Targets are advanced pending -> rendered; targets
    /// with no usable template end up skipped with
    /// [`skip_reason::UNSUPPORTED_LANGUAGE`].
    pub async fn render_campaign(
        pool: &DbPool,
        campaign: &Campaign,
    ) -> Result<RenderOutcome, EngineError> {
        let tone = campaign.tone()?;
        let pending = TargetRepo::list_pending(pool, campaign.id).await?;
        let mut outcome = RenderOutcome::default();

        for target in pending {
            let text = match render::render(
                tone,
                &target.language,
                target.formal_address,
                &campaign.draft_text,
                campaign.topic.as_deref(),
            ) {
                Ok(text) => Some(text),
                Err(CoreError::UnsupportedLanguage(_)) => render::render(
                    tone,
                    DEFAULT_LANGUAGE,
                    target.formal_address,
                    &campaign.draft_text,
                    campaign.topic.as_deref(),
                )
                .ok(),
                Err(e) => return Err(e.into()),
            };

            match text {
                Some(text) => {
                    if TargetRepo::store_rendered(pool, target.id, &text).await? {
                        outcome.rendered += 1;
                    }
                }
                None => {
                    tracing::warn!(
                        target_id = target.id,
                        language = %target.language,
                        "No template even after fallback, skipping target",
                    );
                    if TargetRepo::mark_skipped(pool, target.id, skip_reason::UNSUPPORTED_LANGUAGE)
                        .await?
                    {
                        outcome.skipped += 1;
                    }
                }
            }
        }

        tracing::info!(
            campaign_id = campaign.id,
            rendered = outcome.rendered,
            skipped = outcome.skipped,
            "Preview render finished",
        );
        Ok(outcome)
    }
}
