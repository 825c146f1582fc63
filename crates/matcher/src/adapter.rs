//! Template-level verification on top of a [`Matcher`].

use template::{FirRecord, Template, TemplateStore};
use tracing::debug;

use crate::engine::Matcher;
use crate::types::{MatchError, MatchResult};

/// Decode a template of either form into its record.
pub fn resolve_template(
    store: &TemplateStore,
    template: &Template,
) -> Result<FirRecord, MatchError> {
    match template {
        Template::Handle(handle) => Ok(store.resolve(*handle)?),
        Template::Text(text) => Ok(text.decode()?),
    }
}

/// Compare `probe` against `stored`.
///
/// Both templates must share one form; mixed forms are rejected before
/// either side is resolved. A match returns the payload bound into
/// `stored`.
pub fn verify_templates(
    store: &TemplateStore,
    matcher: &dyn Matcher,
    probe: &Template,
    stored: &Template,
) -> Result<MatchResult, MatchError> {
    if probe.form() != stored.form() {
        return Err(MatchError::UnsupportedFormMismatch {
            left: probe.form(),
            right: stored.form(),
        });
    }
    let a = resolve_template(store, probe)?;
    let b = resolve_template(store, stored)?;
    let result = matcher.verify_records(&a, &b)?;
    debug!(
        form = %probe.form(),
        score = result.score,
        matched = result.matched,
        "verify"
    );
    Ok(result)
}
