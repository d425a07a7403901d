//! Site routines
//!
//! Each routine scripts one site through a [`ContentExtractor`] and writes
//! captured HTML artifacts. Routines report per-item outcomes in a
//! [`BatchReport`]; one item failing never stops the others.
//!
//! [`ContentExtractor`]: crate::browser::ContentExtractor

pub mod meus_dividendos;
pub mod suno;

use crate::batch::{BatchReport, ItemReport, ItemStatus};
use crate::browser::{ContentExtractor, Locator, WindowHandle};
use crate::config::Credentials;
use crate::error::PipelineError;
use tracing::{error, info};

/// Login form of a site
pub(crate) struct LoginForm<'a> {
    pub url: &'a str,
    pub email: Locator,
    pub password: Locator,
    pub submit: Locator,
}

/// Fill and submit a login form
///
/// A form that does not show up within the popup wait means the session is
/// already logged in.
pub(crate) async fn submit_login(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    form: &LoginForm<'_>,
    credentials: &Credentials,
) -> Result<(), PipelineError> {
    let session = extractor.session();
    let wait = extractor.pacing().popup_wait;

    if extractor
        .wait_for_any(window, std::slice::from_ref(&form.email), wait)
        .await
        .is_err()
    {
        info!(url = form.url, "Login fields not found, assuming logged in");
        return Ok(());
    }

    session
        .fill(window, &form.email.first(), &credentials.email)
        .await?;
    session
        .fill(window, &form.password.first(), &credentials.password)
        .await?;
    extractor.click(window, &form.submit.first()).await?;
    extractor.settle(extractor.pacing().login_settle).await;
    info!(url = form.url, "Logged in");
    Ok(())
}

/// Record an item outcome, logging failures
pub(crate) fn record(
    report: &mut BatchReport,
    identity: String,
    outcome: Result<ItemStatus, PipelineError>,
) {
    let status = match outcome {
        Ok(status) => status,
        Err(e) => {
            error!(item = %identity, error = %e, "Failed to capture item");
            ItemStatus::Failed(e.to_string())
        }
    };
    report.items.push(ItemReport { identity, status });
}
