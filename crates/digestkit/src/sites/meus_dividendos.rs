//! Meus Dividendos portfolio table

use super::{submit_login, LoginForm};
use crate::artifact::{write_whole_file, CollisionPolicy};
use crate::browser::{ContentExtractor, ElementValue, Locator, WindowHandle};
use crate::clean::strip_attributes;
use crate::config::Credentials;
use crate::error::{BrowserError, PipelineError};
use crate::jobs::meus_dividendos_file_name;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const LOGIN_URL: &str = "https://portal.meusdividendos.com/login";
pub const PORTFOLIO_URL: &str = "https://smartfolio.meusdividendos.com/beta";

const WALLET_BUTTON: &str = "//button[.//span[contains(text(),'Carteira')]]";
const ALL_ASSETS_TAB: &str = "//li[@class='nav-item']/a[.//small[contains(text(),'Todos')]]";
const PORTFOLIO_TABLE: &str = "div.table-responsive.portfolio-report-table-container";

/// Log in, open the full portfolio table and save it as bare HTML
///
/// Every attribute is stripped from the table before it is written to
/// `carteira-meus-dividendos-{date}.htm`, which is replaced if present.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub async fn download_wallet(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    credentials: &Credentials,
    out_dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf, PipelineError> {
    let session = extractor.session();
    let pacing = extractor.pacing();

    session.navigate(window, LOGIN_URL).await?;
    let form = LoginForm {
        url: LOGIN_URL,
        email: Locator::css("#ng_flow_input_email"),
        password: Locator::css("#ng_flow_input_pass"),
        submit: Locator::css("button.ng_flow_user_right_inputs_btn"),
    };
    submit_login(extractor, window, &form, credentials).await?;
    extractor.settle(pacing.login_settle).await;

    session.navigate(window, PORTFOLIO_URL).await?;
    extractor.settle(pacing.page_load).await;

    for step in [WALLET_BUTTON, ALL_ASSETS_TAB] {
        let target = Locator::xpath(step);
        extractor.wait_for(window, &target).await?;
        extractor.click(window, &target.first()).await?;
        extractor.settle(pacing.page_load).await;
    }

    let table = Locator::css(PORTFOLIO_TABLE);
    extractor.wait_for(window, &table).await?;
    let html = session
        .read(window, &table.first(), ElementValue::InnerHtml)
        .await?
        .ok_or_else(|| BrowserError::StaleElement(table.first().to_string()))?;

    let name = meus_dividendos_file_name(today, "htm");
    let outcome = write_whole_file(
        out_dir,
        &name,
        &strip_attributes(&html),
        CollisionPolicy::Overwrite,
    )
    .await?;

    info!(file = %outcome.path().display(), "Saved portfolio table");
    Ok(outcome.path().to_path_buf())
}
