//! Suno investor area: login, reports and wallets

use super::{record, submit_login, LoginForm};
use crate::artifact::{date_stamp, write_whole_file, CollisionPolicy, WriteOutcome};
use crate::batch::{BatchReport, ItemStatus};
use crate::browser::{ClickMode, ContentExtractor, ElementRef, ElementValue, Locator, WindowHandle};
use crate::clean::clean_html;
use crate::config::Credentials;
use crate::error::{BrowserError, PipelineError};
use crate::identity::derive_identity;
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const LOGIN_URL: &str = "https://investidor.suno.com.br/login";
pub const REPORTS_URL: &str = "https://investidor.suno.com.br/relatorios";
pub const WALLETS_URL: &str = "https://investidor.suno.com.br/carteiras";

/// Scrollable container of the investor area
const MAIN_CONTENT: &str = "#main-content";

/// Report cards in the report list
const REPORT_CARD: &str = "div[id^='report']";

/// Inline style of report cards already read
const READ_MARKER: &str = "opacity: 0.6";

/// Content regions of a report page, in order of preference
const REPORT_REGIONS: [&str; 2] = ["#readerData", ".elementor.radar-fii"];

const REPORT_SCROLL_ROUNDS: usize = 8;
const WALLET_SCROLL_ROUNDS: usize = 3;

/// Wallet links on the wallets page
const WALLET_LINK: &str = "a.WmCKBGPeU3I8A1eENMyG";

/// Sub-wallet tiles of the international wallet
const INTERNATIONAL_TILE: &str = "div.OBL8xjDqKulPUiJR2xLn";

/// Only the first tiles of the international wallet are captured
const INTERNATIONAL_TILE_LIMIT: usize = 5;

/// Fund tiles of the funds wallet
const FUND_TILE: &str = "div.aitB5h9xFRt1CAXd2E8t.YxNKF3awfZ4s67CWXRjA > div.OBL8xjDqKulPUiJR2xLn";

const INTERNATIONAL_PATH: &str = "/carteiras/internacional";
const FUNDS_PATH: &str = "/carteiras/fundos";

const COOKIE_BANNER: &str = "#hs-eu-cookie-confirmation";
const COOKIE_ACCEPT: &str = "#hs-eu-confirmation-button";

/// Log in, accepting the cookie banner if it shows up
#[instrument(skip_all)]
pub async fn login(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    credentials: &Credentials,
) -> Result<(), PipelineError> {
    extractor.session().navigate(window, LOGIN_URL).await?;

    let banner = [Locator::css(COOKIE_BANNER)];
    if extractor
        .wait_for_any(window, &banner, extractor.pacing().popup_wait)
        .await
        .is_ok()
    {
        if let Err(e) = extractor
            .click(window, &Locator::css(COOKIE_ACCEPT).first())
            .await
        {
            warn!(error = %e, "Failed to accept cookie banner");
        }
    }

    let form = LoginForm {
        url: LOGIN_URL,
        email: Locator::css("#user_email"),
        password: Locator::css("#user_password"),
        submit: Locator::css("#login_button"),
    };
    submit_login(extractor, window, &form, credentials).await
}

/// Capture every unread report into `out_dir`
///
/// Each report opens in a new window; its content region is saved as
/// `{prefix}{identity}` where the identity derives from the report URL.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub async fn download_reports(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    out_dir: &Path,
) -> Result<BatchReport, PipelineError> {
    let session = extractor.session();
    session.navigate(window, REPORTS_URL).await?;
    extractor.settle(extractor.pacing().page_load).await;

    let container = Locator::css(MAIN_CONTENT).first();
    extractor
        .scroll_to_load(window, &container, REPORT_SCROLL_ROUNDS)
        .await?;

    let cards = Locator::css(REPORT_CARD);
    let total = session.count(window, &cards).await?;
    info!(total, "Found reports");

    let regions: Vec<Locator> = REPORT_REGIONS.iter().map(|s| Locator::css(*s)).collect();
    let mut report = BatchReport::default();

    for index in 0..total {
        let card = cards.nth(index);
        let outcome = capture_report(extractor, window, &card, &regions, out_dir).await;
        record(&mut report, format!("report-{}", index), outcome);
        extractor.settle(extractor.pacing().between_items).await;
    }

    info!(summary = %report, "Reports captured");
    Ok(report)
}

async fn capture_report(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    card: &ElementRef,
    regions: &[Locator],
    out_dir: &Path,
) -> Result<ItemStatus, PipelineError> {
    let session = extractor.session();

    let outer = session
        .read(window, card, ElementValue::OuterHtml)
        .await?
        .ok_or_else(|| BrowserError::StaleElement(card.to_string()))?;
    if outer.contains(READ_MARKER) {
        debug!(card = %card, "Skipping report already read");
        return Ok(ItemStatus::Skipped);
    }

    session.scroll_into_view(window, card).await?;
    extractor.settle(extractor.pacing().click_settle).await;

    let (capture, url) = extractor
        .capture_in_new_window(window, card, regions)
        .await?;

    let name = capture.file_name(&derive_identity(&url));
    let outcome = write_whole_file(
        out_dir,
        &name,
        &clean_html(&capture.html),
        CollisionPolicy::Overwrite,
    )
    .await?;
    info!(file = %outcome.path().display(), uncertain = capture.uncertain, "Saved report");
    Ok(ItemStatus::Done {
        output: outcome.path().to_path_buf(),
    })
}

/// Capture every wallet page into `out_dir`
///
/// Files are named `{prefix}carteira-{date}-{identity}` and never
/// overwritten, so a second run on the same day only fills gaps.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub async fn download_wallets(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    out_dir: &Path,
    today: NaiveDate,
) -> Result<BatchReport, PipelineError> {
    let session = extractor.session();
    session.navigate(window, WALLETS_URL).await?;
    extractor.settle(extractor.pacing().page_load).await;

    let container = Locator::css(MAIN_CONTENT).first();
    extractor
        .scroll_to_load(window, &container, WALLET_SCROLL_ROUNDS)
        .await?;

    let links = wallet_links(extractor, window).await?;
    info!(count = links.len(), "Found wallets");

    let stamp = date_stamp(today);
    let mut report = BatchReport::default();

    for link in links {
        if let Err(e) = session.navigate(window, link.as_str()).await {
            record(&mut report, link.path().to_string(), Err(e.into()));
            continue;
        }
        extractor.settle(extractor.pacing().navigation_settle).await;

        match link.path() {
            INTERNATIONAL_PATH => {
                let tiles = Locator::css(INTERNATIONAL_TILE);
                let limit = Some(INTERNATIONAL_TILE_LIMIT);
                capture_tiles(extractor, window, &tiles, limit, out_dir, &stamp, &mut report)
                    .await;
            }
            FUNDS_PATH => {
                let tiles = Locator::css(FUND_TILE);
                capture_tiles(extractor, window, &tiles, None, out_dir, &stamp, &mut report)
                    .await;
            }
            path => {
                let outcome = save_wallet(extractor, window, path, out_dir, &stamp).await;
                record(&mut report, path.to_string(), outcome);
            }
        }
    }

    info!(summary = %report, "Wallets captured");
    Ok(report)
}

/// Absolute URLs of the wallet links on the wallets page
async fn wallet_links(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
) -> Result<Vec<Url>, PipelineError> {
    let session = extractor.session();
    let base = Url::parse(WALLETS_URL).map_err(|e| PipelineError::Config(e.to_string()))?;
    let anchors = Locator::css(WALLET_LINK);
    let count = session.count(window, &anchors).await?;

    let mut links = Vec::with_capacity(count);
    for index in 0..count {
        let href = session
            .read(window, &anchors.nth(index), ElementValue::Attribute("href".into()))
            .await?;
        match href.filter(|h| !h.is_empty()).map(|h| base.join(&h)) {
            Some(Ok(url)) => links.push(url),
            Some(Err(e)) => warn!(index, error = %e, "Ignoring malformed wallet link"),
            None => {}
        }
    }
    Ok(links)
}

/// Click each tile of a multi-wallet page and save what it shows
async fn capture_tiles(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    tiles: &Locator,
    limit: Option<usize>,
    out_dir: &Path,
    stamp: &str,
    report: &mut BatchReport,
) {
    let session = extractor.session();
    let mut index = 0;
    loop {
        if limit.is_some_and(|max| index >= max) {
            break;
        }
        match session.count(window, tiles).await {
            Ok(count) if index < count => {}
            Ok(_) => break,
            Err(e) => {
                record(report, format!("{}[{}]", tiles, index), Err(e.into()));
                break;
            }
        }

        let outcome = async {
            session
                .click(window, &tiles.nth(index), ClickMode::Script)
                .await?;
            extractor.settle(extractor.pacing().tile_settle).await;
            let url = session.current_url(window).await?;
            let path = Url::parse(&url)
                .map(|u| u.path().to_string())
                .unwrap_or(url);
            save_wallet(extractor, window, &path, out_dir, stamp).await
        }
        .await;
        record(report, format!("{}[{}]", tiles, index), outcome);
        index += 1;
    }
}

async fn save_wallet(
    extractor: &ContentExtractor<'_>,
    window: &WindowHandle,
    path: &str,
    out_dir: &Path,
    stamp: &str,
) -> Result<ItemStatus, PipelineError> {
    let capture = extractor
        .capture(window, &[Locator::css(MAIN_CONTENT)])
        .await?;
    let name = capture.file_name(&format!("carteira-{}-{}", stamp, derive_identity(path)));

    let html = clean_html(&capture.html);
    match write_whole_file(out_dir, &name, &html, CollisionPolicy::Keep).await? {
        WriteOutcome::Written(output) => {
            info!(file = %output.display(), uncertain = capture.uncertain, "Saved wallet");
            Ok(ItemStatus::Done { output })
        }
        WriteOutcome::Kept(_) => Ok(ItemStatus::Skipped),
    }
}
