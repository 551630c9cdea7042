use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, Headers, ResourceType, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use jobsnare_core::error::AppError;
use jobsnare_core::models::{FetchTrace, ScrapingConfig};
use jobsnare_core::traits::Fetcher;
use jobsnare_core::util::{env_var, normalize_host};
use rand::Rng;
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use crate::fetcher::random_user_agent;

const VIEWPORT_WIDTH: u32 = 1920;
const VIEWPORT_HEIGHT: u32 = 1080;
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const POLL_EVAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Hosts serving client-rendered job pages. Their scripts and API calls are
/// never blocked and they get framework-aware readiness checks.
const SPA_HOSTS: &[&str] = &["grabjobs.com", "jobcopilot.com", "wellfound.com"];

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Explicit Chrome/Chromium binary; otherwise well-known paths are probed.
    pub chrome_bin: Option<PathBuf>,
    /// When set, a viewport screenshot is written here after each render.
    pub screenshot_dir: Option<PathBuf>,
    pub launch_timeout: Duration,
    /// Budget for each CDP housekeeping step (context, page, setup, close).
    pub step_timeout: Duration,
    /// Pause between tries inside one strategy.
    pub retry_delay: Duration,
    /// Random post-render delay, inclusive range in ms.
    pub human_delay_ms: (u64, u64),
    pub scroll_steps: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_bin: None,
            screenshot_dir: None,
            launch_timeout: Duration::from_secs(30),
            step_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(1000),
            human_delay_ms: (500, 2500),
            scroll_steps: 4,
        }
    }
}

impl BrowserSettings {
    /// Defaults overridden by `CHROME_BIN`, `JOBSNARE_BROWSER_HEADLESS`,
    /// `JOBSNARE_SCREENSHOT_DIR` and `JOBSNARE_BROWSER_*`.
    pub fn from_env() -> Result<Self, AppError> {
        let mut settings = Self::default();

        if let Some(headless) = env_var::<bool>("JOBSNARE_BROWSER_HEADLESS")? {
            settings.headless = headless;
        }
        settings.chrome_bin = env_var::<PathBuf>("CHROME_BIN")?;
        settings.screenshot_dir = env_var::<PathBuf>("JOBSNARE_SCREENSHOT_DIR")?;
        if let Some(ms) = env_var::<u64>("JOBSNARE_BROWSER_LAUNCH_TIMEOUT_MS")? {
            settings.launch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_var::<u64>("JOBSNARE_BROWSER_STEP_TIMEOUT_MS")? {
            settings.step_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_var::<u64>("JOBSNARE_BROWSER_RETRY_DELAY_MS")? {
            settings.retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = env_var::<u32>("JOBSNARE_BROWSER_SCROLL_STEPS")? {
            settings.scroll_steps = n;
        }

        Ok(settings)
    }
}

// ---------------------------------------------------------------------------
// Shared browser session
// ---------------------------------------------------------------------------

struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// One Chromium process shared by every browser attempt in the process.
///
/// Launched lazily on first use. Each fetch runs in its own browser context
/// and [`shutdown`](Self::shutdown) tears the process down exactly once.
pub struct BrowserSession {
    settings: BrowserSettings,
    running: RwLock<Option<Running>>,
    closed: AtomicBool,
    active_contexts: AtomicUsize,
}

static GLOBAL_SESSION: OnceLock<Arc<BrowserSession>> = OnceLock::new();

impl BrowserSession {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            running: RwLock::new(None),
            closed: AtomicBool::new(false),
            active_contexts: AtomicUsize::new(0),
        }
    }

    /// The process-wide session. The first caller's settings win.
    pub fn global(settings: &BrowserSettings) -> Arc<Self> {
        Arc::clone(GLOBAL_SESSION.get_or_init(|| Arc::new(Self::new(settings.clone()))))
    }

    /// Shut down the process-wide session if it was ever created.
    pub async fn shutdown_global() {
        if let Some(session) = GLOBAL_SESSION.get() {
            session.shutdown().await;
        }
    }

    /// Number of browser contexts currently open.
    pub fn active_contexts(&self) -> usize {
        self.active_contexts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Borrow the browser, launching it on first use.
    ///
    /// The returned guard blocks [`shutdown`](Self::shutdown) until dropped.
    async fn browser(&self) -> Result<RwLockReadGuard<'_, Browser>, AppError> {
        if self.is_closed() {
            return Err(closed_error());
        }

        let guard = self.running.read().await;
        if let Ok(browser) = RwLockReadGuard::try_map(guard, |r| r.as_ref().map(|r| &r.browser)) {
            return Ok(browser);
        }

        let mut guard = self.running.write().await;
        if self.is_closed() {
            return Err(closed_error());
        }
        if guard.is_none() {
            *guard = Some(launch(&self.settings).await?);
        }

        RwLockReadGuard::try_map(guard.downgrade(), |r| r.as_ref().map(|r| &r.browser))
            .map_err(|_| AppError::BrowserError("browser unavailable after launch".into()))
    }

    /// Close the browser process. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = self.running.write().await.take();
        let Some(mut running) = running else {
            return;
        };

        tracing::info!(
            active_contexts = self.active_contexts(),
            "Shutting down browser"
        );
        match tokio::time::timeout(self.settings.step_timeout, running.browser.close()).await {
            Ok(Ok(_)) => {
                let _ = running.browser.wait().await;
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Browser close failed"),
            Err(_) => tracing::warn!("Browser close timed out"),
        }
        running.handler.abort();
    }
}

fn closed_error() -> AppError {
    AppError::BrowserError("browser session is shut down".into())
}

async fn launch(settings: &BrowserSettings) -> Result<Running, AppError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .disable_default_args()
        .viewport(Some(Viewport {
            width: VIEWPORT_WIDTH,
            height: VIEWPORT_HEIGHT,
            device_scale_factor: Some(1.0),
            ..Default::default()
        }))
        .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT);

    if let Some(bin) = settings.chrome_bin.clone().or_else(find_chrome_binary) {
        tracing::info!("Using Chrome binary: {}", bin.display());
        builder = builder.chrome_executable(bin);
    }
    if settings.headless {
        builder = builder.arg("--headless=new");
    } else {
        builder = builder.with_head();
    }

    let config = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-accelerated-2d-canvas")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--disable-translate")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--disable-renderer-backgrounding")
        .arg("--no-first-run")
        .arg("--no-zygote")
        .build()
        .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

    let (browser, mut handler) = tokio::time::timeout(settings.launch_timeout, Browser::launch(config))
        .await
        .map_err(|_| AppError::FetchTimeout(settings.launch_timeout.as_millis() as u64))?
        .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

    // The CDP handler must be polled continuously for the connection to work.
    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                tracing::warn!("Browser CDP handler error: {event:?}");
                break;
            }
        }
    });

    tracing::info!("Browser launched");
    Ok(Running { browser, handler })
}

/// Locate a Chrome/Chromium binary.
///
/// Snap-packaged Chromium exposes a wrapper that strips unknown flags, so
/// the real binary inside the snap is preferred. `None` lets chromiumoxide
/// do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

// ---------------------------------------------------------------------------
// Context guard
// ---------------------------------------------------------------------------

/// Owns one isolated browser context (and its page) for a single try.
///
/// Call [`close`](Self::close) on every path; if the guard is dropped
/// without it (e.g. the fetch future was cancelled) a background task
/// performs the cleanup instead.
struct ContextGuard {
    session: Arc<BrowserSession>,
    context_id: Option<BrowserContextId>,
    page: Option<Page>,
    interceptor: Option<JoinHandle<()>>,
}

impl ContextGuard {
    fn new(session: Arc<BrowserSession>, context_id: BrowserContextId) -> Self {
        session.active_contexts.fetch_add(1, Ordering::SeqCst);
        Self {
            session,
            context_id: Some(context_id),
            page: None,
            interceptor: None,
        }
    }

    async fn close(mut self, browser: &Browser) {
        let step = self.session.settings.step_timeout;
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        if let Some(page) = self.page.take() {
            if let Err(e) = tokio::time::timeout(step, page.close()).await {
                tracing::debug!(error = %e, "Page close timed out");
            }
        }
        if let Some(id) = self.context_id.take() {
            let disposed =
                tokio::time::timeout(step, browser.execute(DisposeBrowserContextParams::new(id)))
                    .await;
            if !matches!(disposed, Ok(Ok(_))) {
                tracing::debug!("Browser context dispose failed");
            }
            self.session.active_contexts.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        let page = self.page.take();
        let Some(id) = self.context_id.take() else {
            return;
        };

        let session = Arc::clone(&self.session);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            session.active_contexts.fetch_sub(1, Ordering::SeqCst);
            return;
        };
        runtime.spawn(async move {
            if let Some(page) = page {
                let _ = page.close().await;
            }
            let guard = session.running.read().await;
            if let Some(running) = guard.as_ref() {
                let _ = running
                    .browser
                    .execute(DisposeBrowserContextParams::new(id))
                    .await;
            }
            session.active_contexts.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

// ---------------------------------------------------------------------------
// BrowserFetcher
// ---------------------------------------------------------------------------

/// Headless-browser executor using Chromium via the Chrome DevTools Protocol.
///
/// Renders JavaScript before returning HTML, for SPA job boards and sites
/// that block plain HTTP clients. All clones share one [`BrowserSession`];
/// every try runs in a fresh incognito-like context with its own user agent.
///
/// # Example
///
/// ```rust,no_run
/// use jobsnare_client::{BrowserFetcher, BrowserSettings};
/// use jobsnare_core::models::{FetchService, FetchTrace, ScrapingConfig};
/// use jobsnare_core::traits::Fetcher;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = BrowserFetcher::new(BrowserSettings::default());
/// let config = ScrapingConfig::browser(1, 30_000, 1);
/// let mut trace = FetchTrace::new("https://example.com", FetchService::Browser);
/// let html = fetcher.fetch("https://example.com", &config, &mut trace).await?;
/// println!("{}", &html[..200]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserFetcher {
    session: Arc<BrowserSession>,
    settings: BrowserSettings,
}

impl BrowserFetcher {
    /// Fetcher backed by the process-wide session.
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            session: BrowserSession::global(&settings),
            settings,
        }
    }

    /// Fetcher backed by a caller-owned session.
    pub fn with_session(session: Arc<BrowserSession>, settings: BrowserSettings) -> Self {
        Self { session, settings }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    pub fn active_contexts(&self) -> usize {
        self.session.active_contexts()
    }

    /// One try: open a context, render, close the context.
    async fn render_once(
        &self,
        browser: &Browser,
        url: &str,
        config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        let step = self.settings.step_timeout;
        let created = with_timeout(step, "create context", async {
            browser.execute(CreateBrowserContextParams::default()).await
        })
        .await?;
        let mut guard = ContextGuard::new(Arc::clone(&self.session), created.result.browser_context_id.clone());

        let result = self.render_in_context(browser, &mut guard, url, config, trace).await;
        guard.close(browser).await;
        result
    }

    async fn render_in_context(
        &self,
        browser: &Browser,
        guard: &mut ContextGuard,
        url: &str,
        config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        let step = self.settings.step_timeout;
        let host = normalize_host(url).unwrap_or_default();
        let spa = is_spa_host(&host);

        let context_id = guard
            .context_id
            .clone()
            .ok_or_else(|| AppError::BrowserError("context already disposed".into()))?;
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(AppError::BrowserError)?;
        let page = with_timeout(step, "new page", browser.new_page(target)).await?;
        guard.page = Some(page.clone());

        let label = uuid::Uuid::new_v4().to_string();
        trace.context_id = Some(label.clone());
        let user_agent = random_user_agent();
        trace.user_agent = Some(user_agent.to_string());

        with_timeout(step, "page setup", prepare_page(&page, user_agent)).await?;

        let blocked = Arc::new(AtomicU64::new(0));
        guard.interceptor = Some(
            with_timeout(step, "request interception", intercept_requests(&page, spa, Arc::clone(&blocked)))
                .await?,
        );

        let nav_timeout = Duration::from_millis(config.timeout_ms.max(1));
        let nav_start = Instant::now();
        let navigated = tokio::time::timeout(nav_timeout, page.goto(url)).await;
        trace.navigation_ms = Some(nav_start.elapsed().as_millis() as u64);
        match navigated {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(AppError::BrowserError(format!("Failed to navigate to {url}: {e}")));
            }
            Err(_) => return Err(AppError::FetchTimeout(config.timeout_ms)),
        }

        wait_for_network_idle(&page, Duration::from_secs(10), trace).await;
        if !poll_until(&page, DOM_READY_JS, Duration::from_secs(5)).await {
            trace.readiness.push("dom-not-ready".into());
        }

        let plan = ReadinessPlan::for_host(&host);
        run_readiness(&page, &plan, trace).await;

        scroll_page(&page, self.settings.scroll_steps).await;

        let delay = human_delay(self.settings.human_delay_ms);
        trace.human_delay_ms = Some(delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if let Ok(Ok(Some(final_url))) = tokio::time::timeout(step, page.url()).await {
            trace.final_url = Some(final_url);
        }

        let html = with_timeout(step, "read content", page.content()).await?;
        trace.html_length = Some(html.len());
        trace.blocked_requests = Some(blocked.load(Ordering::Relaxed));

        if let Some(dir) = &self.settings.screenshot_dir {
            let path = dir.join(format!("{label}.png"));
            let shot = tokio::time::timeout(
                step,
                page.save_screenshot(ScreenshotParams::builder().build(), &path),
            )
            .await;
            match shot {
                Ok(Ok(_)) => trace.screenshot_path = Some(path.display().to_string()),
                _ => tracing::debug!(path = %path.display(), "Screenshot failed"),
            }
        }

        Ok(html)
    }
}

impl Fetcher for BrowserFetcher {
    async fn fetch(
        &self,
        url: &str,
        config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        let browser = match self.session.browser().await {
            Ok(b) => b,
            Err(e) => {
                trace.error_name = Some(e.kind().to_string());
                trace.error = Some(e.to_string());
                return Err(e);
            }
        };

        let tries = config.retries.max(1);
        let mut last_err = None;
        for attempt in 0..tries {
            trace.retries = attempt;
            if attempt > 0 {
                tokio::time::sleep(self.settings.retry_delay).await;
            }

            match self.render_once(&browser, url, config, trace).await {
                Ok(html) => {
                    trace.error_name = None;
                    trace.error = None;
                    tracing::debug!(url, bytes = html.len(), try_no = attempt + 1, "Browser render ok");
                    return Ok(html);
                }
                Err(e) => {
                    tracing::warn!(url, try_no = attempt + 1, tries, error = %e, "Browser render failed");
                    trace.error_name = Some(e.kind().to_string());
                    trace.error = Some(e.to_string());
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AppError::BrowserError("no render attempted".into())))
    }
}

async fn with_timeout<T, E, F>(budget: Duration, step: &str, fut: F) -> Result<T, AppError>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(AppError::BrowserError(format!("{step}: {e}"))),
        Err(_) => Err(AppError::FetchTimeout(budget.as_millis() as u64)),
    }
}

// ---------------------------------------------------------------------------
// Page preparation
// ---------------------------------------------------------------------------

const STEALTH_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
for (const key of Object.keys(window)) {
    if (key.startsWith('cdc_')) { try { delete window[key]; } catch (_) {} }
}
if (!window.chrome) {
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
}
"#;

/// Counts in-flight fetch/XHR calls so readiness checks can wait for the
/// app's own data requests to settle.
const REQUEST_TRACKER_JS: &str = r#"
(() => {
    window.__jsnPending = 0;
    window.__jsnLastActivity = Date.now();
    const begin = () => { window.__jsnPending++; window.__jsnLastActivity = Date.now(); };
    const end = () => { window.__jsnPending = Math.max(0, window.__jsnPending - 1); window.__jsnLastActivity = Date.now(); };
    const origFetch = window.fetch;
    if (origFetch) {
        window.fetch = function(...args) {
            begin();
            return origFetch.apply(this, args).finally(end);
        };
    }
    const origSend = XMLHttpRequest.prototype.send;
    XMLHttpRequest.prototype.send = function(...args) {
        begin();
        this.addEventListener('loadend', end, { once: true });
        return origSend.apply(this, args);
    };
})();
"#;

async fn prepare_page(page: &Page, user_agent: &str) -> Result<(), chromiumoxide::error::CdpError> {
    page.execute(SetUserAgentOverrideParams::new(user_agent)).await?;
    page.execute(SetTimezoneOverrideParams::new("America/New_York"))
        .await?;
    page.execute(SetLocaleOverrideParams {
        locale: Some("en-US".to_string()),
    })
    .await?;
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(serde_json::json!({
        "Accept-Language": "en-US,en;q=0.9",
        "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        "Sec-Fetch-Dest": "document",
        "Sec-Fetch-Mode": "navigate",
        "Sec-Fetch-Site": "none",
        "Sec-Fetch-User": "?1",
        "Cache-Control": "max-age=0",
        "Upgrade-Insecure-Requests": "1",
    }))))
    .await?;
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
        .await?;
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(REQUEST_TRACKER_JS))
        .await?;
    Ok(())
}

/// Pause every request and either fail or continue it. Returns the task
/// answering the paused requests.
async fn intercept_requests(
    page: &Page,
    spa: bool,
    blocked: Arc<AtomicU64>,
) -> Result<JoinHandle<()>, chromiumoxide::error::CdpError> {
    let mut events = page.event_listener::<EventRequestPaused>().await?;
    let responder = page.clone();

    let task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let kind = ResourceKind::from(&event.resource_type);
            let outcome = if should_block(kind, &event.request.url, spa) {
                blocked.fetch_add(1, Ordering::Relaxed);
                responder
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
            } else {
                responder
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ())
            };
            if let Err(e) = outcome {
                tracing::trace!(error = %e, "Paused request not answered");
            }
        }
    });

    page.execute(EnableParams::default()).await?;
    Ok(task)
}

// ---------------------------------------------------------------------------
// Request blocking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceKind {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Xhr,
    Fetch,
    Other,
}

impl From<&ResourceType> for ResourceKind {
    fn from(value: &ResourceType) -> Self {
        match value {
            ResourceType::Document => ResourceKind::Document,
            ResourceType::Script => ResourceKind::Script,
            ResourceType::Stylesheet => ResourceKind::Stylesheet,
            ResourceType::Image => ResourceKind::Image,
            ResourceType::Font => ResourceKind::Font,
            ResourceType::Media => ResourceKind::Media,
            ResourceType::Xhr => ResourceKind::Xhr,
            ResourceType::Fetch => ResourceKind::Fetch,
            _ => ResourceKind::Other,
        }
    }
}

fn is_spa_host(host: &str) -> bool {
    SPA_HOSTS.iter().any(|h| host.contains(h))
}

/// Images, fonts and media are dropped. On SPA hosts, scripts, styles,
/// XHR/fetch and anything that looks like an API or GraphQL call always pass.
pub(crate) fn should_block(kind: ResourceKind, url: &str, spa: bool) -> bool {
    if spa {
        let lower = url.to_ascii_lowercase();
        let app_traffic = matches!(
            kind,
            ResourceKind::Script | ResourceKind::Stylesheet | ResourceKind::Xhr | ResourceKind::Fetch
        ) || lower.contains("/api/")
            || lower.contains("graphql");
        if app_traffic {
            return false;
        }
    }
    matches!(kind, ResourceKind::Image | ResourceKind::Font | ResourceKind::Media)
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

const DOM_READY_JS: &str = "document.readyState !== 'loading'";

const FRAMEWORK_ROOT_JS: &str = r#"(() => {
    const root = document.querySelector('#__next, #root, #app, [data-reactroot]');
    return !!root && root.children.length > 0 && (root.innerText || '').trim().length > 0;
})()"#;

const NETWORK_SETTLED_JS: &str = r#"(() => {
    const pending = window.__jsnPending || 0;
    const last = window.__jsnLastActivity || 0;
    return pending === 0 && Date.now() - last > 500;
})()"#;

const BODY_TEXT_JS: &str =
    "((document.body && document.body.innerText) || '').trim().length > 500";

const LINKEDIN_NUDGE_JS: &str = "window.scrollBy(0, 500); window.scrollBy(0, -250); true";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReadinessCheck {
    /// Framework mount point exists and has rendered text.
    FrameworkRoot { budget: Duration },
    /// No tracked fetch/XHR in flight for 500ms.
    NetworkSettled { budget: Duration },
    /// Any selector matches an element with at least `min_chars` of text.
    Content {
        selectors: &'static [&'static str],
        min_chars: usize,
        budget: Duration,
    },
}

/// Per-host sequence of readiness checks, each with its own budget.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReadinessPlan {
    pub checks: Vec<ReadinessCheck>,
    /// Nudge the scroll position after the checks to trigger lazy content.
    pub scroll_nudge: bool,
    pub generic_budget: Duration,
}

impl ReadinessPlan {
    pub(crate) fn for_host(host: &str) -> Self {
        let generic_budget = Duration::from_secs(5);

        if host.contains("linkedin.com") {
            return Self {
                checks: vec![ReadinessCheck::Content {
                    selectors: &[".jobs-description", ".job-details", "[class*=\"description\"]"],
                    min_chars: 50,
                    budget: Duration::from_secs(10),
                }],
                scroll_nudge: true,
                generic_budget,
            };
        }

        if is_spa_host(host) {
            return Self {
                checks: vec![
                    ReadinessCheck::FrameworkRoot {
                        budget: Duration::from_secs(10),
                    },
                    ReadinessCheck::NetworkSettled {
                        budget: Duration::from_secs(8),
                    },
                    ReadinessCheck::Content {
                        selectors: &[
                            "h1",
                            "[class*=\"job-title\"]",
                            "[class*=\"jobTitle\"]",
                            "[class*=\"description\"]",
                            "main",
                        ],
                        min_chars: 20,
                        budget: Duration::from_secs(20),
                    },
                ],
                scroll_nudge: false,
                generic_budget,
            };
        }

        Self {
            checks: Vec::new(),
            scroll_nudge: false,
            generic_budget,
        }
    }
}

impl ReadinessCheck {
    fn label(&self) -> &'static str {
        match self {
            ReadinessCheck::FrameworkRoot { .. } => "framework-root",
            ReadinessCheck::NetworkSettled { .. } => "network-settled",
            ReadinessCheck::Content { .. } => "content-selectors",
        }
    }

    fn budget(&self) -> Duration {
        match self {
            ReadinessCheck::FrameworkRoot { budget }
            | ReadinessCheck::NetworkSettled { budget }
            | ReadinessCheck::Content { budget, .. } => *budget,
        }
    }

    fn script(&self) -> String {
        match self {
            ReadinessCheck::FrameworkRoot { .. } => FRAMEWORK_ROOT_JS.to_string(),
            ReadinessCheck::NetworkSettled { .. } => NETWORK_SETTLED_JS.to_string(),
            ReadinessCheck::Content {
                selectors,
                min_chars,
                ..
            } => {
                let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".into());
                format!(
                    "({list}).some(s => {{ const el = document.querySelector(s); \
                     return !!el && (el.innerText || '').trim().length >= {min_chars}; }})"
                )
            }
        }
    }
}

/// Run the plan, recording one note per check. Falls through to the
/// generic body-text wait when the plan has no checks or none passed.
async fn run_readiness(page: &Page, plan: &ReadinessPlan, trace: &mut FetchTrace) {
    let mut any_ready = false;
    for check in &plan.checks {
        let started = Instant::now();
        let ok = poll_until(page, &check.script(), check.budget()).await;
        any_ready |= ok;
        trace.readiness.push(format!(
            "{}:{}:{}ms",
            check.label(),
            if ok { "ok" } else { "timeout" },
            started.elapsed().as_millis()
        ));
    }

    if plan.scroll_nudge {
        let _ = tokio::time::timeout(POLL_EVAL_TIMEOUT, page.evaluate(LINKEDIN_NUDGE_JS)).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }

    if !any_ready {
        let ok = poll_until(page, BODY_TEXT_JS, plan.generic_budget).await;
        trace
            .readiness
            .push(format!("body-text:{}", if ok { "ok" } else { "timeout" }));
    }
}

/// Evaluate a boolean expression until it is true or the budget runs out.
async fn poll_until(page: &Page, js: &str, budget: Duration) -> bool {
    let deadline = Instant::now() + budget;
    loop {
        let ok = match tokio::time::timeout(POLL_EVAL_TIMEOUT, page.evaluate(js)).await {
            Ok(Ok(result)) => result.into_value::<bool>().unwrap_or(false),
            _ => false,
        };
        if ok {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Resource-count heuristic for "network idle": document complete and no
/// new resource entries for one second.
async fn wait_for_network_idle(page: &Page, timeout: Duration, trace: &mut FetchTrace) {
    let timeout_ms = timeout.as_millis() as u64;
    let js = format!(
        r#"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = 1000;
            const interval = 250;
            const start = Date.now();
            let lastCount = performance.getEntriesByType('resource').length;
            let stableMs = 0;
            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                const curCount = performance.getEntriesByType('resource').length;
                if (document.readyState === 'complete' && curCount === lastCount) {{
                    stableMs += interval;
                    if (stableMs >= idleMs) return true;
                }} else {{
                    stableMs = 0;
                }}
                lastCount = curCount;
            }}
            return false;
        }})()"#
    );

    let idle = match tokio::time::timeout(timeout + POLL_EVAL_TIMEOUT, page.evaluate(js)).await {
        Ok(Ok(result)) => result.into_value::<bool>().unwrap_or(false),
        _ => false,
    };
    if !idle {
        trace.readiness.push("network-idle:timeout".into());
    }
}

/// Smooth-scroll down a bounded number of viewports, then back to the top.
async fn scroll_page(page: &Page, steps: u32) {
    if steps == 0 {
        return;
    }
    let js = format!(
        r#"(async () => {{
            for (let i = 0; i < {steps}; i++) {{
                window.scrollBy({{ top: window.innerHeight * 0.8, behavior: 'smooth' }});
                await new Promise(r => setTimeout(r, 300));
            }}
            window.scrollTo({{ top: 0, behavior: 'smooth' }});
            return true;
        }})()"#
    );
    let budget = Duration::from_millis(300 * u64::from(steps)) + POLL_EVAL_TIMEOUT;
    if tokio::time::timeout(budget, page.evaluate(js)).await.is_err() {
        tracing::debug!("Scroll timed out");
    }
}

fn human_delay((min, max): (u64, u64)) -> u64 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}
