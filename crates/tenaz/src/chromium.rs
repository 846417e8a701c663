//! Chromium backend for [`RemotePage`](crate::page::RemotePage).
//!
//! When compiled with the `browser` feature, [`ChromiumPage`] drives a real
//! Chromium over the DevTools protocol via chromiumoxide. Element handles are
//! tagged in the DOM with a `data-tenaz-id` attribute so they survive across
//! evaluations; a handle whose node was removed reports
//! [`ElementState::DETACHED`](crate::page::ElementState::DETACHED).
//!
//! Candidate queries are compiled to JavaScript by
//! [`Candidate::to_js`](crate::locator::Candidate::to_js) and evaluated on top
//! of a small prelude (`window.__tenaz`) that knows implicit ARIA roles,
//! accessible names and innermost-text filtering.

use std::time::Duration;
use tokio::time::Instant;

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// In-page helpers shared by every evaluation. Installed lazily because a
/// navigation discards the previous window.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) const PRELUDE: &str = r#"
if (!window.__tenaz) {
  const norm = (s) => String(s || '').replace(/\s+/g, ' ').trim();
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'button' || (tag === 'input' && (type === 'button' || type === 'submit'))) return 'button';
    if (tag === 'a') return 'link';
    if (tag === 'input' && type === 'checkbox') return 'checkbox';
    if (tag === 'input' && type === 'radio') return 'radio';
    if (tag === 'input' || tag === 'textarea') return 'textbox';
    if (tag === 'select') return 'combobox';
    if (tag === 'option') return 'option';
    if (tag === 'table') return 'table';
    if (tag === 'tr') return 'row';
    if (tag === 'td') return 'cell';
    if (tag === 'th') return 'columnheader';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'dialog') return 'dialog';
    return '';
  };
  let counter = 0;
  window.__tenaz = {
    text: (el) => norm(el.innerText !== undefined ? el.innerText : el.textContent),
    role: (el) => el.getAttribute('role') || implicitRole(el),
    name: (el) => el.getAttribute('aria-label') || window.__tenaz.text(el),
    match: (text, m) => {
      const t = norm(text);
      if (m.kind === 'exact') return t.toLowerCase() === norm(m.value).toLowerCase();
      if (m.kind === 'contains') return t.toLowerCase().includes(norm(m.value).toLowerCase());
      let src = m.value;
      let flags = '';
      if (src.startsWith('(?i)')) { src = src.slice(4); flags = 'i'; }
      return new RegExp(src, flags).test(t);
    },
    uniq: (els) => {
      const seen = new Set(els);
      return Array.from(seen).sort((a, b) =>
        a === b ? 0 : (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING ? -1 : 1));
    },
    innermost: (els) => els.filter((el) => !els.some((o) => o !== el && el.contains(o))),
    ref: (el) => {
      let id = el.getAttribute('data-tenaz-id');
      if (!id) {
        counter += 1;
        id = window.__tenazPrefix + '-' + counter;
        el.setAttribute('data-tenaz-id', id);
      }
      return { id: id, tag_name: el.tagName.toLowerCase() };
    },
    get: (id) => document.querySelector('[data-tenaz-id="' + id + '"]'),
    must: (id) => {
      const el = window.__tenaz.get(id);
      if (!el) throw new Error('element ' + id + ' is detached');
      return el;
    },
    visible: (el) => {
      if (!el.isConnected) return false;
      const style = getComputedStyle(el);
      if (style.visibility === 'hidden' || style.display === 'none') return false;
      const rect = el.getBoundingClientRect();
      return rect.width > 0 && rect.height > 0;
    },
    enabled: (el) => !el.matches(':disabled') && !el.closest('[aria-disabled="true"]'),
    state: (el) => ({
      attached: el.isConnected,
      visible: window.__tenaz.visible(el),
      enabled: window.__tenaz.enabled(el),
      checked: el.checked === true || el.getAttribute('aria-checked') === 'true',
      selected: el.selected === true || el.getAttribute('aria-selected') === 'true',
    }),
    point: (el, strict) => {
      el.scrollIntoView({ block: 'center', inline: 'center' });
      const rect = el.getBoundingClientRect();
      const x = rect.left + rect.width / 2;
      const y = rect.top + rect.height / 2;
      if (strict) {
        if (!window.__tenaz.visible(el)) throw new Error('element is not visible');
        if (!window.__tenaz.enabled(el)) throw new Error('element is disabled');
        const hit = document.elementFromPoint(x, y);
        if (hit && hit !== el && !el.contains(hit)) {
          throw new Error('element is obscured by <' + hit.tagName.toLowerCase() + '>');
        }
      }
      return { x: x, y: y };
    },
    setProp: (el, prop, value) => {
      const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), prop);
      if (desc && desc.set) { desc.set.call(el, value); } else { el[prop] = value; }
    },
    fire: (el, name) => el.dispatchEvent(new Event(name, { bubbles: true })),
  };
}
"#;

/// Wrap `body` into a self-contained expression. The body's return value
/// comes back boxed as `{ value }` so that `null` survives the protocol.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn script(prefix: &str, body: &str) -> String {
    format!(
        "(() => {{ window.__tenazPrefix = window.__tenazPrefix || {}; {PRELUDE} \
         const out = (() => {{ {body} }})(); return {{ value: out === undefined ? null : out }}; }})()",
        js_literal(prefix)
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn js_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Network idleness as seen from repeated `(readyState, resource count)`
/// samples: the page counts as idle once it has been loaded with an unchanged
/// resource count for `quiet`.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdleTracker {
    quiet: Duration,
    last: Option<u64>,
    quiet_since: Instant,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl IdleTracker {
    pub(crate) fn new(quiet: Duration, now: Instant) -> Self {
        Self {
            quiet,
            last: None,
            quiet_since: now,
        }
    }

    /// Record one sample; true once the page has been quiet long enough
    pub(crate) fn observe(&mut self, ready: bool, resources: u64, now: Instant) -> bool {
        if !ready || self.last != Some(resources) {
            self.last = Some(resources);
            self.quiet_since = now;
            return false;
        }
        now.duration_since(self.quiet_since) >= self.quiet
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
pub use cdp::{ChromiumBrowser, ChromiumPage};

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]
mod cdp {
    use super::{js_literal, script, BrowserConfig, IdleTracker};
    use crate::locator::Candidate;
    use crate::page::{ClickMode, DomEvent, ElementRef, ElementState, RemotePage, Screenshot};
    use crate::result::{TenazError, TenazResult};
    use crate::wait::{poll_for, PollOptions};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, InsertTextParams, MouseButton,
    };
    use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
    use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use serde::Deserialize;
    use std::sync::{Arc, PoisonError};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::time::Instant;
    use tracing::{debug, info};

    const IDLE_QUIET: Duration = Duration::from_millis(500);
    const IDLE_POLL_MS: u64 = 100;

    /// Browser instance with real CDP connection
    #[derive(Debug)]
    pub struct ChromiumBrowser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumBrowser {
        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> TenazResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder
                .build()
                .map_err(|message| TenazError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| TenazError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            info!(headless = config.headless, "chromium launched");
            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Open a blank page
        ///
        /// # Errors
        ///
        /// Returns error if page cannot be created
        pub async fn new_page(&self) -> TenazResult<ChromiumPage> {
            let browser = self.inner.lock().await;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| TenazError::page(e.to_string()))?;
            Ok(ChromiumPage {
                inner: Arc::new(Mutex::new(page)),
                prefix: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
                width: self.config.viewport_width,
                height: self.config.viewport_height,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(self) -> TenazResult<()> {
            let mut browser = self.inner.lock().await;
            browser
                .close()
                .await
                .map_err(|e| TenazError::BrowserLaunch {
                    message: e.to_string(),
                })?;
            self.handle.abort();
            Ok(())
        }
    }

    /// A browser tab driven over CDP
    #[derive(Debug, Clone)]
    pub struct ChromiumPage {
        inner: Arc<Mutex<CdpPage>>,
        prefix: String,
        width: u32,
        height: u32,
    }

    #[derive(Debug, Deserialize)]
    struct Boxed<T> {
        value: T,
    }

    #[derive(Debug, Deserialize)]
    struct Point {
        x: f64,
        y: f64,
    }

    #[derive(Debug, Deserialize)]
    struct LoadState {
        ready: bool,
        resources: u64,
    }

    impl ChromiumPage {
        async fn eval<T: DeserializeOwned>(&self, body: &str) -> TenazResult<T> {
            let page = self.inner.lock().await;
            let boxed: Boxed<T> = page
                .evaluate(script(&self.prefix, body))
                .await
                .map_err(|e| TenazError::page(e.to_string()))?
                .into_value()
                .map_err(|e| TenazError::page(e.to_string()))?;
            Ok(boxed.value)
        }

        async fn eval_unit(&self, body: &str) -> TenazResult<()> {
            let _: serde_json::Value = self.eval(body).await?;
            Ok(())
        }

        fn must(element: &ElementRef) -> String {
            format!("const el = window.__tenaz.must({});", js_literal(&element.id))
        }

        async fn point(&self, element: &ElementRef, mode: ClickMode) -> TenazResult<Point> {
            self.eval(&format!(
                "{} return window.__tenaz.point(el, {});",
                Self::must(element),
                mode == ClickMode::Standard
            ))
            .await
        }

        async fn mouse(&self, kind: DispatchMouseEventType, at: &Point) -> TenazResult<()> {
            let params = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(at.x)
                .y(at.y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(TenazError::page)?;
            let page = self.inner.lock().await;
            page.execute(params)
                .await
                .map_err(|e| TenazError::page(e.to_string()))?;
            Ok(())
        }

        async fn key(&self, kind: DispatchKeyEventType, key: &str) -> TenazResult<()> {
            let params = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key)
                .build()
                .map_err(TenazError::page)?;
            let page = self.inner.lock().await;
            page.execute(params)
                .await
                .map_err(|e| TenazError::page(e.to_string()))?;
            Ok(())
        }
    }

    #[async_trait]
    impl RemotePage for ChromiumPage {
        async fn query_all(
            &self,
            candidate: &Candidate,
            scope: Option<&ElementRef>,
        ) -> TenazResult<Vec<ElementRef>> {
            let root = scope.map_or_else(
                || "document".to_string(),
                |s| format!("window.__tenaz.get({})", js_literal(&s.id)),
            );
            self.eval(&format!(
                "const root = {root}; if (!root) return []; return ({}).map(window.__tenaz.ref);",
                candidate.to_js("root")
            ))
            .await
        }

        async fn state(&self, element: &ElementRef) -> TenazResult<ElementState> {
            let state: Option<ElementState> = self
                .eval(&format!(
                    "const el = window.__tenaz.get({}); return el ? window.__tenaz.state(el) : null;",
                    js_literal(&element.id)
                ))
                .await?;
            Ok(state.unwrap_or(ElementState::DETACHED))
        }

        async fn text(&self, element: &ElementRef) -> TenazResult<String> {
            self.eval(&format!("{} return window.__tenaz.text(el);", Self::must(element)))
                .await
        }

        async fn attribute(&self, element: &ElementRef, name: &str) -> TenazResult<Option<String>> {
            self.eval(&format!(
                "{} return el.getAttribute({});",
                Self::must(element),
                js_literal(name)
            ))
            .await
        }

        async fn value(&self, element: &ElementRef) -> TenazResult<String> {
            self.eval(&format!(
                "{} return el.value === undefined || el.value === null ? '' : String(el.value);",
                Self::must(element)
            ))
            .await
        }

        async fn parent(&self, element: &ElementRef) -> TenazResult<Option<ElementRef>> {
            self.eval(&format!(
                "{} const p = el.parentElement; return p && p !== document.documentElement ? window.__tenaz.ref(p) : null;",
                Self::must(element)
            ))
            .await
        }

        async fn next_sibling(&self, element: &ElementRef) -> TenazResult<Option<ElementRef>> {
            self.eval(&format!(
                "{} const s = el.nextElementSibling; return s ? window.__tenaz.ref(s) : null;",
                Self::must(element)
            ))
            .await
        }

        async fn follows(&self, element: &ElementRef, reference: &ElementRef) -> TenazResult<bool> {
            self.eval(&format!(
                "{} const r = window.__tenaz.must({}); return (r.compareDocumentPosition(el) & Node.DOCUMENT_POSITION_FOLLOWING) !== 0;",
                Self::must(element),
                js_literal(&reference.id)
            ))
            .await
        }

        async fn click(&self, element: &ElementRef, mode: ClickMode) -> TenazResult<()> {
            let at = self.point(element, mode).await?;
            self.mouse(DispatchMouseEventType::MouseMoved, &at).await?;
            self.mouse(DispatchMouseEventType::MousePressed, &at).await?;
            self.mouse(DispatchMouseEventType::MouseReleased, &at).await
        }

        async fn fill(&self, element: &ElementRef, value: &str, mode: ClickMode) -> TenazResult<()> {
            let _ = self.point(element, mode).await?;
            self.eval_unit(&format!(
                "{} el.focus(); if ('value' in el) {{ window.__tenaz.setProp(el, 'value', ''); window.__tenaz.fire(el, 'input'); }}",
                Self::must(element)
            ))
            .await?;
            if value.is_empty() {
                return Ok(());
            }
            let page = self.inner.lock().await;
            page.execute(InsertTextParams::new(value))
                .await
                .map_err(|e| TenazError::page(e.to_string()))?;
            Ok(())
        }

        async fn select_option(
            &self,
            element: &ElementRef,
            value: &str,
            mode: ClickMode,
        ) -> TenazResult<()> {
            let _ = self.point(element, mode).await?;
            self.eval_unit(&format!(
                "{} const want = {}; \
                 const opt = Array.from(el.options || []).find(o => o.value === want || window.__tenaz.text(o) === want); \
                 if (!opt) throw new Error('no option ' + want); \
                 el.value = opt.value; window.__tenaz.fire(el, 'input'); window.__tenaz.fire(el, 'change');",
                Self::must(element),
                js_literal(value)
            ))
            .await
        }

        async fn set_value(&self, element: &ElementRef, value: &str) -> TenazResult<()> {
            self.eval_unit(&format!(
                "{} window.__tenaz.setProp(el, 'value', {});",
                Self::must(element),
                js_literal(value)
            ))
            .await
        }

        async fn set_checked(&self, element: &ElementRef, checked: bool) -> TenazResult<()> {
            self.eval_unit(&format!(
                "{} window.__tenaz.setProp(el, 'checked', {checked});",
                Self::must(element)
            ))
            .await
        }

        async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> TenazResult<()> {
            let body = match event {
                DomEvent::Click => {
                    "el.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true }));"
                        .to_string()
                }
                other => format!("window.__tenaz.fire(el, {});", js_literal(other.as_str())),
            };
            self.eval_unit(&format!("{} {body}", Self::must(element)))
                .await
        }

        async fn press_key(&self, key: &str) -> TenazResult<()> {
            self.key(DispatchKeyEventType::KeyDown, key).await?;
            self.key(DispatchKeyEventType::KeyUp, key).await
        }

        async fn navigate(&self, url: &str) -> TenazResult<()> {
            let page = self.inner.lock().await;
            page.goto(url).await.map_err(|e| TenazError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(())
        }

        async fn current_url(&self) -> TenazResult<String> {
            let page = self.inner.lock().await;
            Ok(page
                .url()
                .await
                .map_err(|e| TenazError::page(e.to_string()))?
                .unwrap_or_default())
        }

        async fn wait_for_network_idle(&self, timeout: Duration) -> TenazResult<()> {
            let tracker = std::sync::Mutex::new(IdleTracker::new(IDLE_QUIET, Instant::now()));
            let options = PollOptions::new(timeout.as_millis() as u64, IDLE_POLL_MS);
            let polled = poll_for(&options, || async {
                let load: LoadState = match self
                    .eval(
                        "return { ready: document.readyState === 'complete', \
                         resources: performance.getEntriesByType('resource').length };",
                    )
                    .await
                {
                    Ok(load) => load,
                    Err(e) => return Some(Err(e)),
                };
                let idle = tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .observe(load.ready, load.resources, Instant::now());
                idle.then(|| {
                    debug!(resources = load.resources, "network idle");
                    Ok(())
                })
            })
            .await;
            polled.value.unwrap_or_else(|| {
                Err(TenazError::page(format!(
                    "network not idle after {}ms",
                    timeout.as_millis()
                )))
            })
        }

        async fn screenshot(&self) -> TenazResult<Screenshot> {
            let page = self.inner.lock().await;
            let data = page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .build(),
                )
                .await
                .map_err(|e| TenazError::page(e.to_string()))?;
            Ok(Screenshot::new(data, self.width, self.height))
        }
    }
}
