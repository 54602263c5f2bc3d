//! `BrowserDriver` over a real Chrome, via `headless_chrome`.
//!
//! Locators are resolved in the page by a small JS matcher. Operations that
//! need genuine input events (click, hover, file inputs) tag the matched
//! element with a one-off attribute and hand it to the native element API.

use anyhow::{Context, Result, anyhow, bail};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::{Value, json};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::playback::driver::{
    BoundingBox, BrowserDriver, Locator, LocatorStrategy, TextStrategy, WaitState,
};
use crate::spec::{Resolution, WaitUntil};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TAG_ATTR: &str = "data-dm-locator";

#[derive(Debug, Clone, Default)]
pub struct ChromeConfig {
    pub headed: bool,
    /// Explicit Chrome binary; otherwise well-known install paths are tried.
    pub chrome_path: Option<PathBuf>,
    /// DevTools websocket URL of an already running Chrome.
    pub attach: Option<String>,
    pub resolution: Resolution,
}

/// Keeps the browser process alive for as long as the tab is in use.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(config: &ChromeConfig) -> Result<Self> {
        if let Some(ws) = &config.attach {
            info!(url = %ws, "attaching to running Chrome");
            let browser = Browser::connect(ws.clone())
                .with_context(|| format!("could not attach to Chrome at {ws}"))?;
            let tab = browser.new_tab()?;
            return Ok(Self {
                _browser: browser,
                tab,
            });
        }

        let chrome_path = match &config.chrome_path {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };
        let window_size = format!(
            "--window-size={},{}",
            config.resolution.width, config.resolution.height
        );
        let options = LaunchOptions {
            headless: !config.headed,
            path: Some(chrome_path),
            window_size: Some((config.resolution.width, config.resolution.height)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--hide-scrollbars"),
                OsStr::new(&window_size),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        info!(headless = options.headless, "starting Chrome");
        let browser = Browser::new(options).map_err(|e| anyhow!("browser launch failed: {e}"))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        debug!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub fn driver(&self) -> ChromeDriver {
        ChromeDriver {
            tab: self.tab.clone(),
            tag_seq: 0,
        }
    }
}

fn find_chrome() -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    if let Some(local) = dirs::data_local_dir() {
        candidates.push(local.join(r"Google\Chrome\Application\chrome.exe"));
    }

    candidates
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Chrome executable not found; pass --chrome <path>"))
}

pub struct ChromeDriver {
    tab: Arc<Tab>,
    tag_seq: u64,
}

impl ChromeDriver {
    fn eval(&self, script: &str) -> Result<Value> {
        let result = self.tab.evaluate(script, false)?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    /// Runs `body` with `el` bound to the matched element (or null).
    fn on_element(&self, locator: &Locator, body: &str) -> Result<Value> {
        let script = format!(
            "(() => {{ const el = ({RESOLVE_JS})({spec}); {body} }})()",
            spec = locator_json(locator)
        );
        self.eval(&script)
    }

    fn require(&self, locator: &Locator, body: &str) -> Result<Value> {
        let value = self.on_element(locator, &format!("if (!el) return {{ missing: true }}; {body}"))?;
        if value.get("missing").is_some() {
            bail!("no element matches {}", describe(locator));
        }
        Ok(value)
    }

    /// Marks the match with a fresh attribute and returns a CSS selector for it.
    fn tag(&mut self, locator: &Locator) -> Result<String> {
        self.tag_seq += 1;
        let token = format!("dm{}", self.tag_seq);
        self.require(
            locator,
            &format!("el.setAttribute('{TAG_ATTR}', '{token}'); return true;"),
        )?;
        Ok(format!("[{TAG_ATTR}='{token}']"))
    }

    fn poll<F>(&mut self, timeout: Duration, what: impl Fn() -> String, mut ready: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<bool>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if ready(self)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("timed out after {}ms waiting for {}", timeout.as_millis(), what());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn wait_ready_state(&mut self, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
        let wanted = match wait_until {
            WaitUntil::DomContentLoaded => "document.readyState !== 'loading'",
            WaitUntil::Load | WaitUntil::NetworkIdle => "document.readyState === 'complete'",
        };
        self.poll(
            timeout,
            || "page load".to_string(),
            |d| Ok(d.eval(wanted)?.as_bool().unwrap_or(false)),
        )?;
        if wait_until == WaitUntil::NetworkIdle {
            // No network-idle signal without CDP network tracking; approximate with a quiet period.
            std::thread::sleep(Duration::from_millis(500));
        }
        Ok(())
    }

    fn history(&mut self, script: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.eval(script)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }
}

impl BrowserDriver for ChromeDriver {
    fn goto(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .with_context(|| format!("navigation to {url} failed"))?;
        self.tab.wait_until_navigated()?;
        self.wait_ready_state(wait_until, timeout)
    }

    fn go_back(&mut self, timeout: Duration) -> Result<()> {
        self.history("history.back()", timeout)
    }

    fn go_forward(&mut self, timeout: Duration) -> Result<()> {
        self.history("history.forward()", timeout)
    }

    fn wait_for(&mut self, locator: &Locator, state: WaitState, timeout: Duration) -> Result<()> {
        let check = match state {
            WaitState::Attached => "return !!el;",
            WaitState::Visible => "return !!el && isVisible(el);",
            WaitState::Hidden => "return !el || !isVisible(el);",
        };
        self.poll(
            timeout,
            || format!("{} to be {state}", describe(locator)),
            |d| Ok(d.on_element(locator, check)?.as_bool().unwrap_or(false)),
        )
    }

    fn scroll_into_view(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        self.wait_for(locator, WaitState::Attached, timeout)?;
        self.require(
            locator,
            "const r = el.getBoundingClientRect();
             const inView = r.top >= 0 && r.left >= 0 && r.bottom <= innerHeight && r.right <= innerWidth;
             if (!inView) el.scrollIntoView({ block: 'center', inline: 'center' });
             return true;",
        )?;
        Ok(())
    }

    fn bounding_box(&mut self, locator: &Locator) -> Result<Option<BoundingBox>> {
        let value = self.on_element(
            locator,
            "if (!el) return null;
             const r = el.getBoundingClientRect();
             if (r.width === 0 && r.height === 0) return null;
             return { x: r.x, y: r.y, width: r.width, height: r.height };",
        )?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    fn text_content(&mut self, locator: &Locator) -> Result<Option<String>> {
        let value = self.on_element(locator, "return el ? el.textContent : null;")?;
        Ok(value.as_str().map(String::from))
    }

    fn is_visible(&mut self, locator: &Locator) -> Result<bool> {
        let value = self.on_element(locator, "return !!el && isVisible(el);")?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let selector = self.tag(locator)?;
        self.tab
            .wait_for_element_with_custom_timeout(&selector, timeout)?
            .click()
            .with_context(|| format!("click on {} failed", describe(locator)))?;
        Ok(())
    }

    fn hover(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let selector = self.tag(locator)?;
        self.tab
            .wait_for_element_with_custom_timeout(&selector, timeout)?
            .move_mouse_over()?;
        Ok(())
    }

    fn fill(&mut self, locator: &Locator, value: &str, _timeout: Duration) -> Result<()> {
        self.require(
            locator,
            &format!(
                "el.focus(); el.value = {v};
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                 return true;",
                v = json!(value)
            ),
        )?;
        Ok(())
    }

    fn set_checked(&mut self, locator: &Locator, checked: bool, _timeout: Duration) -> Result<()> {
        let settled = self.require(
            locator,
            &format!("if (el.checked !== {checked}) el.click(); return el.checked === {checked};"),
        )?;
        confirm_checked(&settled, checked, locator)
    }

    fn select_option(&mut self, locator: &Locator, option: &str, _timeout: Duration) -> Result<()> {
        let found = self.require(
            locator,
            &format!(
                "const want = {o};
                 const opt = [...el.options].find(o => o.value === want || o.label.trim() === want);
                 if (!opt) return false;
                 el.value = opt.value;
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                 return true;",
                o = json!(option)
            ),
        )?;
        if found.as_bool() != Some(true) {
            bail!("option \"{option}\" not found in {}", describe(locator));
        }
        Ok(())
    }

    fn set_input_files(&mut self, locator: &Locator, files: &[PathBuf], timeout: Duration) -> Result<()> {
        let selector = self.tag(locator)?;
        let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        self.tab
            .wait_for_element_with_custom_timeout(&selector, timeout)?
            .set_input_files(&refs)?;
        Ok(())
    }

    fn drag_to(&mut self, from: &Locator, to: &Locator, _timeout: Duration) -> Result<()> {
        let script = format!(
            "(() => {{
               const resolve = {RESOLVE_JS};
               const src = resolve({from}), dst = resolve({to});
               if (!src || !dst) return false;
               const dt = new DataTransfer();
               const fire = (el, type) => el.dispatchEvent(new DragEvent(type, {{ bubbles: true, cancelable: true, dataTransfer: dt }}));
               fire(src, 'dragstart'); fire(dst, 'dragenter'); fire(dst, 'dragover');
               fire(dst, 'drop'); fire(src, 'dragend');
               return true;
             }})()",
            from = locator_json(from),
            to = locator_json(to),
        );
        if self.eval(&script)?.as_bool() != Some(true) {
            bail!("drag from {} to {} failed: endpoint not found", describe(from), describe(to));
        }
        Ok(())
    }

    fn scroll_element_by(&mut self, locator: &Locator, dx: f64, dy: f64) -> Result<()> {
        self.require(
            locator,
            &format!("el.scrollBy({{ left: {dx}, top: {dy}, behavior: 'smooth' }}); return true;"),
        )?;
        Ok(())
    }

    fn evaluate(&mut self, script: &str) -> Result<Value> {
        self.eval(script)
    }

    fn add_style_tag(&mut self, css: &str) -> Result<()> {
        self.eval(&format!(
            "(() => {{ const s = document.createElement('style'); s.textContent = {css};
               (document.head || document.documentElement).appendChild(s); return true; }})()",
            css = json!(css)
        ))?;
        Ok(())
    }

    fn screenshot(&mut self, path: Option<&Path>) -> Result<Vec<u8>> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
        if let Some(path) = path {
            std::fs::write(path, &png)
                .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        }
        Ok(png)
    }

    fn content(&mut self) -> Result<String> {
        self.tab.get_content()
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.tab.press_key(key)?;
        Ok(())
    }

    fn type_text(&mut self, text: &str, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            self.tab.type_str(text)?;
            return Ok(());
        }
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.tab.type_str(ch.encode_utf8(&mut buf))?;
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn wait_for_timeout(&mut self, duration: Duration) -> Result<()> {
        std::thread::sleep(duration);
        Ok(())
    }
}

fn locator_json(locator: &Locator) -> Value {
    let nth = locator.nth.unwrap_or(0);
    match &locator.strategy {
        LocatorStrategy::Css(selector) => json!({ "kind": "css", "value": selector, "nth": nth }),
        LocatorStrategy::TestId(id) => json!({ "kind": "testId", "value": id, "nth": nth }),
        LocatorStrategy::Role { role, name, exact } => json!({
            "kind": "role", "value": role, "name": name, "exact": exact, "nth": nth
        }),
        LocatorStrategy::Text {
            strategy,
            value,
            exact,
        } => json!({ "kind": strategy.as_str(), "value": value, "exact": exact, "nth": nth }),
    }
}

/// The click may have been swallowed by an overlay or a handler that
/// reverts the state.
fn confirm_checked(settled: &Value, checked: bool, locator: &Locator) -> Result<()> {
    if settled.as_bool() != Some(true) {
        let state = if checked { "checked" } else { "unchecked" };
        bail!("{} did not become {state}", describe(locator));
    }
    Ok(())
}

fn describe(locator: &Locator) -> String {
    let base = match &locator.strategy {
        LocatorStrategy::Css(s) => s.clone(),
        LocatorStrategy::TestId(id) => format!("testId={id}"),
        LocatorStrategy::Role { role, name, .. } => match name {
            Some(n) => format!("role={role}[name=\"{n}\"]"),
            None => format!("role={role}"),
        },
        LocatorStrategy::Text {
            strategy, value, ..
        } => match strategy {
            TextStrategy::Text => format!("text=\"{value}\""),
            other => format!("{}=\"{value}\"", other.as_str()),
        },
    };
    match locator.nth {
        Some(n) => format!("{base} >> nth={n}"),
        None => base,
    }
}

/// `(spec) => Element | null`. Also defines `isVisible` for callers sharing
/// the enclosing scope.
const RESOLVE_JS: &str = r#"(function () {
  globalThis.isVisible = (el) => {
    const s = getComputedStyle(el);
    const r = el.getBoundingClientRect();
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0' && (r.width > 0 || r.height > 0);
  };
  const norm = (t) => (t || '').replace(/\s+/g, ' ').trim();
  const matches = (text, want, exact) =>
    exact ? norm(text) === want : norm(text).toLowerCase().includes(want.toLowerCase());
  const ROLES = {
    button: 'button, input[type=button], input[type=submit], input[type=reset], [role=button]',
    link: 'a[href], [role=link]',
    textbox: 'input:not([type]), input[type=text], input[type=email], input[type=password], input[type=search], input[type=tel], input[type=url], input[type=number], textarea, [role=textbox]',
    checkbox: 'input[type=checkbox], [role=checkbox]',
    radio: 'input[type=radio], [role=radio]',
    combobox: 'select, [role=combobox]',
    heading: 'h1, h2, h3, h4, h5, h6, [role=heading]',
    listitem: 'li, [role=listitem]',
    img: 'img, [role=img]',
  };
  const accName = (el) => {
    if (el.getAttribute('aria-label')) return el.getAttribute('aria-label');
    const by = el.getAttribute('aria-labelledby');
    if (by) return by.split(/\s+/).map(id => norm((document.getElementById(id) || {}).textContent)).join(' ');
    if (el.labels && el.labels.length) return el.labels[0].textContent;
    return el.innerText || el.value || el.alt || el.title || '';
  };
  const byAttr = (attr, spec) =>
    [...document.querySelectorAll('[' + attr + ']')].filter(el => matches(el.getAttribute(attr), spec.value, spec.exact));
  const find = (spec) => {
    switch (spec.kind) {
      case 'css': return [...document.querySelectorAll(spec.value)];
      case 'testId': return [...document.querySelectorAll('[data-testid="' + CSS.escape(spec.value) + '"]')];
      case 'role': {
        const sel = ROLES[spec.value] || '[role="' + CSS.escape(spec.value) + '"]';
        const all = [...document.querySelectorAll(sel)];
        return spec.name == null ? all : all.filter(el => matches(accName(el), spec.name, spec.exact));
      }
      case 'text': {
        const hits = [...document.body.querySelectorAll('*')].filter(el => matches(el.innerText, spec.value, spec.exact));
        return hits.filter(el => ![...el.children].some(c => hits.includes(c)));
      }
      case 'label': {
        const labels = [...document.querySelectorAll('label')].filter(l => matches(l.textContent, spec.value, spec.exact));
        const viaLabel = labels.map(l => l.control).filter(Boolean);
        return viaLabel.concat(byAttr('aria-label', spec).filter(el => !viaLabel.includes(el)));
      }
      case 'placeholder': return byAttr('placeholder', spec);
      case 'altText': return byAttr('alt', spec);
      case 'title': return byAttr('title', spec);
      default: return [];
    }
  };
  return (spec) => find(spec)[spec.nth] || null;
})()"#;
