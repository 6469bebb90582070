//! Playwright browser automation.
//!
//! A [`FlowSpec`] is rendered to one self-contained script using the plain
//! `playwright` library (no test-runner globals) and executed with `node`.
//! The whole flow shares a single page and context, so the session cookie
//! issued at login persists across the remaining steps.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::spec::{AttributeAssertion, FlowSpec, FlowStep};

#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// How a flow ended.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// Every step ran.
    Completed,
    /// An `expect_outcome` step validated the error notice and ended the flow
    /// early; the rationale explains why the rest was not reachable.
    Halted { rationale: String, notice: String },
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub screenshot_dir: PathBuf,
    /// Directory containing `node_modules/playwright`; exported as NODE_PATH
    /// so the generated script resolves the library from a temp dir.
    pub node_modules_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3003".to_string(),
            browser: Browser::default(),
            headless: true,
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            node_modules_dir: None,
        }
    }
}

/// Escape a string into a single-quoted JS literal.
fn js_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[derive(Debug, Deserialize)]
struct ScriptReport {
    outcome: String,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    notice: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Playwright browser handle
pub struct BrowserHandle {
    config: BrowserConfig,
}

impl BrowserHandle {
    pub fn new(config: BrowserConfig) -> E2eResult<Self> {
        Self::check_available(config.node_modules_dir.as_deref())?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self { config })
    }

    /// Verify node and the playwright library are reachable.
    pub fn check_available(node_modules_dir: Option<&std::path::Path>) -> E2eResult<()> {
        let node = Command::new("node")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match node {
            Ok(status) if status.success() => {}
            _ => return Err(E2eError::NodeNotFound),
        }

        let mut probe = Command::new("node");
        probe
            .args(["-e", "require('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = node_modules_dir {
            probe.env("NODE_PATH", dir);
        }
        match probe.status() {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Run a whole flow as one script.
    pub async fn run_flow(&self, spec: &FlowSpec) -> E2eResult<FlowOutcome> {
        let script = self.build_script(spec);

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("flow.js");
        std::fs::write(&script_path, &script)?;

        debug!(flow = %spec.name, "running Playwright script: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path).current_dir(temp_dir.path());
        if let Some(dir) = &self.config.node_modules_dir {
            cmd.env("NODE_PATH", dir);
        }

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(E2eError::Playwright(format!(
                "flow '{}' failed:\nstdout: {}\nstderr: {}",
                spec.name, stdout, stderr
            )));
        }

        let report_line = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| {
                E2eError::Playwright(format!("flow '{}' produced no report", spec.name))
            })?;
        let report: ScriptReport = serde_json::from_str(report_line.trim())?;

        match report.outcome.as_str() {
            "completed" => Ok(FlowOutcome::Completed),
            "halted" => Ok(FlowOutcome::Halted {
                rationale: report.rationale.unwrap_or_default(),
                notice: report.notice.unwrap_or_default(),
            }),
            other => Err(E2eError::Playwright(format!(
                "flow '{}' reported unexpected outcome '{}': {:?}",
                spec.name, other, report.error
            ))),
        }
    }

    /// Build the Playwright script for a flow
    pub fn build_script(&self, spec: &FlowSpec) -> String {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
  const fail = (msg) => {{ throw new Error(msg); }};

  try {{
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = spec.viewport.width,
            height = spec.viewport.height,
            base_url = js_str(&self.config.base_url),
        ));

        for (i, step) in spec.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step_name(step)));
            script.push_str(&self.step_to_js(step));
        }

        script.push_str(
            r#"
    console.log(JSON.stringify({ outcome: 'completed' }));
  } catch (error) {
    if (error && error.halted) {
      console.log(JSON.stringify({ outcome: 'halted', rationale: error.rationale, notice: error.notice }));
    } else {
      console.error(JSON.stringify({ outcome: 'failed', error: String((error && error.message) || error) }));
      process.exitCode = 1;
    }
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    fn step_to_js(&self, step: &FlowStep) -> String {
        match step {
            FlowStep::Navigate {
                url,
                wait_for_selector,
            } => {
                let mut js = format!("    await page.goto(baseUrl + {});\n", js_str(url));
                if let Some(sel) = wait_for_selector {
                    js.push_str(&format!(
                        "    await page.locator({}).first().waitFor({{ state: 'visible' }});\n",
                        js_str(sel)
                    ));
                }
                js
            }
            FlowStep::Fill { selector, value } => format!(
                "    await page.fill({}, {});\n",
                js_str(selector),
                js_str(value)
            ),
            FlowStep::Click {
                selector,
                timeout_ms,
            } => format!(
                "    await page.click({}, {{ timeout: {} }});\n",
                js_str(selector),
                timeout_ms.unwrap_or(5000)
            ),
            FlowStep::Wait {
                selector,
                timeout_ms,
            } => format!(
                "    await page.locator({}).first().waitFor({{ state: 'visible', timeout: {} }});\n",
                js_str(selector),
                timeout_ms
            ),
            FlowStep::WaitUrl {
                pattern,
                timeout_ms,
            } => format!(
                "    await page.waitForURL({}, {{ timeout: {} }});\n",
                js_str(pattern),
                timeout_ms
            ),
            FlowStep::Assert {
                selector,
                visible,
                text,
                text_contains,
                value,
                attribute,
                count,
            } => self.assert_to_js(selector, *visible, text.as_deref(), text_contains.as_deref(), value.as_deref(), attribute.as_ref(), *count),
            FlowStep::AssertTitle { matches, equals } => {
                let mut js = String::from("    {\n      const title = await page.title();\n");
                if let Some(re) = matches {
                    js.push_str(&format!(
                        "      if (!new RegExp({re}).test(title)) fail('title ' + JSON.stringify(title) + ' does not match ' + {re});\n",
                        re = js_str(re)
                    ));
                }
                if let Some(exact) = equals {
                    js.push_str(&format!(
                        "      if (title !== {t}) fail('title ' + JSON.stringify(title) + ' !== ' + {t});\n",
                        t = js_str(exact)
                    ));
                }
                js.push_str("    }\n");
                js
            }
            FlowStep::ExpectOutcome {
                error_selector,
                error_contains,
                settle_ms,
                rationale,
            } => {
                let mut js = format!(
                    "    await page.waitForTimeout({settle_ms});\n    {{\n      const notice = page.locator({sel}).first();\n      if (await notice.isVisible()) {{\n        const text = ((await notice.textContent()) || '').trim();\n",
                    settle_ms = settle_ms,
                    sel = js_str(error_selector),
                );
                for want in error_contains {
                    js.push_str(&format!(
                        "        if (!text.includes({w})) fail('error notice missing substring ' + {w} + ': ' + text);\n",
                        w = js_str(want)
                    ));
                }
                js.push_str(&format!(
                    "        throw {{ halted: true, rationale: {r}, notice: text }};\n      }}\n    }}\n",
                    r = js_str(rationale)
                ));
                js
            }
            FlowStep::Screenshot { name, full_page } => {
                // The script runs with a temp dir as its working directory, so
                // a relative screenshot dir must be anchored here first.
                let mut path = self.config.screenshot_dir.join(format!("{name}.png"));
                if !path.is_absolute() {
                    if let Ok(cwd) = std::env::current_dir() {
                        path = cwd.join(path);
                    }
                }
                format!(
                    "    await page.screenshot({{ path: {}, fullPage: {} }});\n",
                    js_str(&path.to_string_lossy()),
                    full_page
                )
            }
            FlowStep::Sleep { ms } => format!("    await page.waitForTimeout({ms});\n"),
            FlowStep::Log { message } => {
                format!("    console.error('[flow] ' + {});\n", js_str(message))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assert_to_js(
        &self,
        selector: &str,
        visible: Option<bool>,
        text: Option<&str>,
        text_contains: Option<&str>,
        value: Option<&str>,
        attribute: Option<&AttributeAssertion>,
        count: Option<usize>,
    ) -> String {
        let sel = js_str(selector);
        let mut js = format!("    {{\n      const el = page.locator({sel}).first();\n");

        match visible {
            Some(false) => {
                js.push_str(&format!(
                    "      if (await el.isVisible()) fail({sel} + ' should not be visible');\n"
                ));
                js.push_str("    }\n");
                return js;
            }
            _ => {
                // First-match semantics with a bounded visibility wait.
                js.push_str("      await el.waitFor({ state: 'visible', timeout: 5000 });\n");
            }
        }

        if let Some(expected) = text {
            js.push_str(&format!(
                "      {{ const t = ((await el.textContent()) || '').trim(); if (t !== {e}) fail({sel} + ' text ' + JSON.stringify(t) + ' !== ' + {e}); }}\n",
                e = js_str(expected)
            ));
        }
        if let Some(expected) = text_contains {
            js.push_str(&format!(
                "      {{ const t = (await el.textContent()) || ''; if (!t.includes({e})) fail({sel} + ' text missing ' + {e}); }}\n",
                e = js_str(expected)
            ));
        }
        if let Some(expected) = value {
            js.push_str(&format!(
                "      {{ const v = await el.inputValue(); if (v !== {e}) fail({sel} + ' value ' + JSON.stringify(v) + ' !== ' + {e}); }}\n",
                e = js_str(expected)
            ));
        }
        if let Some(attr) = attribute {
            if let Some(expected) = &attr.value {
                js.push_str(&format!(
                    "      {{ const a = await el.getAttribute({n}); if (a !== {e}) fail({sel} + ' attribute ' + {n} + ' !== ' + {e}); }}\n",
                    n = js_str(&attr.name),
                    e = js_str(expected)
                ));
            }
            if let Some(expected) = &attr.contains {
                js.push_str(&format!(
                    "      {{ const a = (await el.getAttribute({n})) || ''; if (!a.includes({e})) fail({sel} + ' attribute ' + {n} + ' missing ' + {e}); }}\n",
                    n = js_str(&attr.name),
                    e = js_str(expected)
                ));
            }
        }
        if let Some(expected) = count {
            js.push_str(&format!(
                "      {{ const n = await page.locator({sel}).count(); if (n !== {expected}) fail({sel} + ' count ' + n + ' !== {expected}'); }}\n"
            ));
        }

        js.push_str("    }\n");
        js
    }
}

fn step_name(step: &FlowStep) -> String {
    match step {
        FlowStep::Navigate { url, .. } => format!("navigate:{url}"),
        FlowStep::Fill { selector, .. } => format!("fill:{selector}"),
        FlowStep::Click { selector, .. } => format!("click:{selector}"),
        FlowStep::Wait { selector, .. } => format!("wait:{selector}"),
        FlowStep::WaitUrl { pattern, .. } => format!("wait_url:{pattern}"),
        FlowStep::Assert { selector, .. } => format!("assert:{selector}"),
        FlowStep::AssertTitle { .. } => "assert_title".to_string(),
        FlowStep::ExpectOutcome { error_selector, .. } => {
            format!("expect_outcome:{error_selector}")
        }
        FlowStep::Screenshot { name, .. } => format!("screenshot:{name}"),
        FlowStep::Sleep { ms } => format!("sleep:{ms}ms"),
        FlowStep::Log { message } => {
            format!("log:{}", message.chars().take(30).collect::<String>())
        }
    }
}
