//! Server-rendered HTML for the Ecom OS surfaces.
//!
//! The markup is deliberately plain. What matters is the addressable element
//! contract the acceptance harness relies on: element ids (`email`,
//! `password`), `data-testid` attributes on app cards, the `error-notice`
//! class, and the `aria-label="Sign out"` control. Those are versioned
//! interface points, not styling.

use ecomos_common::{AppCard, Identity};

/// Minimal HTML text/attribute escaping.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}

/// Login surface. `prefill` carries the environment-gated test credentials;
/// production builds render blank fields.
pub fn login_page(prefill: Option<(&str, &str)>, error: Option<&str>) -> String {
    let (email, password) = prefill.unwrap_or(("", ""));

    let notice = match error {
        Some(msg) => format!(
            r#"    <div class="error-notice bg-red-50" role="alert">{}</div>
"#,
            escape(msg)
        ),
        None => String::new(),
    };

    let body = format!(
        r#"  <main class="login">
    <h3>Ecom OS</h3>
    <p>Sign in to your account</p>
{notice}    <form method="post" action="/auth/login">
      <label for="email">Email address</label>
      <input id="email" name="email" type="email" value="{email}" required>
      <label for="password">Password</label>
      <input id="password" name="password" type="password" value="{password}" required>
      <button type="submit">Sign in</button>
    </form>
  </main>"#,
        notice = notice,
        email = escape(email),
        password = escape(password),
    );

    shell("Ecom OS (auth)", &body)
}

/// Post-login landing page listing the launchable sub-applications.
pub fn app_selector_page(identity: &Identity, catalog: &[AppCard]) -> String {
    let mut cards = String::new();
    for app in catalog {
        cards.push_str(&format!(
            r#"      <div class="app-card" data-testid="app-card-{key}">
        <form method="get" action="{path}">
          <button type="submit">{label}</button>
        </form>
      </div>
"#,
            key = app.key,
            path = app.path,
            label = escape(app.label),
        ));
    }

    let body = format!(
        r#"  <main class="app-selector">
    <h1>Welcome, {name}</h1>
    <div class="app-grid">
{cards}    </div>
  </main>"#,
        name = escape(&identity.display_name),
        cards = cards,
    );

    shell("Ecom OS", &body)
}

/// Warehouse Management shell: header with the signed-in display name and a
/// sign-out control. The sub-application's own content is out of scope.
pub fn wms_shell_page(identity: &Identity) -> String {
    let body = format!(
        r#"  <header class="app-shell-header">
    <h2>Warehouse Management</h2>
    <div class="user-menu">
      <p class="text-sm font-medium">{name}</p>
      <form method="post" action="/auth/signout">
        <button type="submit" aria-label="Sign out" title="Sign out">&#x2715;</button>
      </form>
    </div>
  </header>
  <main class="wms">
  </main>"#,
        name = escape(&identity.display_name),
    );

    shell("Ecom OS", &body)
}
