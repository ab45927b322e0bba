// gateway-server/src/admin/pages.rs
//! Minimal server-rendered HTML for the operator console.
use common::models::deployment::{DbUpdate, DeployResponse};

/// Escape text for HTML element and attribute content.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="robots" content="noindex">
<title>{title}</title>
</head>
<body>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}

pub fn login(base: &str, error: Option<&str>) -> String {
    let notice = error
        .map(|e| format!("<p role=\"alert\">{}</p>\n", escape(e)))
        .unwrap_or_default();
    layout(
        "Operator login",
        &format!(
            r#"{notice}<form method="post" action="{base}/login">
<label>PIN <input type="password" name="pin" autocomplete="current-password" required autofocus></label>
<button type="submit">Log in</button>
</form>"#,
            notice = notice,
            base = escape(base),
        ),
    )
}

fn logout_form(base: &str) -> String {
    format!(
        r#"<form method="post" action="{}/logout"><button type="submit">Log out</button></form>"#,
        escape(base)
    )
}

pub fn launch_form(base: &str, default_fee_bps: u32) -> String {
    layout(
        "Launch market",
        &format!(
            r#"<form method="post" action="{base}/launch">
<p><label>Pick id <input name="pickId" pattern="[A-Za-z0-9_-]+"></label></p>
<p><label>Name prefix <input name="namePrefix" maxlength="64"></label></p>
<p><label>Fee (bps) <input name="feeBps" inputmode="numeric" placeholder="{fee}"></label></p>
<p><label>Escrow asset <input name="asset" placeholder="0x..."></label></p>
<p><label>End time (unix) <input name="endTime" inputmode="numeric"></label></p>
<p><label>Cutoff time (unix) <input name="cutoffTime" inputmode="numeric"></label></p>
<button type="submit">Deploy</button>
</form>
{logout}"#,
            base = escape(base),
            fee = default_fee_bps,
            logout = logout_form(base),
        ),
    )
}

fn row(label: &str, value: &str) -> String {
    format!("<tr><th>{}</th><td>{}</td></tr>\n", escape(label), escape(value))
}

pub fn launch_result(base: &str, response: &DeployResponse) -> String {
    let market = &response.market;
    let mut rows = String::new();
    rows.push_str(&row("Market", &market.market_address));
    rows.push_str(&row("Yes share", market.yes_share_address.as_deref().unwrap_or("-")));
    rows.push_str(&row("No share", market.no_share_address.as_deref().unwrap_or("-")));
    rows.push_str(&row("Fee (bps)", &response.fee_bps.to_string()));
    rows.push_str(&row("End time", &response.end_time.to_string()));
    rows.push_str(&row("Cutoff time", &response.cutoff_time.to_string()));
    rows.push_str(&row("Pick", response.pick_id.as_deref().unwrap_or("-")));

    let db = match response.reconcile.db_update {
        DbUpdate::Ok => "updated".to_string(),
        DbUpdate::Skipped => "skipped".to_string(),
        DbUpdate::Failed => format!(
            "failed: {}",
            response.reconcile.db_error.as_deref().unwrap_or("unknown error")
        ),
    };
    rows.push_str(&row("Datastore", &db));

    layout(
        "Market deployed",
        &format!(
            "<table>\n{rows}</table>\n<p><a href=\"{base}/launch\">Launch another</a></p>\n{logout}",
            rows = rows,
            base = escape(base),
            logout = logout_form(base),
        ),
    )
}

pub fn launch_error(base: &str, message: &str, detail: Option<&str>) -> String {
    let detail = detail
        .map(|d| format!("<pre>{}</pre>\n", escape(d)))
        .unwrap_or_default();
    layout(
        "Deployment failed",
        &format!(
            "<p role=\"alert\">{message}</p>\n{detail}<p><a href=\"{base}/launch\">Back</a></p>\n{logout}",
            message = escape(message),
            detail = detail,
            base = escape(base),
            logout = logout_form(base),
        ),
    )
}

pub fn not_configured() -> String {
    layout(
        "Console unavailable",
        "<p>The operator console is not configured on this server.</p>",
    )
}
