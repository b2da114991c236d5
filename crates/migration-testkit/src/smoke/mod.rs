//! HTTP endpoint smoke tests against a running web application.
//!
//! A fixed list of checks covers the URL patterns the migrated application
//! must keep serving: landing page, search pages, detail pages, and one
//! form POST. A check passes when the final response status is a success or
//! redirect; anything else (including a connection error) fails it.

use reqwest::{Client, Method};
use tracing::{info, warn};

use crate::error::Result;

/// One endpoint to probe.
#[derive(Debug, Clone)]
pub struct EndpointCheck {
    /// What the check covers, e.g. "Find Owners Page".
    pub description: String,

    /// HTTP method.
    pub method: Method,

    /// Path relative to the base URL, starting with '/'.
    pub path: String,

    /// Form fields for POST checks.
    pub form: Vec<(String, String)>,
}

impl EndpointCheck {
    pub fn get(description: &str, path: &str) -> Self {
        Self {
            description: description.to_string(),
            method: Method::GET,
            path: path.to_string(),
            form: Vec::new(),
        }
    }

    pub fn post(description: &str, path: &str, form: &[(&str, &str)]) -> Self {
        Self {
            description: description.to_string(),
            method: Method::POST,
            path: path.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// The pet-clinic URL pattern checks.
pub fn petclinic_checks() -> Vec<EndpointCheck> {
    vec![
        EndpointCheck::get("Home Page", "/"),
        EndpointCheck::get("Find Owners Page", "/owners/find.html"),
        EndpointCheck::get("Search for Davis", "/owners.html?lastName=Davis"),
        EndpointCheck::get("View Owner 1", "/owners/1.html"),
        EndpointCheck::get("New Owner Form", "/owners/new"),
        EndpointCheck::post(
            "Create New Owner",
            "/owners/new",
            &[
                ("firstName", "TestUser"),
                ("lastName", "Smoke"),
                ("address", "123 Test Street"),
                ("city", "Madison"),
                ("telephone", "6085559999"),
            ],
        ),
    ]
}

/// Outcome of one endpoint check.
#[derive(Debug, Clone)]
pub struct EndpointResult {
    pub description: String,
    pub method: Method,
    pub url: String,

    /// Final status code, when a response arrived.
    pub status: Option<u16>,

    /// URL after redirects, when it differs from the request URL.
    pub final_url: Option<String>,

    pub success: bool,
    pub error: Option<String>,
}

impl EndpointResult {
    /// Render the report line for this check.
    pub fn render(&self) -> String {
        let symbol = if self.success { "✓" } else { "✗" };
        match (&self.status, &self.error) {
            (Some(status), _) => {
                let redirect = self
                    .final_url
                    .as_deref()
                    .map(|u| format!(" -> {}", u))
                    .unwrap_or_default();
                format!(
                    "{} {} [{} {}]: {}{}",
                    symbol, self.description, self.method, self.url, status, redirect
                )
            }
            (None, Some(error)) => format!(
                "{} {} [{} {}]: {}",
                symbol, self.description, self.method, self.url, error
            ),
            (None, None) => format!("{} {}", symbol, self.description),
        }
    }
}

/// Smoke test report over all checks.
#[derive(Debug, Clone, Default)]
pub struct SmokeReport {
    pub results: Vec<EndpointResult>,
}

impl SmokeReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Run a list of endpoint checks against `base_url`.
pub async fn run(base_url: &str, checks: &[EndpointCheck]) -> Result<SmokeReport> {
    let client = Client::builder().cookie_store(true).build()?;
    let base = base_url.trim_end_matches('/');

    let mut report = SmokeReport::default();

    for check in checks {
        let url = format!("{}{}", base, check.path);
        info!("Testing: {} ({} {})", check.description, check.method, url);

        let request = if check.method == Method::POST {
            client.post(&url).form(&check.form)
        } else {
            client.get(&url)
        };

        let result = match request.send().await {
            Ok(response) => {
                let status = response.status();
                let final_url = response.url().to_string();
                EndpointResult {
                    description: check.description.clone(),
                    method: check.method.clone(),
                    url: url.clone(),
                    status: Some(status.as_u16()),
                    final_url: (final_url != url).then_some(final_url),
                    success: status.is_success() || status.is_redirection(),
                    error: None,
                }
            }
            Err(e) => {
                warn!("  Request failed: {}", e);
                EndpointResult {
                    description: check.description.clone(),
                    method: check.method.clone(),
                    url: url.clone(),
                    status: None,
                    final_url: None,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        };

        report.results.push(result);
    }

    info!(
        "Smoke test finished: {} passed, {} failed",
        report.passed(),
        report.failed()
    );

    Ok(report)
}
