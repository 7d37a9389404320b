use pricelens_core::config::{AppConfig, LoadOptions};
use pricelens_core::domain::query::Query;
use pricelens_core::pricing::catalog::Catalog;
use pricelens_core::pricing::resolver::{FuzzyResolver, PriceResolver};
use serde::Serialize;

use super::{CommandResult, EXIT_CATALOG, EXIT_CONFIG};

const SMOKE_QUERY: &str = "iphone 16 pro";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let (report, exit_code) = build_report();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> (DoctorReport, u8) {
    let mut checks = Vec::new();
    let mut exit_code = 0;

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });

            match Catalog::load_or_embedded(config.catalog.path.as_deref()) {
                Ok(catalog) => {
                    checks.push(DoctorCheck {
                        name: "catalog_load",
                        status: CheckStatus::Pass,
                        details: format!(
                            "{} entries, fingerprint {}",
                            catalog.len(),
                            catalog.fingerprint()
                        ),
                    });
                    checks.push(check_resolver(catalog, &config));
                }
                Err(error) => {
                    exit_code = EXIT_CATALOG;
                    checks.push(DoctorCheck {
                        name: "catalog_load",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.push(skipped("resolver_smoke", "catalog did not load"));
                }
            }

            checks.push(check_oracle(&config));
        }
        Err(error) => {
            exit_code = EXIT_CONFIG;
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("catalog_load", "configuration did not load"));
            checks.push(skipped("resolver_smoke", "configuration did not load"));
            checks.push(skipped("oracle_readiness", "configuration did not load"));
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    (DoctorReport { overall_status, summary, checks }, exit_code)
}

fn check_resolver(catalog: Catalog, config: &AppConfig) -> DoctorCheck {
    let resolver = FuzzyResolver::with_settings(catalog.into(), config.resolver);
    let query = match Query::new(SMOKE_QUERY, None) {
        Ok(query) => query,
        Err(error) => {
            return DoctorCheck {
                name: "resolver_smoke",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }
        }
    };

    let resolution = resolver.resolve(&query);
    let band = resolution.entry.band();
    DoctorCheck {
        name: "resolver_smoke",
        status: CheckStatus::Pass,
        details: format!(
            "`{SMOKE_QUERY}` -> `{}` (score {}, band {}..={})",
            resolution.matched_key, resolution.score, band.low, band.high
        ),
    }
}

fn check_oracle(config: &AppConfig) -> DoctorCheck {
    if !config.llm.enabled {
        return skipped("oracle_readiness", "generative backend disabled; local synthesis only");
    }

    DoctorCheck {
        name: "oracle_readiness",
        status: CheckStatus::Pass,
        details: format!("model `{}` via {}", config.llm.model, config.llm.base_url),
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped: {reason}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
