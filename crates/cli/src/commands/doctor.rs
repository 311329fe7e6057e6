use pinbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::CommandResult;

const DOCTOR_FAILURE_EXIT_CODE: u8 = 3;

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
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));
    let exit_code =
        if report.overall_status == CheckStatus::Pass { 0 } else { DOCTOR_FAILURE_EXIT_CODE };

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

fn build_report(loaded: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_token_shape(&config));
            checks.push(check_reconnect_policy(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            for name in ["discord_token_readiness", "gateway_reconnect_policy"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_token_shape(config: &AppConfig) -> DoctorCheck {
    let token = config.discord.token.expose_secret();
    let segments: Vec<&str> = token.split('.').collect();

    if segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty()) {
        DoctorCheck {
            name: "discord_token_readiness",
            status: CheckStatus::Pass,
            details: "token has the three dot-separated bot token segments".to_string(),
        }
    } else {
        DoctorCheck {
            name: "discord_token_readiness",
            status: CheckStatus::Fail,
            details: format!(
                "token has {} segment(s); expected `<id>.<timestamp>.<hmac>` from the Bot page",
                segments.len()
            ),
        }
    }
}

fn check_reconnect_policy(config: &AppConfig) -> DoctorCheck {
    let gateway = &config.gateway;
    if gateway.max_retries == 0 {
        return DoctorCheck {
            name: "gateway_reconnect_policy",
            status: CheckStatus::Fail,
            details: "gateway.max_retries is 0; a dropped session will not be resumed".to_string(),
        };
    }

    DoctorCheck {
        name: "gateway_reconnect_policy",
        status: CheckStatus::Pass,
        details: format!(
            "up to {} reconnect attempt(s), backoff {}ms..{}ms",
            gateway.max_retries, gateway.base_delay_ms, gateway.max_delay_ms
        ),
    }
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
