//! Subcommand handlers. Each returns the process exit code.

use capture_auth::{
    AuthSnapshot, CaptureAuthRuntime, CapturedSelection, LOGOUT_FAILURE_STATUS,
    LOGOUT_SUCCESS_STATUS,
};
use chrono::{DateTime, Utc};
use tracing::debug;

pub async fn login(runtime: &CaptureAuthRuntime) -> i32 {
    println!("Opening browser for login...");
    let report = runtime.login_report().await;
    println!("{}", report.status);
    if let Some(detail) = &report.error {
        eprintln!("  {detail}");
    }
    if let Some(warning) = &report.warning {
        eprintln!("Warning: {warning}");
    }
    if report.success {
        0
    } else {
        1
    }
}

pub fn logout(runtime: &CaptureAuthRuntime) -> i32 {
    match runtime.logout() {
        Ok(()) => {
            println!("{LOGOUT_SUCCESS_STATUS}");
            0
        }
        Err(e) => {
            println!("{LOGOUT_FAILURE_STATUS}");
            eprintln!("  {e}");
            1
        }
    }
}

pub fn status(runtime: &CaptureAuthRuntime, json: bool) -> anyhow::Result<i32> {
    let snapshot = runtime.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_status(&snapshot);
    }
    Ok(if snapshot.authenticated { 0 } else { 1 })
}

fn print_status(snapshot: &AuthSnapshot) {
    if !snapshot.authenticated {
        println!("Not logged in.");
        return;
    }
    println!("Logged in.");
    match snapshot.expires_at_ms.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(at) if snapshot.expired => println!("  Token expired at {}", at.to_rfc3339()),
        Some(at) => println!("  Token expires at {}", at.to_rfc3339()),
        None => println!("  Token expiry unknown"),
    }
}

pub async fn save(
    runtime: &CaptureAuthRuntime,
    selection: CapturedSelection,
) -> anyhow::Result<i32> {
    match runtime.save_selection(selection).await {
        Ok(created) => {
            debug!("Snippet saved");
            println!("Snippet saved.");
            println!("{}", serde_json::to_string_pretty(&created)?);
            Ok(0)
        }
        Err(e) => {
            eprintln!("Error saving: {e}");
            Ok(1)
        }
    }
}
