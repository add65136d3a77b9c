//! Custom panic hook for structured crash reports.
//!
//! When a stage panics the executor converts the panic into an error, but the
//! report printed here still tells the user which stage and how far the run
//! got before it happened.

use super::context::{get_current_context, get_progress, StageContextInfo};
use std::panic::PanicHookInfo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the crash-report panic hook. Call once, early in `main`.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        print_crash_report(info);
    }));
}

fn print_crash_report(info: &PanicHookInfo<'_>) {
    let context = get_current_context();
    let (emitted, stages) = get_progress();

    eprintln!();
    eprintln!("=== signer crash report ===");
    eprintln!("  Version:  {}", VERSION);
    eprintln!("  Platform: {}", std::env::consts::OS);
    eprintln!("  Time:     {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    eprintln!();
    eprintln!("  Panic:    {}", truncate(&extract_panic_message(info), 200));
    if let Some(location) = info.location() {
        eprintln!(
            "  Location: {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
    }
    eprintln!();
    print_context_section(&context, emitted, stages);
    eprintln!("===========================");
}

fn print_context_section(context: &StageContextInfo, emitted: usize, stages: usize) {
    match (&context.stage, context.position) {
        (Some(stage), Some(position)) => {
            eprintln!("  Stage:    {} ({}/{})", stage, position + 1, stages)
        }
        (Some(stage), None) => eprintln!("  Stage:    {}", stage),
        _ => eprintln!("  Stage:    <outside pipeline>"),
    }
    eprintln!("  Emitted:  {} items", emitted);
}

fn extract_panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
