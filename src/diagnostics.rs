//! System diagnostics and dependency checking.
//!
//! Verifies that the external tools a dubbing job shells out to are installed.

use crate::config::Config;
use owo_colors::OwoColorize;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues
    Warning(String),
}

/// Check if a command exists and answers `version_arg`.
fn check_command(command: &str, version_arg: &str) -> CheckResult {
    match Command::new(command).arg(version_arg).output() {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{}' found but {} failed", command, version_arg)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", command, e)),
    }
}

fn report(label: &str, result: &CheckResult, hint: &str) -> bool {
    print!("{label}: ");
    match result {
        CheckResult::Ok => {
            println!("{}", "✓ OK".green());
            true
        }
        CheckResult::NotFound => {
            println!("{}", "✗ NOT FOUND".red());
            if !hint.is_empty() {
                println!("  {hint}");
            }
            false
        }
        CheckResult::Warning(msg) => {
            println!("{} {}", "⚠ WARNING:".yellow(), msg);
            false
        }
    }
}

/// Run all dependency checks and print results.
///
/// Returns `true` when every required tool is usable.
pub fn check_dependencies(config: &Config) -> bool {
    println!("Checking system dependencies...\n");

    let mut ok = true;
    ok &= report(
        "ffmpeg (audio processing)",
        &check_command("ffmpeg", "-version"),
        "Install: sudo apt install ffmpeg  (Debian/Ubuntu)",
    );
    ok &= report(
        "ffprobe (duration probing)",
        &check_command("ffprobe", "-version"),
        "Installed together with ffmpeg",
    );

    let synth = &config.synth.program;
    ok &= report(
        &format!("{synth} (speech synthesis)"),
        &check_command(synth, "--version"),
        "Set [synth] program in the config file to an installed TTS tool",
    );

    print!("translation: ");
    match &config.translate.endpoint {
        Some(endpoint) => println!("{endpoint}"),
        None => println!("- not configured (source text is spoken as-is)"),
    }

    println!();
    if ok {
        println!("All required tools found.");
    } else {
        println!("Some required tools are missing.");
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_is_not_found() {
        assert_eq!(
            check_command("dubsync-definitely-not-installed", "--version"),
            CheckResult::NotFound
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_version_is_warning() {
        assert!(matches!(
            check_command("false", "--version"),
            CheckResult::Warning(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn working_command_is_ok() {
        assert_eq!(check_command("true", "--version"), CheckResult::Ok);
    }
}
