use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to run xdotool: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("xdotool {action} exited with {status}: {stderr}")]
    Failed {
        action: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("no active window reported")]
    NoActiveWindow,
}

/// Types text into another window on the desktop.
pub trait TextSink {
    fn active_window(&self) -> Result<String, DeliveryError>;
    fn send_text(&self, window: &str, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XdoTool;

impl TextSink for XdoTool {
    fn active_window(&self) -> Result<String, DeliveryError> {
        let output = run_xdotool("getactivewindow", &["getactivewindow"])?;
        let window = output.trim().to_string();
        if window.is_empty() {
            return Err(DeliveryError::NoActiveWindow);
        }
        Ok(window)
    }

    fn send_text(&self, window: &str, text: &str) -> Result<(), DeliveryError> {
        run_xdotool("type", &["windowfocus", "--sync", window, "type", text])?;
        Ok(())
    }
}

fn run_xdotool(action: &'static str, args: &[&str]) -> Result<String, DeliveryError> {
    let output = Command::new("xdotool").args(args).output()?;
    if !output.status.success() {
        return Err(DeliveryError::Failed {
            action,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
