use std::collections::HashMap;

use super::record::{ProcessCategory, RawProcessSample};

/// Category of a process this tick plus the window title, if any.
///
/// Only window ownership decides: a pid owning a visible top-level window is
/// an Application, everything else is Background, core OS processes included.
pub fn classify(
    sample: &RawProcessSample,
    app_windows: &HashMap<u32, String>,
) -> (ProcessCategory, Option<String>) {
    match app_windows.get(&sample.pid) {
        Some(title) => (ProcessCategory::Application, Some(title.clone())),
        None => (ProcessCategory::Background, None),
    }
}
