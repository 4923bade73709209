// src/eta.rs

/// Placeholder when no line of the tracking text mentions an ETA.
pub const ETA_NOT_FOUND: &str = "N/A";

/// Returns the first line of `raw` containing "ETA" (any case), trimmed,
/// or [`ETA_NOT_FOUND`].
pub fn extract_eta(raw: &str) -> String {
    raw.lines()
        .find(|line| line.to_uppercase().contains("ETA"))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| ETA_NOT_FOUND.to_string())
}
