use std::{
    env,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use which::which;

const CHROME_ENV: &str = "SUTIAN_AUTOPLAY_CHROME";
const SKIP_OS_PATHS_ENV: &str = "SUTIAN_AUTOPLAY_SKIP_OS_PATHS";
const HEADLESS_ENV: &str = "SUTIAN_AUTOPLAY_HEADLESS";
const PROFILE_ENV: &str = "SUTIAN_AUTOPLAY_PROFILE";

/// Browser launch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub request_timeout_ms: u64,
    pub launch_timeout_ms: u64,
    /// Give up on an embedded entry page that has not loaded after this long.
    /// Unset waits for as long as the evaluate request may run.
    pub host_load_timeout_ms: Option<u64>,
    /// Additional Chromium switches appended after the built-in ones.
    pub extra_args: Vec<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            request_timeout_ms: 30_000,
            launch_timeout_ms: 20_000,
            host_load_timeout_ms: None,
            extra_args: Vec::new(),
        }
    }
}

impl CdpConfig {
    /// Chromium switches for this configuration.
    pub fn browser_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--disable-background-networking",
            "--disable-background-timer-throttling",
            "--disable-breakpad",
            "--disable-component-update",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
            "--autoplay-policy=no-user-gesture-required",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        if self.headless {
            args.push("--headless=new".into());
            args.push("--mute-audio".into());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// CSS selectors describing the dictionary's result markup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    /// Wide rendering of a result table.
    pub wide_table: String,
    /// Rows of the wide table.
    pub wide_row: String,
    /// Container of the narrow (mobile) rendering.
    pub narrow_container: String,
    /// Element wrapping one entry in the narrow rendering.
    pub narrow_item: String,
    /// Link to an entry page.
    pub entry_link: String,
    /// One entry of a single-column list page.
    pub list_item: String,
    /// Audio-trigger control, on list pages and inside entry pages.
    pub audio_trigger: String,
    /// Attribute on the trigger naming its audio resource.
    pub resource_attribute: String,
    /// Cell that receives the per-row start button.
    pub row_number_cell: String,
    /// Enabled "next page" link.
    pub next_page: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            wide_table: "table.table.d-none.d-md-table".into(),
            wide_row: "tbody tr".into(),
            narrow_container: "div.d-md-none".into(),
            narrow_item: "li, .card, .row".into(),
            entry_link: "a[href^=\"/und-hani/su/\"]".into(),
            list_item: "ol.list-unstyled > li, ul.list-unstyled > li".into(),
            audio_trigger: "button.imtong-liua".into(),
            resource_attribute: "data-src".into(),
            row_number_cell: "td:first-child".into(),
            next_page: "ul.pagination a.page-link[rel=\"next\"], ul.pagination a.page-link[aria-label=\"Next\"]"
                .into(),
        }
    }
}

fn resolve_headless_default() -> bool {
    // Headful unless asked otherwise: the point is to hear the clips.
    match env::var(HEADLESS_ENV) {
        Ok(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var(PROFILE_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    Path::new("./.sutian-autoplay-profile").into()
}

/// Locate a Chrome/Chromium binary: env override, then `PATH`, then the usual install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(CHROME_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var(SKIP_OS_PATHS_ENV)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if !skip_defaults {
        for candidate in os_specific_chrome_paths() {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

pub fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
                paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Both tests rewrite process-wide env vars.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn restore(key: &str, value: Option<String>) {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn detects_from_env_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let original = env::var(CHROME_ENV).ok();
        env::set_var(CHROME_ENV, exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        restore(CHROME_ENV, original);
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    fn detects_from_path_entries() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let name = chrome_executable_names()[0];
        let exe_path = dir.path().join(name);
        fs::write(&exe_path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&exe_path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let original_path = env::var("PATH").ok();
        let original_env = env::var(CHROME_ENV).ok();
        let skip_flag = env::var(SKIP_OS_PATHS_ENV).ok();
        env::set_var(CHROME_ENV, "");
        env::set_var(SKIP_OS_PATHS_ENV, "1");
        env::set_var("PATH", dir.path());
        let detected = detect_chrome_executable();
        restore("PATH", original_path);
        restore(CHROME_ENV, original_env);
        restore(SKIP_OS_PATHS_ENV, skip_flag);
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    fn headless_adds_mute_and_new_mode() {
        let config = CdpConfig {
            headless: true,
            extra_args: vec!["--lang=zh-TW".into()],
            ..CdpConfig::default()
        };
        let args = config.browser_args();
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--mute-audio".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--lang=zh-TW"));

        let headful = CdpConfig {
            headless: false,
            ..config
        };
        assert!(!headful.browser_args().iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn selectors_deserialize_partially() {
        let selectors: PageSelectors =
            serde_json::from_str(r#"{"audio_trigger":"button.play"}"#).unwrap();
        assert_eq!(selectors.audio_trigger, "button.play");
        assert_eq!(selectors.wide_table, PageSelectors::default().wide_table);
    }
}
