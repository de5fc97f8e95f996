use std::ffi::OsStr;

use reqwest::Client;

/// Set to anything but `0`/`false` to bypass proxies picked up from the environment.
const DISABLE_SYSTEM_PROXY_ENV: &str = "CHATSTREAM_DISABLE_SYSTEM_PROXY";

pub(crate) fn build_http_client() -> Client {
    let setting = std::env::var_os(DISABLE_SYSTEM_PROXY_ENV);
    if !proxy_disabled(setting.as_deref()) {
        return Client::new();
    }

    tracing::debug!("System proxy disabled for chat transport");
    Client::builder().no_proxy().build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build proxy-less client, using defaults");
        Client::new()
    })
}

fn proxy_disabled(setting: Option<&OsStr>) -> bool {
    let Some(value) = setting.and_then(OsStr::to_str) else {
        return setting.is_some();
    };
    !matches!(value.trim().to_ascii_lowercase().as_str(), "0" | "false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_setting_values() {
        assert!(!proxy_disabled(None));
        assert!(proxy_disabled(Some(OsStr::new("1"))));
        assert!(proxy_disabled(Some(OsStr::new(""))));
        assert!(proxy_disabled(Some(OsStr::new("yes"))));
        assert!(!proxy_disabled(Some(OsStr::new("0"))));
        assert!(!proxy_disabled(Some(OsStr::new(" FALSE "))));
    }
}
