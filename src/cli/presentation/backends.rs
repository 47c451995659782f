//! Backend listing presentation: table and json.

use crate::config::BackendConfig;
use comfy_table::Table;
use serde_json::json;

fn key_status(backend: &BackendConfig) -> &'static str {
    match (backend.provider_type.api_key_env_var(), backend.resolved_api_key()) {
        (None, _) => "not needed",
        (Some(_), Some(_)) => "set",
        (Some(_), None) => "missing",
    }
}

pub fn format_backend_list_text(backends: &[BackendConfig]) -> String {
    if backends.is_empty() {
        return "No backends configured.\n\nAdd a [[backends]] entry to .chorus.toml or the global config."
            .to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Name", "Type", "Model", "Endpoint", "Timeout", "Reply", "API Key", "Enabled",
    ]);
    for backend in backends {
        let endpoint = backend
            .endpoint
            .clone()
            .or_else(|| backend.provider_type.default_endpoint().map(str::to_string))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            backend.name.clone(),
            backend.provider_type.to_string(),
            backend.model.clone(),
            endpoint,
            format!("{}s", backend.timeout_secs),
            backend.response_mode.as_str().to_string(),
            key_status(backend).to_string(),
            if backend.enabled { "yes" } else { "no" }.to_string(),
        ]);
    }
    format!("{}\nTotal: {} backend(s)", table, backends.len())
}

pub fn format_backend_list_json(backends: &[BackendConfig]) -> String {
    let list: Vec<_> = backends
        .iter()
        .map(|backend| {
            json!({
                "name": backend.name,
                "provider_type": backend.provider_type,
                "model": backend.model,
                "endpoint": backend.endpoint,
                "timeout_secs": backend.timeout_secs,
                "response_mode": backend.response_mode,
                "api_key": key_status(backend),
                "enabled": backend.enabled,
            })
        })
        .collect();
    let out = json!({ "backends": list, "total": backends.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
