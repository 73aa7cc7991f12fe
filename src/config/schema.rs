use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["webroot"],
        "properties": {
            "webroot": { "type": "string" },
            "storage_path": { "type": "string" },
            "concurrent_queues": { "type": "integer", "minimum": 1 },
            "iterations": { "type": "integer", "minimum": 1 },
            "only_paths_with_prefix": { "type": "string" },
            "exclude_paths": { "type": "string" },
            "payload_marker": { "type": "string", "minLength": 1 },
            "strategies_dir": { "type": "string" },
            "app_info": { "type": "string" },
            "one_param_per_payload": { "type": "boolean" },
            "custom_config": { "type": "object" },
            "harness": {
                "type": "object",
                "properties": {
                    "program": { "type": "string" },
                    "args": { "type": "array", "items": { "type": "string" } },
                    "timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "monitoring": {
                "type": "object",
                "properties": {
                    "periodic_interval_ms": { "type": "integer", "minimum": 1 },
                    "idle_wait_ms": { "type": "integer", "minimum": 0 },
                    "dns_listen": { "type": "string" }
                }
            },
            "queue": {
                "type": "object",
                "properties": {
                    "batch_size": { "type": "integer", "minimum": 1 },
                    "recent_cache_size": { "type": "integer", "minimum": 0 }
                }
            }
        }
    })
});
