// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./carebridge.toml` > `~/.config/carebridge/carebridge.toml`
//! > `/etc/carebridge/carebridge.toml` with environment variable overrides via the
//! `CAREBRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CarebridgeConfig;

/// Top-level sections recognised in `CAREBRIDGE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "agent",
    "anthropic",
    "ehr",
    "reference",
    "session",
    "approval",
    "verification",
    "audit",
    "gateway",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/carebridge/carebridge.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "carebridge.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("carebridge/carebridge.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/carebridge/carebridge.toml` (system-wide)
/// 3. `~/.config/carebridge/carebridge.toml` (user XDG config)
/// 4. `./carebridge.toml` (local directory)
/// 5. `CAREBRIDGE_*` environment variables
pub fn load_config() -> Result<CarebridgeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over compiled defaults (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CarebridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarebridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CarebridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarebridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the full layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CarebridgeConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `CAREBRIDGE_AGENT_MAX_ITERATIONS` maps to `agent.max_iterations`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("CAREBRIDGE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
