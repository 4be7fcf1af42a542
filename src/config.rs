// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Context configuration.
//!
//! Options can be built in code or read from the environment with
//! [`ContextOptions::from_env_or_default`]:
//!
//! | Variable | Values | Effect |
//! |----------|--------|--------|
//! | `SHADER_MATRIX_DISABLE_GPU` | `1`, `true` | never create a GPU context |
//! | `SHADER_MATRIX_ENCODING` | `auto`, `native`, `packed` | texel encoding preference |
//! | `SHADER_MATRIX_POWER` | `low`, `high` | adapter power preference |
//! | `SHADER_MATRIX_FALLBACK_ADAPTER` | `1`, `true` | force a software adapter |
//!
//! Unrecognized values are logged and ignored.

pub const DISABLE_GPU_VAR: &str = "SHADER_MATRIX_DISABLE_GPU";
pub const ENCODING_VAR: &str = "SHADER_MATRIX_ENCODING";
pub const POWER_VAR: &str = "SHADER_MATRIX_POWER";
pub const FALLBACK_ADAPTER_VAR: &str = "SHADER_MATRIX_FALLBACK_ADAPTER";

/// Which texel encoding a context should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingPreference {
    /// Native-float when the adapter supports it, otherwise packed-byte.
    #[default]
    Auto,
    /// Native-float; degrades to packed-byte with a warning if unsupported.
    Native,
    Packed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    Default,
    LowPower,
    HighPerformance,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextOptions {
    pub power_preference: PowerPreference,
    pub force_fallback_adapter: bool,
    pub encoding: EncodingPreference,
    /// When set, no GPU context is created and every kernel runs on the CPU.
    pub disable_gpu: bool,
}

impl ContextOptions {
    /// Reads options from the process environment, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads options through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut options = ContextOptions::default();
        if let Some(value) = lookup(DISABLE_GPU_VAR) {
            options.disable_gpu = parse_flag(DISABLE_GPU_VAR, &value);
        }
        if let Some(value) = lookup(FALLBACK_ADAPTER_VAR) {
            options.force_fallback_adapter = parse_flag(FALLBACK_ADAPTER_VAR, &value);
        }
        if let Some(value) = lookup(ENCODING_VAR) {
            match value.trim().to_ascii_lowercase().as_str() {
                "auto" | "" => options.encoding = EncodingPreference::Auto,
                "native" | "float" => options.encoding = EncodingPreference::Native,
                "packed" | "bytes" => options.encoding = EncodingPreference::Packed,
                _ => logwise::warn_sync!(
                    "Ignoring {var}={value}; expected auto, native or packed",
                    var = logwise::privacy::LogIt(&ENCODING_VAR),
                    value = logwise::privacy::LogIt(&value)
                ),
            }
        }
        if let Some(value) = lookup(POWER_VAR) {
            match value.trim().to_ascii_lowercase().as_str() {
                "low" => options.power_preference = PowerPreference::LowPower,
                "high" => options.power_preference = PowerPreference::HighPerformance,
                "" | "default" => options.power_preference = PowerPreference::Default,
                _ => logwise::warn_sync!(
                    "Ignoring {var}={value}; expected low or high",
                    var = logwise::privacy::LogIt(&POWER_VAR),
                    value = logwise::privacy::LogIt(&value)
                ),
            }
        }
        options
    }
}

fn parse_flag(var: &str, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            logwise::warn_sync!(
                "Ignoring {var}={value}; expected 1 or 0",
                var = logwise::privacy::LogIt(&var),
                value = logwise::privacy::LogIt(&value)
            );
            false
        }
    }
}
