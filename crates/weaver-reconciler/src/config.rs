//! Reconciler configuration.
//!
//! Each toggle gates one accelerant of the incremental path. Disabling an
//! accelerant never changes the result, only how it is computed: the full
//! rebuild stays the reference for every combination.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Toggles selecting among the reconciliation stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Use the incremental stages at all. When false every pass is a full rebuild.
    pub optimized_path: bool,
    /// Diff several dirty nodes independently when structure is unchanged.
    pub keyed_diff: bool,
    /// Rebuild only the lowest common ancestor subtree on structural changes.
    pub block_rebuild: bool,
    /// Aggregate length deltas in a Fenwick tree so each node shifts once.
    pub central_aggregation: bool,
    /// Emit a single insert for freshly inserted blocks.
    pub insert_block_fast_path: bool,
    /// Cross-check every optimized pass against a full rebuild.
    pub strict_mode: bool,
    /// Panic (instead of returning an error) on a strict mode mismatch.
    ///
    /// Defaults to on in debug builds, so with `strict_mode` set a mismatch
    /// panics out of `Reconciler::reconcile` and `Editor::update` there.
    /// Release builds default to returning
    /// `ReconcileError::StrictModeMismatch`. `strict()` turns it off.
    pub panic_on_mismatch: bool,
    /// Re-check range cache invariants after every pass.
    pub validate_invariants: bool,
    /// Maximum number of undo steps kept by the editor.
    pub history_depth: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            optimized_path: true,
            keyed_diff: true,
            block_rebuild: true,
            central_aggregation: true,
            insert_block_fast_path: true,
            strict_mode: false,
            panic_on_mismatch: cfg!(debug_assertions),
            validate_invariants: cfg!(debug_assertions),
            history_depth: 100,
        }
    }
}

impl ReconcilerConfig {
    /// Configuration that always takes the legacy full rebuild.
    pub fn legacy() -> Self {
        Self {
            optimized_path: false,
            ..Self::default()
        }
    }

    /// Default configuration with strict mode on and mismatches reported as errors.
    ///
    /// This is what the test suites run with.
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            panic_on_mismatch: false,
            validate_invariants: true,
            ..Self::default()
        }
    }

    pub fn with_optimized_path(mut self, enabled: bool) -> Self {
        self.optimized_path = enabled;
        self
    }

    pub fn with_keyed_diff(mut self, enabled: bool) -> Self {
        self.keyed_diff = enabled;
        self
    }

    pub fn with_block_rebuild(mut self, enabled: bool) -> Self {
        self.block_rebuild = enabled;
        self
    }

    pub fn with_central_aggregation(mut self, enabled: bool) -> Self {
        self.central_aggregation = enabled;
        self
    }

    pub fn with_insert_block_fast_path(mut self, enabled: bool) -> Self {
        self.insert_block_fast_path = enabled;
        self
    }

    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    pub fn with_panic_on_mismatch(mut self, enabled: bool) -> Self {
        self.panic_on_mismatch = enabled;
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    /// Load configuration from environment variables, starting from defaults.
    ///
    /// Recognized variables (all optional):
    /// - `WEAVER_RECONCILE_OPTIMIZED`
    /// - `WEAVER_RECONCILE_KEYED_DIFF`
    /// - `WEAVER_RECONCILE_BLOCK_REBUILD`
    /// - `WEAVER_RECONCILE_CENTRAL_AGGREGATION`
    /// - `WEAVER_RECONCILE_INSERT_BLOCK`
    /// - `WEAVER_RECONCILE_STRICT`
    /// - `WEAVER_RECONCILE_HISTORY_DEPTH`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let flags: [(&'static str, &mut bool); 6] = [
            ("WEAVER_RECONCILE_OPTIMIZED", &mut config.optimized_path),
            ("WEAVER_RECONCILE_KEYED_DIFF", &mut config.keyed_diff),
            ("WEAVER_RECONCILE_BLOCK_REBUILD", &mut config.block_rebuild),
            (
                "WEAVER_RECONCILE_CENTRAL_AGGREGATION",
                &mut config.central_aggregation,
            ),
            (
                "WEAVER_RECONCILE_INSERT_BLOCK",
                &mut config.insert_block_fast_path,
            ),
            ("WEAVER_RECONCILE_STRICT", &mut config.strict_mode),
        ];

        for (var, slot) in flags {
            if let Some(value) = lookup(var) {
                *slot = parse_bool(var, &value)?;
            }
        }

        if let Some(value) = lookup("WEAVER_RECONCILE_HISTORY_DEPTH") {
            config.history_depth =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber {
                        var: "WEAVER_RECONCILE_HISTORY_DEPTH",
                        value: value.clone(),
                    })?;
        }

        Ok(config)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_enable_every_accelerant() {
        let config = ReconcilerConfig::default();
        assert!(config.optimized_path);
        assert!(config.keyed_diff);
        assert!(config.block_rebuild);
        assert!(config.central_aggregation);
        assert!(config.insert_block_fast_path);
        assert!(!config.strict_mode);
    }

    #[test]
    fn test_mismatch_panics_only_in_debug_by_default() {
        assert_eq!(
            ReconcilerConfig::default().panic_on_mismatch,
            cfg!(debug_assertions)
        );
        let strict = ReconcilerConfig::strict();
        assert!(strict.strict_mode);
        assert!(!strict.panic_on_mismatch);
        assert!(
            ReconcilerConfig::strict()
                .with_panic_on_mismatch(true)
                .panic_on_mismatch
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ReconcilerConfig::from_lookup(lookup_from(&[
            ("WEAVER_RECONCILE_STRICT", "yes"),
            ("WEAVER_RECONCILE_KEYED_DIFF", "0"),
            ("WEAVER_RECONCILE_HISTORY_DEPTH", " 7 "),
        ]))
        .unwrap();
        assert!(config.strict_mode);
        assert!(!config.keyed_diff);
        assert!(config.block_rebuild);
        assert_eq!(config.history_depth, 7);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ReconcilerConfig::from_lookup(lookup_from(&[(
            "WEAVER_RECONCILE_OPTIMIZED",
            "maybe",
        )]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBool {
                var: "WEAVER_RECONCILE_OPTIMIZED",
                value: "maybe".to_string(),
            }
        );

        let err = ReconcilerConfig::from_lookup(lookup_from(&[(
            "WEAVER_RECONCILE_HISTORY_DEPTH",
            "lots",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn test_legacy_disables_optimized_path() {
        let config = ReconcilerConfig::legacy();
        assert!(!config.optimized_path);
        assert!(config.keyed_diff); // untouched, just unused
    }
}
