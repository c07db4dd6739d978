//! Redefinition engine configuration.
//!
//! Defaults match the conservative validation rules; the knobs exist for
//! embedders that want looser field-type evolution.

/// Configuration for the redefinition engine.
///
/// # Example
///
/// ```ignore
/// use molt_runtime::EngineConfig;
///
/// // Permit int fields to widen to float across versions
/// let config = EngineConfig {
///     allow_numeric_widening: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Accept a field changing from `Int` to `Float` across versions.
    ///
    /// Stored integer values are not reinterpreted; instances allocated under
    /// the old layout read the new version's default until written.
    ///
    /// Default: false (exact type-tag match required)
    pub allow_numeric_widening: bool,

    /// Verify index consistency of every table built by the engine.
    ///
    /// Cheap for the table sizes involved, but pure overhead in release
    /// builds once validation is trusted.
    ///
    /// Default: true in debug builds
    pub verify_tables: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_numeric_widening: false,
            verify_tables: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Strictest configuration: exact field types, tables verified.
    pub fn strict() -> Self {
        Self {
            allow_numeric_widening: false,
            verify_tables: true,
        }
    }

    /// Permissive configuration for evolving schemas.
    pub fn permissive() -> Self {
        Self {
            allow_numeric_widening: true,
            verify_tables: false,
        }
    }
}
