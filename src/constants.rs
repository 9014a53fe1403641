//! Common constants used throughout the blueprint generator.

/// Supported blueprint manifest file names, tried in order
pub const CONFIG_FILES: [&str; 3] = ["blueprint.yaml", "blueprint.yml", "blueprint.json"];

/// Environment variables handed to every hook process
pub mod env {
    /// Absolute path of the output directory
    pub const OUTPUT_DIR: &str = "BLUEPRINT_OUTPUT_DIR";
    /// JSON object holding the whole generation context
    pub const CONTEXT: &str = "BLUEPRINT_CONTEXT";
    /// Comma separated names of enabled features
    pub const FEATURES: &str = "BLUEPRINT_FEATURES";
    /// `pre_generation` or `post_generation`
    pub const HOOK_PHASE: &str = "BLUEPRINT_HOOK_PHASE";
    /// Prefix of the per-variable environment variables
    pub const VAR_PREFIX: &str = "BLUEPRINT_VAR_";
}
