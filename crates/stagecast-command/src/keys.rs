//! Well-known parameter keys shared with the remote agent's execution shim

/// Script identifier the agent executes
pub const SCRIPT: &str = "script";
/// Script interpreter marker
pub const SCRIPT_TYPE: &str = "script_type";
/// Effective per-command timeout in seconds
pub const COMMAND_TIMEOUT: &str = "command_timeout";
/// Category of the target component (`MASTER`, `SLAVE`, `CLIENT`)
pub const COMPONENT_CATEGORY: &str = "component_category";
/// Caller directive: config categories to refresh before execution
pub const REFRESH_CONFIG_TAGS_BEFORE_EXECUTION: &str = "refresh_config_tags_before_execution";
/// The only script type the action path emits
pub const SCRIPT_TYPE_PYTHON: &str = "PYTHON";
/// Key under which repository metadata is attached
pub const REPO_INFO: &str = "repo_info";
