//! Plugin identity reported to the host.

use serde::Serialize;

/// Static plugin metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    /// Numeric version.
    pub version: u32,
    /// Version string.
    pub version_string: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Author.
    pub author: &'static str,
    /// Package identifier the host routes messages by.
    pub package: &'static str,
}

/// Metadata of this plugin.
pub const PLUGIN_INFO: PluginInfo = PluginInfo {
    version: 1,
    version_string: "0.0.1",
    description: "This is a Serial plugin for Janus",
    name: "JANUS Serial plugin",
    author: "Mosfet & Friends",
    package: "janus.plugin.serial",
};
