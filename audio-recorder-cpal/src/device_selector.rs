//! Input device choice, independent of any audio backend.

/// Device name patterns that are never useful as a recording source.
const FILTERED_PATTERNS: &[&str] = &["surround", "front:", "rear:", "center:", "side:", "hdmi", "s/pdif"];

/// Which input device a host should open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// The backend's default input device.
    #[default]
    Default,
    /// The first device whose name matches exactly.
    Named(String),
}

impl DeviceSelector {
    /// `None` or an empty name selects the default device.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => Self::Named(name.to_string()),
            _ => Self::Default,
        }
    }

    pub fn matches(&self, device_name: &str) -> bool {
        match self {
            Self::Default => false,
            Self::Named(name) => name == device_name,
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::Named(name) => name,
        }
    }
}

/// Whether a device should be hidden from listings.
pub fn is_filtered_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}
