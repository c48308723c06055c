use std::collections::HashMap;

/// Configuration keys the emulation core may look up across the boundary.
///
/// Writing configuration is an external collaborator's job; this registry is
/// read-only after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigEntry {
    ExternalBiosEnable,
    Bios9Path,
    Bios7Path,
    FirmwarePath,
    FirmwareOverrideSettings,
    FirmwareUsername,
    FirmwareMessage,
    FirmwareLanguage,
    FirmwareBirthdayMonth,
    FirmwareBirthdayDay,
    FirmwareFavouriteColour,
    AudioBitrate,
    DldiEnable,
    DldiImagePath,
    DldiImageSize,
    DldiReadOnly,
    DldiFolderSync,
    DldiFolderPath,
    SdCardEnable,
    SdCardImagePath,
    SdCardImageSize,
    SdCardReadOnly,
    SdCardFolderSync,
    SdCardFolderPath,
    MultiplayerAllowed,
    LanAllowed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Int(i32),
    Bool(bool),
    Str(String),
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Typed, read-mostly configuration lookups.
///
/// Lookups never fail: a missing or wrongly-typed entry yields the zero value
/// for the requested type, which is what the core expects for unset options.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: HashMap<ConfigEntry, ConfigValue>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline used when no front-end supplies configuration: built-in BIOS
    /// and firmware, no DLDI or SD card image, multiplayer permitted.
    pub fn with_defaults() -> Self {
        Self::from_entries([
            (ConfigEntry::ExternalBiosEnable, ConfigValue::Bool(false)),
            (ConfigEntry::FirmwareOverrideSettings, ConfigValue::Bool(false)),
            (ConfigEntry::FirmwareUsername, ConfigValue::from("bedrock")),
            (ConfigEntry::FirmwareLanguage, ConfigValue::Int(1)),
            (ConfigEntry::FirmwareBirthdayMonth, ConfigValue::Int(1)),
            (ConfigEntry::FirmwareBirthdayDay, ConfigValue::Int(1)),
            (ConfigEntry::FirmwareFavouriteColour, ConfigValue::Int(0)),
            (ConfigEntry::AudioBitrate, ConfigValue::Int(0)),
            (ConfigEntry::DldiEnable, ConfigValue::Bool(false)),
            (ConfigEntry::SdCardEnable, ConfigValue::Bool(false)),
            (ConfigEntry::MultiplayerAllowed, ConfigValue::Bool(true)),
            (ConfigEntry::LanAllowed, ConfigValue::Bool(true)),
        ])
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (ConfigEntry, ConfigValue)>) -> Self {
        Self {
            values: entries.into_iter().collect(),
        }
    }

    pub fn get_int(&self, entry: ConfigEntry) -> i32 {
        match self.values.get(&entry) {
            Some(ConfigValue::Int(v)) => *v,
            Some(other) => {
                tracing::warn!(?entry, ?other, "config entry read as int");
                0
            }
            None => 0,
        }
    }

    pub fn get_bool(&self, entry: ConfigEntry) -> bool {
        match self.values.get(&entry) {
            Some(ConfigValue::Bool(v)) => *v,
            Some(other) => {
                tracing::warn!(?entry, ?other, "config entry read as bool");
                false
            }
            None => false,
        }
    }

    pub fn get_string(&self, entry: ConfigEntry) -> &str {
        match self.values.get(&entry) {
            Some(ConfigValue::Str(v)) => v,
            _ => "",
        }
    }
}
