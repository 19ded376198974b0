mod settings_bridge;

pub use settings_bridge::{PropertyInfo, PropertyKind, PropertyValue, SettingsBridge};
