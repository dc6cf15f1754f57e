use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::Settings;

/// The single key the whole settings record is stored under.
pub const SETTINGS_KEY: &str = "intentkeeper_settings";

/// Observable settings cell backed by a key-value record.
///
/// Writers always replace the entire record; every subscriber sees the new value
/// as soon as it is written.
pub struct SettingsStore {
    records: Mutex<HashMap<String, String>>,
    sender: watch::Sender<Settings>,
}

impl SettingsStore {
    pub fn new(initial: Settings) -> Self {
        let initial = initial.normalized();
        let mut records = HashMap::new();
        if let Ok(raw) = serde_json::to_string(&initial) {
            records.insert(SETTINGS_KEY.to_string(), raw);
        }
        let (sender, _) = watch::channel(initial);
        Self {
            records: Mutex::new(records),
            sender,
        }
    }

    /// Restores a previously persisted record; unreadable records fall back to defaults.
    pub fn from_record(raw: Option<&str>) -> Self {
        let settings = match raw.map(serde_json::from_str::<Settings>) {
            Some(Ok(settings)) => settings,
            Some(Err(err)) => {
                tracing::warn!(
                    target: "settings",
                    error = %err,
                    "stored settings unreadable, using defaults"
                );
                Settings::default()
            }
            None => Settings::default(),
        };
        Self::new(settings)
    }

    pub fn get(&self) -> Settings {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.sender.subscribe()
    }

    pub fn record(&self) -> Option<String> {
        self.records.lock().get(SETTINGS_KEY).cloned()
    }

    pub fn replace(&self, settings: Settings) -> Result<Settings, serde_json::Error> {
        let mut records = self.records.lock();
        self.write(&mut records, settings)
    }

    /// Read-modify-write of the whole record, serialized against other writers.
    pub fn update(
        &self,
        change: impl FnOnce(&mut Settings),
    ) -> Result<Settings, serde_json::Error> {
        let mut records = self.records.lock();
        let mut settings = self.sender.borrow().clone();
        change(&mut settings);
        self.write(&mut records, settings)
    }

    fn write(
        &self,
        records: &mut HashMap<String, String>,
        settings: Settings,
    ) -> Result<Settings, serde_json::Error> {
        let settings = settings.normalized();
        records.insert(SETTINGS_KEY.to_string(), serde_json::to_string(&settings)?);
        self.sender.send_replace(settings.clone());
        tracing::debug!(target: "settings", ?settings, "settings updated");
        Ok(settings)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
