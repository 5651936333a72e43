use devshell_mux::{KeyValueStore, MuxError, Result};
use wasm_bindgen::JsValue;
use web_sys::Storage;

use crate::utils;

/// `localStorage`-backed preference store
#[derive(Clone)]
pub struct LocalStore {
    storage: Storage,
}

impl LocalStore {
    pub fn open() -> std::result::Result<Self, JsValue> {
        let storage = crate::window()?
            .local_storage()?
            .ok_or_else(|| JsValue::from_str("localStorage unavailable"))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| MuxError::Storage(utils::js_error(&e)))
    }
}
