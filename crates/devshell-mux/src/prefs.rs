/// Preferences persisted in client-local key/value storage
///
/// Each field lives under its own key; the quick actions are a JSON array.
/// Missing or unreadable entries fall back to defaults.
use devshell_types::{AiTool, Preferences, QuickAction};

use crate::error::Result;

pub const CLAUDE_COMMAND_KEY: &str = "claudeCommand";
pub const CODEX_COMMAND_KEY: &str = "codexCommand";
pub const GEMINI_COMMAND_KEY: &str = "geminiCommand";
pub const PROJECTS_PATH_KEY: &str = "projectsPath";
pub const QUICK_ACTIONS_KEY: &str = "quickActions";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub fn load_preferences(store: &dyn KeyValueStore) -> Preferences {
    let defaults = Preferences::default();
    let string_or = |key: &str, default: String| {
        store
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(default)
    };

    let quick_actions = match store.get(QUICK_ACTIONS_KEY) {
        Some(json) => serde_json::from_str::<Vec<QuickAction>>(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable quick actions: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    Preferences {
        claude_command: string_or(CLAUDE_COMMAND_KEY, defaults.claude_command),
        codex_command: string_or(CODEX_COMMAND_KEY, defaults.codex_command),
        gemini_command: string_or(GEMINI_COMMAND_KEY, defaults.gemini_command),
        projects_path: store.get(PROJECTS_PATH_KEY).unwrap_or_default(),
        quick_actions,
    }
}

pub fn save_preferences(store: &dyn KeyValueStore, prefs: &Preferences) -> Result<()> {
    store.set(CLAUDE_COMMAND_KEY, &prefs.claude_command)?;
    store.set(CODEX_COMMAND_KEY, &prefs.codex_command)?;
    store.set(GEMINI_COMMAND_KEY, &prefs.gemini_command)?;
    store.set(PROJECTS_PATH_KEY, &prefs.projects_path)?;
    store.set(QUICK_ACTIONS_KEY, &serde_json::to_string(&prefs.quick_actions)?)?;
    Ok(())
}

/// Update the AI tool commands and persist the result
pub fn save_tool_commands(store: &dyn KeyValueStore, commands: &[(AiTool, &str)]) -> Result<Preferences> {
    let mut prefs = load_preferences(store);
    for (tool, command) in commands {
        prefs.set_command(*tool, command);
    }
    save_preferences(store, &prefs)?;
    Ok(prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore(RefCell<HashMap<String, String>>);

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.borrow().get(key).cloned()
        }
        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_empty_store_gives_defaults() {
        let store = MemoryStore::default();
        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::default();
        let prefs = Preferences {
            claude_command: "claude --resume".to_string(),
            projects_path: "/home/me/code".to_string(),
            quick_actions: vec![QuickAction {
                id: "1700000000000".to_string(),
                name: "Build".to_string(),
                command: "make".to_string(),
                cwd: "/home/me/code/app".to_string(),
                icon: Some("⚡".to_string()),
                color: Some("primary".to_string()),
            }],
            ..Default::default()
        };

        save_preferences(&store, &prefs).unwrap();
        assert_eq!(store.get(CLAUDE_COMMAND_KEY).as_deref(), Some("claude --resume"));
        assert_eq!(load_preferences(&store), prefs);
    }

    #[test]
    fn test_corrupt_quick_actions_fall_back() {
        let store = MemoryStore::default();
        store.set(QUICK_ACTIONS_KEY, "[{broken").unwrap();
        store.set(GEMINI_COMMAND_KEY, "  ").unwrap();

        let prefs = load_preferences(&store);
        assert!(prefs.quick_actions.is_empty());
        assert_eq!(prefs.gemini_command, "gemini");
    }

    #[test]
    fn test_save_tool_commands_keeps_other_preferences() {
        let store = MemoryStore::default();
        store.set(PROJECTS_PATH_KEY, "/srv/projects").unwrap();
        store.set(CODEX_COMMAND_KEY, "codex --full-auto").unwrap();

        let prefs = save_tool_commands(
            &store,
            &[(AiTool::Claude, " claude --continue "), (AiTool::Codex, "")],
        )
        .unwrap();

        assert_eq!(prefs.claude_command, "claude --continue");
        assert_eq!(prefs.codex_command, "codex");
        assert_eq!(prefs.projects_path, "/srv/projects");
        assert_eq!(store.get(CLAUDE_COMMAND_KEY).as_deref(), Some("claude --continue"));
        assert_eq!(load_preferences(&store), prefs);
    }
}
