// `idox whoami`: current identity and where documents are stored.

use clap::Args;
use serde::Serialize;

use super::GlobalArgs;
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct WhoamiArgs {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Remote,
    Local,
}

#[derive(Debug, Serialize)]
pub struct WhoamiResult {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: String,
    pub storage: StorageMode,
}

pub fn run(_args: WhoamiArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let ctx = EditorContext::load(global.config.as_deref())?;
    let result = describe(&ctx);
    output::print_output(global.format(), &result, format_human)?;
    Ok(())
}

fn describe(ctx: &EditorContext) -> WhoamiResult {
    let identity = ctx.session.identity();
    let storage = if identity.is_some() && ctx.store.remote().is_some() {
        StorageMode::Remote
    } else {
        StorageMode::Local
    };
    WhoamiResult {
        authenticated: identity.is_some(),
        user_id: identity.as_ref().map(|i| i.user_id.clone()),
        email: identity.and_then(|i| i.email),
        display_name: ctx.session.display_name(),
        storage,
    }
}

fn format_human(result: &WhoamiResult) -> String {
    let storage = match result.storage {
        StorageMode::Remote => "hosted backend",
        StorageMode::Local => "local store",
    };
    if result.authenticated {
        format!("Editing as {} ({storage})", result.display_name)
    } else {
        format!("Editing anonymously as {} ({storage})", result.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idox_editor::config::{AuthConfig, BackendConfig, EditorConfig, LocalConfig};
    use tempfile::TempDir;

    fn context_with(dir: &TempDir, auth: AuthConfig, backend: BackendConfig) -> EditorContext {
        let path = dir.path().join("config.toml");
        EditorConfig {
            auth,
            backend,
            local: LocalConfig { db_path: Some(dir.path().join("local.db")) },
            ..EditorConfig::default()
        }
        .save_to(&path)
        .unwrap();
        EditorContext::load(Some(&path)).unwrap()
    }

    #[test]
    fn anonymous_is_local() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with(&dir, AuthConfig::default(), BackendConfig::default());
        let result = describe(&ctx);
        assert!(!result.authenticated);
        assert_eq!(result.storage, StorageMode::Local);
        assert_eq!(result.display_name.len(), 6);
        assert!(format_human(&result).starts_with("Editing anonymously as "));
    }

    #[test]
    fn signed_in_with_backend_is_remote() {
        let dir = TempDir::new().unwrap();
        let auth = AuthConfig {
            user_id: Some("user-1".into()),
            email: Some("ada@example.com".into()),
            access_token: None,
        };
        let backend = BackendConfig {
            url: Some("https://example.invalid".into()),
            ..BackendConfig::default()
        };
        let result = describe(&context_with(&dir, auth, backend));
        assert!(result.authenticated);
        assert_eq!(result.storage, StorageMode::Remote);
        assert_eq!(format_human(&result), "Editing as ada (hosted backend)");
    }
}
