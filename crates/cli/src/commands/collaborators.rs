// `idox collaborators`: list who has access to a document.

use clap::Args;
use idox_common::types::Collaborator;
use uuid::Uuid;

use super::{block_on, failed, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct CollaboratorsArgs {
    /// Document id.
    pub id: Uuid,
}

pub fn run(args: CollaboratorsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let ctx = EditorContext::load(global.config.as_deref())?;
    let collaborators = block_on(ctx.service().get_collaborators(args.id))?
        .map_err(|e| failed("Failed to load collaborators", e))?;
    output::print_output(global.format(), &collaborators, |c| format_human(c))?;
    Ok(())
}

fn format_human(collaborators: &[Collaborator]) -> String {
    if collaborators.is_empty() {
        return "No collaborators yet.".to_string();
    }
    collaborators
        .iter()
        .map(|c| {
            let name = c
                .username
                .as_deref()
                .or(c.email.as_deref())
                .or(c.user_id.as_deref())
                .unwrap_or("unknown");
            format!("{name:<24} {}", c.permission)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use idox_common::types::Permission;

    #[test]
    fn lists_name_and_permission() {
        let rows = vec![
            Collaborator {
                document_id: Uuid::nil(),
                user_id: Some("user-2".into()),
                username: Some("bob".into()),
                email: None,
                permission: Permission::Admin,
            },
            Collaborator {
                document_id: Uuid::nil(),
                user_id: Some("user-3".into()),
                username: None,
                email: None,
                permission: Permission::View,
            },
        ];
        let text = format_human(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("bob") && lines[0].ends_with("admin"));
        assert!(lines[1].starts_with("user-3") && lines[1].ends_with("view"));
    }

    #[test]
    fn empty_list_message() {
        assert_eq!(format_human(&[]), "No collaborators yet.");
    }
}
