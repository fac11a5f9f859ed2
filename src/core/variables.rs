// src/core/variables.rs

use crate::models::ExecutionContext;
use std::path::{MAIN_SEPARATOR_STR, Path};

/// A context-derived token that users can reference without declaring it.
#[derive(Debug)]
pub struct PredefinedVariable {
    pub name: &'static str,
    pub description: &'static str,
    pub resolve: fn(&ExecutionContext) -> Option<String>,
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn active_file(context: &ExecutionContext) -> Option<&Path> {
    context.active_file.as_deref()
}

fn relative_file(context: &ExecutionContext) -> Option<String> {
    if let Some(relative) = &context.relative_file {
        return Some(relative.clone());
    }
    let file = active_file(context)?;
    let root = context
        .workspace_folders
        .iter()
        .filter(|root| file.starts_with(root))
        .max_by_key(|root| root.as_os_str().len())?;
    file.strip_prefix(root).ok().map(path_string)
}

/// The registry, in the order it is shown to users.
static PREDEFINED_VARIABLES: &[PredefinedVariable] = &[
    PredefinedVariable {
        name: "workspaceFolder",
        description: "Path of the focused workspace folder",
        resolve: |ctx| ctx.focused_workspace_root().map(|p| path_string(p)),
    },
    PredefinedVariable {
        name: "workspaceFolderBasename",
        description: "Name of the focused workspace folder",
        resolve: |ctx| {
            ctx.focused_workspace_root()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
        },
    },
    PredefinedVariable {
        name: "file",
        description: "Path of the active file",
        resolve: |ctx| active_file(ctx).map(path_string),
    },
    PredefinedVariable {
        name: "relativeFile",
        description: "Active file relative to its workspace folder",
        resolve: relative_file,
    },
    PredefinedVariable {
        name: "fileBasename",
        description: "File name of the active file",
        resolve: |ctx| {
            active_file(ctx)
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        },
    },
    PredefinedVariable {
        name: "fileBasenameNoExtension",
        description: "File name of the active file without its extension",
        resolve: |ctx| {
            active_file(ctx)
                .and_then(Path::file_stem)
                .map(|n| n.to_string_lossy().into_owned())
        },
    },
    PredefinedVariable {
        name: "fileDirname",
        description: "Directory containing the active file",
        resolve: |ctx| active_file(ctx).and_then(Path::parent).map(path_string),
    },
    PredefinedVariable {
        name: "fileExtname",
        description: "Extension of the active file, including the dot",
        resolve: |ctx| {
            active_file(ctx)
                .and_then(Path::extension)
                .map(|e| format!(".{}", e.to_string_lossy()))
        },
    },
    PredefinedVariable {
        name: "selectedText",
        description: "Text currently selected in the editor",
        resolve: |ctx| ctx.selected_text.clone(),
    },
    PredefinedVariable {
        name: "clipboard",
        description: "Clipboard contents captured when the run started",
        resolve: |ctx| ctx.clipboard.clone(),
    },
    PredefinedVariable {
        name: "lineNumber",
        description: "Line number of the cursor (1-based)",
        resolve: |ctx| ctx.line_number.map(|n| n.to_string()),
    },
    PredefinedVariable {
        name: "explorerSelection",
        description: "Path selected in the file explorer",
        resolve: |ctx| ctx.explorer_selection.as_deref().map(path_string),
    },
    PredefinedVariable {
        name: "pathSeparator",
        description: "Path separator of the host platform",
        resolve: |_| Some(MAIN_SEPARATOR_STR.to_string()),
    },
];

/// All predefined variables, read-only.
pub fn all() -> &'static [PredefinedVariable] {
    PREDEFINED_VARIABLES
}

pub fn lookup(name: &str) -> Option<&'static PredefinedVariable> {
    PREDEFINED_VARIABLES.iter().find(|var| var.name == name)
}

/// Resolves a predefined variable against a context.
/// Unknown names and absent values both yield `None`.
pub fn resolve(name: &str, context: &ExecutionContext) -> Option<String> {
    lookup(name).and_then(|var| (var.resolve)(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn context() -> ExecutionContext {
        ExecutionContext {
            workspace_folders: vec![PathBuf::from("/home/dev/project")],
            active_file: Some(PathBuf::from("/home/dev/project/src/main.rs")),
            selected_text: Some("let x = 1;".to_string()),
            line_number: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolves_file_parts() {
        let ctx = context();
        assert_eq!(resolve("file", &ctx).as_deref(), Some("/home/dev/project/src/main.rs"));
        assert_eq!(resolve("fileBasename", &ctx).as_deref(), Some("main.rs"));
        assert_eq!(resolve("fileBasenameNoExtension", &ctx).as_deref(), Some("main"));
        assert_eq!(resolve("fileExtname", &ctx).as_deref(), Some(".rs"));
        assert_eq!(resolve("fileDirname", &ctx).as_deref(), Some("/home/dev/project/src"));
        assert_eq!(resolve("relativeFile", &ctx).as_deref(), Some("src/main.rs"));
        assert_eq!(resolve("workspaceFolderBasename", &ctx).as_deref(), Some("project"));
        assert_eq!(resolve("lineNumber", &ctx).as_deref(), Some("42"));
    }

    #[test]
    fn test_unknown_and_absent_values_resolve_to_none() {
        let ctx = context();
        assert_eq!(resolve("doesNotExist", &ctx), None);
        assert_eq!(resolve("clipboard", &ctx), None);
        assert_eq!(resolve("explorerSelection", &ctx), None);
    }

    #[test]
    fn test_registry_names_are_unique() {
        let mut names: Vec<_> = all().iter().map(|v| v.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }
}
