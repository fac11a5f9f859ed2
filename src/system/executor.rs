//! # Action Executor
//!
//! Turns one [`ActionDefinition`] plus an [`ExecutionContext`] into a running
//! process. Every run goes through the same stages, in this order:
//!
//! 1. resolve parameters,
//! 2. resolve the working directory,
//! 3. pick the interpreter for the language and platform,
//! 4. render the script,
//! 5. write it to a private temporary file,
//! 6. build the argument list,
//! 7. build the environment overlay (markers, declared entries, parameters),
//! 8. rewrite Windows paths for the bash flavor in use,
//! 9. launch with captured output or inside a pseudo-terminal,
//! 10. delete the temporary script, whatever happened.
//!
//! The inherited process environment is never modified. Each run only adds an
//! overlay on top of it.

use crate::{
    constants::{ACTION_ID_ENV, PARAM_ENV_PREFIX, TEMP_DIR_PREFIX, WORKING_DIRECTORY_ENV},
    core::{
        parameters::{ParameterError, ParameterResolver, Prompter},
        paths::{normalize_for_flavor, normalize_line_endings, resolve_working_directory},
        settings::Settings,
        template::{PARAM_TOKEN_KEY, render_tokens},
        variables,
    },
    models::{
        ActionDefinition, EnvSource, ExecutionContext, ExecutionPlan, ExecutionResult, Language,
        Platform, ShellFlavor,
    },
    system::{
        output::OutputSink,
        runtime::{self, CommandSource, ScriptArgs, WindowsBash},
        secrets::{SecretError, SecretStore},
        terminal::{SessionState, TerminalError, TerminalLaunch, TerminalSession},
    },
};
use scopeguard::ScopeGuard;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

const OUTPUT_CHUNK_SIZE: usize = 4096;
const SECRET_MASK: &str = "********";

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("Secret '{secret_key}' for environment variable '{env_key}' of action '{action}' is not set.")]
    SecretNotFound {
        action: String,
        env_key: String,
        secret_key: String,
    },
    #[error("Secret store error: {0}")]
    Secret(#[from] SecretError),
    #[error("Could not prepare the script file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("The run was interrupted: {0}")]
    Interrupted(String),
}

/// Per-run knobs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Parameter values that are used verbatim and never prompted for.
    pub provided_values: HashMap<String, String>,
    /// Overrides the action's own output routing preference.
    pub force_output_channel: Option<bool>,
}

/// How a prepared run is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Output captured and forwarded to the output sink.
    OutputChannel,
    /// Output streamed live through a pseudo-terminal.
    Terminal,
}

type ScriptGuard = ScopeGuard<PathBuf, fn(PathBuf)>;

/// A run that went through every stage except the launch.
/// Dropping it deletes the temporary script.
#[derive(Debug)]
pub struct PreparedRun {
    pub action_id: String,
    pub action_name: String,
    pub language: Language,
    pub plan: ExecutionPlan,
    pub working_directory: PathBuf,
    /// Added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, String>,
    pub mode: LaunchMode,
    secret_keys: BTreeSet<String>,
    declared_keys: BTreeSet<String>,
    _script: ScriptGuard,
}

impl PreparedRun {
    /// `KEY=value` pairs worth showing in diagnostics, secrets masked.
    pub fn interesting_env(&self) -> Vec<String> {
        self.env
            .iter()
            .filter(|(key, _)| {
                key.as_str() == ACTION_ID_ENV
                    || key.as_str() == WORKING_DIRECTORY_ENV
                    || key.starts_with(PARAM_ENV_PREFIX)
                    || self.declared_keys.contains(key.as_str())
            })
            .map(|(key, value)| {
                if self.secret_keys.contains(key) {
                    format!("{}={}", key, SECRET_MASK)
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect()
    }

    /// The command line, shell-quoted for display.
    pub fn command_line(&self) -> String {
        let words = std::iter::once(self.plan.command.as_str())
            .chain(self.plan.args.iter().map(String::as_str));
        shlex::try_join(words.clone())
            .unwrap_or_else(|_| words.collect::<Vec<_>>().join(" "))
    }
}

/// Runs actions. One executor is shared by every run of a session.
pub struct ActionExecutor {
    platform: Platform,
    settings: Settings,
    secrets: Arc<dyn SecretStore>,
    prompter: Arc<dyn Prompter>,
    sink: Arc<dyn OutputSink>,
    forward_terminal_input: bool,
    windows_bash: Mutex<Option<WindowsBash>>,
    active_terminal: Mutex<Option<Arc<TerminalSession>>>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("platform", &self.platform)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ActionExecutor {
    pub fn new(
        settings: Settings,
        secrets: Arc<dyn SecretStore>,
        prompter: Arc<dyn Prompter>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            platform: Platform::host(),
            settings,
            secrets,
            prompter,
            sink,
            forward_terminal_input: false,
            windows_bash: Mutex::new(None),
            active_terminal: Mutex::new(None),
        }
    }

    /// Plans runs as if on another platform. Launching still uses the host.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Seeds the Windows bash lookup instead of searching the path.
    pub fn with_windows_bash(self, bash: WindowsBash) -> Self {
        *self.windows_bash.lock().unwrap_or_else(|p| p.into_inner()) = Some(bash);
        self
    }

    /// Pipes this process's stdin into terminal-mode runs.
    pub fn with_terminal_input(mut self, enabled: bool) -> Self {
        self.forward_terminal_input = enabled;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one action to completion.
    ///
    /// Script failures are normal results with a non-zero exit code. Errors
    /// are reserved for runs that could not be prepared or launched.
    pub async fn run(
        &self,
        action: &ActionDefinition,
        context: &ExecutionContext,
        options: RunOptions,
    ) -> Result<ExecutionResult, ExecutorError> {
        let prepared = self.prepare(action, context, &options)?;
        self.log_launch(&prepared);

        let result = match prepared.mode {
            LaunchMode::OutputChannel => self.launch_captured(&prepared).await?,
            LaunchMode::Terminal => self.launch_terminal(&prepared).await?,
        };
        log::debug!(
            "Action '{}' finished with exit code {:?}.",
            prepared.action_name,
            result.exit_code
        );
        Ok(result)
    }

    /// Kills the process of the terminal-mode run in progress, if any.
    pub fn dispose_terminal(&self) {
        let active = self
            .active_terminal
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(session) = active {
            session.dispose();
        }
    }

    /// Stages 1 to 8: everything short of launching the process.
    pub fn prepare(
        &self,
        action: &ActionDefinition,
        context: &ExecutionContext,
        options: &RunOptions,
    ) -> Result<PreparedRun, ExecutorError> {
        // 1. Parameters
        let parameters =
            ParameterResolver::new(self.prompter.as_ref()).resolve(action, &options.provided_values)?;

        // 2. Working directory
        let home = dirs::home_dir();
        let working_directory =
            resolve_working_directory(action.working_directory.as_deref(), context, home.as_deref());

        // 3. Interpreter
        let spec = runtime::spec_for(action.language, self.platform);
        let (command, flavor) = self.resolve_command(spec.command, spec.flavor, &working_directory);

        // 4. Script
        let script_format = ValueFormat {
            flavor,
            escape_backslashes: action.language == Language::Node && self.platform == Platform::Windows,
        };
        let script = render_with(&action.script, context, &parameters, script_format);

        // 5. Temporary file
        let script_path = write_script(&action.id, spec.extension, &script)?;
        let script_guard: ScriptGuard =
            scopeguard::guard(script_path.clone(), cleanup_owned_script as fn(PathBuf));

        // 6. Arguments
        let script_args = ScriptArgs {
            script_path: normalize_for_flavor(&script_path.to_string_lossy(), flavor),
            node_loader: match action.language {
                Language::Node => self.settings.node_resolver.as_deref().map(runtime::node_loader_import),
                _ => None,
            },
        };
        let args = (spec.build_args)(&script_args);

        // 7 & 8. Environment overlay
        let mut env = BTreeMap::new();
        let mut secret_keys = BTreeSet::new();
        let mut declared_keys = BTreeSet::new();
        let env_format = ValueFormat {
            flavor,
            escape_backslashes: false,
        };

        env.insert(ACTION_ID_ENV.to_string(), action.id.clone());
        env.insert(
            WORKING_DIRECTORY_ENV.to_string(),
            normalize_for_flavor(&working_directory.to_string_lossy(), flavor),
        );

        for var in &action.env {
            match var.source(&action.id) {
                EnvSource::Plain(None) => continue,
                EnvSource::Plain(Some(raw)) => {
                    let value = render_env_value(raw, context, &parameters, env_format);
                    env.insert(var.key.clone(), value);
                }
                EnvSource::Secret(secret_key) => {
                    let raw = self.secrets.get(&secret_key)?.ok_or_else(|| {
                        ExecutorError::SecretNotFound {
                            action: action.name.clone(),
                            env_key: var.key.clone(),
                            secret_key: secret_key.clone(),
                        }
                    })?;
                    let value = render_env_value(&raw, context, &parameters, env_format);
                    secret_keys.insert(var.key.clone());
                    env.insert(var.key.clone(), value);
                }
            }
            declared_keys.insert(var.key.clone());
        }

        for (name, value) in &parameters {
            env.insert(param_env_key(name), normalize_for_flavor(value, flavor));
        }

        let use_output_channel = options
            .force_output_channel
            .or(action.run_in_output_channel)
            .unwrap_or(self.settings.run_in_output_channel);

        Ok(PreparedRun {
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            language: action.language,
            plan: ExecutionPlan {
                command,
                args,
                script_path,
                shell_flavor: flavor,
            },
            working_directory,
            env,
            parameters,
            mode: if use_output_channel {
                LaunchMode::OutputChannel
            } else {
                LaunchMode::Terminal
            },
            secret_keys,
            declared_keys,
            _script: script_guard,
        })
    }

    fn resolve_command(
        &self,
        source: CommandSource,
        flavor: Option<ShellFlavor>,
        working_directory: &Path,
    ) -> (String, Option<ShellFlavor>) {
        match source {
            CommandSource::Fixed(command) => (command.to_string(), flavor),
            CommandSource::PythonVenv => {
                let command = runtime::find_python_venv(working_directory, self.platform, &self.settings.venv_dirs)
                    .map(|python| python.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "python".to_string());
                (command, None)
            }
            CommandSource::WindowsBash => {
                let bash = self.windows_bash();
                (bash.command, Some(bash.flavor))
            }
        }
    }

    /// The memoized Windows bash. Concurrent first lookups may both search;
    /// they store the same answer.
    fn windows_bash(&self) -> WindowsBash {
        if let Some(cached) = self.windows_bash.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return cached;
        }
        let located = runtime::locate_windows_bash();
        *self.windows_bash.lock().unwrap_or_else(|p| p.into_inner()) = Some(located.clone());
        located
    }

    fn log_launch(&self, prepared: &PreparedRun) {
        log::info!(
            "[{}] run action='{}' id={} language={} cwd='{}' mode={:?} command={} env=[{}]",
            chrono::Local::now().to_rfc3339(),
            prepared.action_name,
            prepared.action_id,
            prepared.language,
            prepared.working_directory.display(),
            prepared.mode,
            prepared.command_line(),
            prepared.interesting_env().join(", ")
        );
    }

    // --- LAUNCH ---

    async fn launch_captured(&self, prepared: &PreparedRun) -> Result<ExecutionResult, ExecutorError> {
        self.sink.show();

        let mut child = tokio::process::Command::new(&prepared.plan.command)
            .args(&prepared.plan.args)
            .current_dir(&prepared.working_directory)
            .envs(&prepared.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                log::error!("Failed to launch '{}': {}", prepared.plan.command, source);
                ExecutorError::Launch {
                    command: prepared.plan.command.clone(),
                    source,
                }
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let sink = self.sink.as_ref();
        let (stdout, stderr, status) = tokio::join!(
            pump_output(stdout, sink),
            pump_output(stderr, sink),
            child.wait()
        );
        let status = status?;

        Ok(ExecutionResult {
            action_id: prepared.action_id.clone(),
            exit_code: status.code(),
            stdout: stdout?,
            stderr: stderr?,
        })
    }

    async fn launch_terminal(&self, prepared: &PreparedRun) -> Result<ExecutionResult, ExecutorError> {
        let session = Arc::new(TerminalSession::new());
        *self.active_terminal.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::clone(&session));

        let launch = TerminalLaunch {
            command: prepared.plan.command.clone(),
            args: prepared.plan.args.clone(),
            cwd: prepared.working_directory.clone(),
            env: prepared
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            forward_stdin: self.forward_terminal_input,
            size: None,
        };

        let running = Arc::clone(&session);
        let outcome = tokio::task::spawn_blocking(move || {
            let mut combined = Vec::new();
            let exit = running.open(&launch, |chunk| {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(chunk).and_then(|_| stdout.flush());
                combined.extend_from_slice(chunk);
            });
            (exit, combined)
        })
        .await;

        self.active_terminal.lock().unwrap_or_else(|p| p.into_inner()).take();

        let (exit, combined) = outcome.map_err(|e| ExecutorError::Interrupted(e.to_string()))?;
        let exit_code = match exit {
            Ok(code) => code,
            // Disposed before the process could start.
            Err(TerminalError::InvalidState(SessionState::Disposed)) => None,
            Err(e) => {
                log::error!("Terminal launch of '{}' failed: {}", prepared.plan.command, e);
                Some(-1)
            }
        };

        Ok(ExecutionResult {
            action_id: prepared.action_id.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&combined).into_owned(),
            stderr: String::new(),
        })
    }
}

/// Reads a child stream to the end, forwarding each chunk to the sink.
async fn pump_output<R>(stream: Option<R>, sink: &dyn OutputSink) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(String::new());
    };
    let mut captured = Vec::new();
    let mut buf = [0u8; OUTPUT_CHUNK_SIZE];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let chunk = buf.get(..n).unwrap_or_default();
        sink.append(&String::from_utf8_lossy(chunk));
        captured.extend_from_slice(chunk);
    }
    Ok(String::from_utf8_lossy(&captured).into_owned())
}

// --- RENDERING ---

#[derive(Debug, Clone, Copy)]
struct ValueFormat {
    flavor: Option<ShellFlavor>,
    /// Double backslashes so substituted paths survive inside JS string literals.
    escape_backslashes: bool,
}

impl ValueFormat {
    fn apply(&self, value: &str) -> String {
        if self.escape_backslashes {
            value.replace('\\', "\\\\")
        } else {
            normalize_for_flavor(value, self.flavor)
        }
    }
}

/// Substitutes tokens: `param:name` from the parameters, any other key from the
/// predefined variables and then from the parameters. Unknown tokens stay.
fn render_with(
    text: &str,
    context: &ExecutionContext,
    parameters: &BTreeMap<String, String>,
    format: ValueFormat,
) -> String {
    render_tokens(text, |token| {
        let value = if token.key == PARAM_TOKEN_KEY {
            parameters.get(token.arg(0)?.trim()).cloned()
        } else {
            variables::resolve(&token.key, context).or_else(|| parameters.get(&token.key).cloned())
        }?;
        Some(format.apply(&value))
    })
}

/// Renders an env value and normalizes it for the shell flavor, unless the raw
/// value still carries `{{` template text.
fn render_env_value(
    raw: &str,
    context: &ExecutionContext,
    parameters: &BTreeMap<String, String>,
    format: ValueFormat,
) -> String {
    let rendered = render_with(raw, context, parameters, format);
    if raw.contains("{{") {
        rendered
    } else {
        normalize_for_flavor(&rendered, format.flavor)
    }
}

fn param_env_key(name: &str) -> String {
    format!("{}{}", PARAM_ENV_PREFIX, name.to_uppercase())
}

// --- TEMPORARY SCRIPTS ---

/// Writes the script into a fresh private directory as
/// `<actionId>-<unixMillis>.<ext>` and returns its path.
pub fn write_script(action_id: &str, extension: &str, script: &str) -> Result<PathBuf, ExecutorError> {
    let dir = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir()?
        .keep();
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.join(format!("{}-{}.{}", action_id, millis, extension));

    let content = normalize_line_endings(script, Platform::host().line_ending());
    if let Err(e) = fs::write(&path, content) {
        cleanup_script(&path);
        return Err(e.into());
    }
    if let Err(e) = make_executable(&path) {
        cleanup_script(&path);
        return Err(e.into());
    }
    log::debug!("Script written to '{}'.", path.display());
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn cleanup_owned_script(path: PathBuf) {
    cleanup_script(&path);
}

/// Deletes a temporary script and, recursively, its private directory.
/// Missing files are fine; anything else is logged and swallowed.
pub fn cleanup_script(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed temporary script '{}'.", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove temporary script '{}': {}", path.display(), e),
    }

    let Some(dir) = path.parent() else {
        return;
    };
    let is_private_dir = dir
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(TEMP_DIR_PREFIX));
    if !is_private_dir {
        return;
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove temporary directory '{}': {}", dir.display(), e),
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parameters::tests::ScriptedPrompter;
    use crate::models::{ActionDraft, EnvironmentVariable, Parameter, secret_key_for};
    use crate::system::output::tests::RecordingSink;
    use crate::system::secrets::MemorySecretStore;
    use tempfile::tempdir;

    fn action(language: Language, script: &str) -> ActionDefinition {
        ActionDraft {
            name: "sample".to_string(),
            language,
            script: script.to_string(),
            run_in_output_channel: Some(true),
            ..Default::default()
        }
        .into_definition()
    }

    fn executor_with(
        secrets: MemorySecretStore,
        prompter: Arc<ScriptedPrompter>,
        sink: Arc<RecordingSink>,
    ) -> ActionExecutor {
        ActionExecutor::new(Settings::default(), Arc::new(secrets), prompter, sink)
    }

    fn executor() -> ActionExecutor {
        executor_with(
            MemorySecretStore::new(),
            Arc::new(ScriptedPrompter::accepting_defaults()),
            Arc::new(RecordingSink::default()),
        )
    }

    fn context_in(dir: &Path) -> ExecutionContext {
        ExecutionContext {
            workspace_folders: vec![dir.to_path_buf()],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_secret_fails_before_launch() {
        let dir = tempdir().unwrap();
        let mut def = action(Language::Bash, "echo $TOKEN");
        def.env = vec![EnvironmentVariable::secret("TOKEN")];

        let err = executor()
            .prepare(&def, &context_in(dir.path()), &RunOptions::default())
            .unwrap_err();
        let expected_key = secret_key_for(&def.id, "TOKEN");
        assert!(matches!(
            &err,
            ExecutorError::SecretNotFound { env_key, secret_key, .. }
                if env_key == "TOKEN" && *secret_key == expected_key
        ));
    }

    #[test]
    fn test_env_overlay_markers_params_and_secrets() {
        let dir = tempdir().unwrap();
        let mut def = action(Language::Bash, "echo ${param:target:dev}");
        def.env = vec![
            EnvironmentVariable::plain("WHERE", "${workspaceFolder}/out"),
            EnvironmentVariable::secret("TOKEN"),
            EnvironmentVariable {
                key: "UNSET".to_string(),
                ..Default::default()
            },
            EnvironmentVariable::plain("BLANK", ""),
        ];
        let secrets = MemorySecretStore::new().with_secret(secret_key_for(&def.id, "TOKEN"), "");
        let exec = executor_with(
            secrets,
            Arc::new(ScriptedPrompter::accepting_defaults()),
            Arc::new(RecordingSink::default()),
        );

        let prepared = exec
            .prepare(&def, &context_in(dir.path()), &RunOptions::default())
            .unwrap();
        let root = dir.path().to_string_lossy().into_owned();

        assert_eq!(prepared.env[ACTION_ID_ENV], def.id);
        assert_eq!(prepared.env[WORKING_DIRECTORY_ENV], root);
        assert_eq!(prepared.env["WHERE"], format!("{}/out", root));
        assert_eq!(prepared.env["TOKEN"], "");
        assert_eq!(prepared.env["BLANK"], "");
        assert!(!prepared.env.contains_key("UNSET"));
        assert_eq!(prepared.env["PARAM_TARGET"], "dev");

        let shown = prepared.interesting_env();
        assert!(shown.contains(&format!("TOKEN={}", SECRET_MASK)));
        assert!(shown.contains(&"PARAM_TARGET=dev".to_string()));
    }

    #[test]
    fn test_script_file_is_removed_when_the_run_is_dropped() {
        let dir = tempdir().unwrap();
        let def = action(Language::Python, "print('${fileBasename}')");
        let ctx = ExecutionContext {
            active_file: Some(dir.path().join("main.rs")),
            ..context_in(dir.path())
        };
        let prepared = executor().prepare(&def, &ctx, &RunOptions::default()).unwrap();
        let script = prepared.plan.script_path.clone();

        assert!(script.is_file());
        assert_eq!(fs::read_to_string(&script).unwrap(), "print('main.rs')");
        let name = script.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("{}-", def.id)));
        assert!(name.ends_with(".py"));

        drop(prepared);
        assert!(!script.exists());
        assert!(!script.parent().unwrap().exists());
    }

    #[test]
    fn test_cleanup_twice_is_harmless() {
        let path = write_script("abc", "sh", "echo hi").unwrap();
        cleanup_script(&path);
        cleanup_script(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_removes_the_private_dir_with_extra_files() {
        let path = write_script("abc", "sh", "echo hi").unwrap();
        let dir = path.parent().unwrap().to_path_buf();
        fs::write(dir.join("side.txt"), "left behind").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();

        cleanup_script(&path);
        assert!(!dir.exists());
    }

    #[test]
    fn test_windows_wsl_plan_rewrites_paths() {
        let mut def = action(Language::Bash, "cat ${param:input}");
        def.working_directory = Some(r"C:\Users\dev\project".to_string());
        let exec = executor()
            .with_platform(Platform::Windows)
            .with_windows_bash(WindowsBash {
                command: r"C:\Windows\System32\bash.exe".to_string(),
                flavor: ShellFlavor::Wsl,
            });
        let mut options = RunOptions::default();
        options
            .provided_values
            .insert("input".to_string(), r"D:\data\in.txt".to_string());

        let prepared = exec
            .prepare(&def, &ExecutionContext::default(), &options)
            .unwrap();

        assert_eq!(prepared.plan.command, r"C:\Windows\System32\bash.exe");
        assert_eq!(prepared.plan.shell_flavor, Some(ShellFlavor::Wsl));
        assert_eq!(prepared.env["PARAM_INPUT"], "/mnt/d/data/in.txt");
        assert_eq!(
            fs::read_to_string(&prepared.plan.script_path).unwrap(),
            "cat /mnt/d/data/in.txt"
        );
    }

    #[test]
    fn test_windows_wsl_secrets_are_rendered_and_normalized() {
        let mut def = action(Language::Bash, "true");
        def.working_directory = Some(r"C:\Users\dev\project".to_string());
        def.env = vec![
            EnvironmentVariable::secret("KEYFILE"),
            EnvironmentVariable::secret("TOK"),
        ];
        let secrets = MemorySecretStore::new()
            .with_secret(secret_key_for(&def.id, "KEYFILE"), r"C:\Users\dev\key.pem")
            .with_secret(secret_key_for(&def.id, "TOK"), "${lineNumber}");
        let exec = executor_with(
            secrets,
            Arc::new(ScriptedPrompter::accepting_defaults()),
            Arc::new(RecordingSink::default()),
        )
        .with_platform(Platform::Windows)
        .with_windows_bash(WindowsBash {
            command: r"C:\Windows\System32\bash.exe".to_string(),
            flavor: ShellFlavor::Wsl,
        });
        let ctx = ExecutionContext {
            line_number: Some(7),
            ..Default::default()
        };

        let prepared = exec.prepare(&def, &ctx, &RunOptions::default()).unwrap();

        assert_eq!(prepared.env["KEYFILE"], "/mnt/c/Users/dev/key.pem");
        assert_eq!(prepared.env["TOK"], "7");
        let shown = prepared.interesting_env();
        assert!(shown.contains(&format!("KEYFILE={}", SECRET_MASK)));
        assert!(!shown.iter().any(|line| line.contains("key.pem")));
    }

    #[test]
    fn test_node_on_windows_doubles_backslashes() {
        let mut def = action(Language::Node, "console.log('${param:p}')");
        def.working_directory = Some(std::env::temp_dir().to_string_lossy().into_owned());
        let mut options = RunOptions::default();
        options
            .provided_values
            .insert("p".to_string(), r"C:\a\b".to_string());

        let prepared = executor()
            .with_platform(Platform::Windows)
            .prepare(&def, &ExecutionContext::default(), &options)
            .unwrap();

        assert_eq!(prepared.plan.command, "node");
        assert_eq!(prepared.plan.args.len(), 1, "no loader without a resolver");
        let script = fs::read_to_string(&prepared.plan.script_path).unwrap();
        assert!(script.contains(r"C:\\a\\b"));
    }

    #[test]
    fn test_output_routing_precedence() {
        let dir = tempdir().unwrap();
        let mut def = action(Language::Bash, "true");
        def.run_in_output_channel = None;
        let exec = executor();
        let ctx = context_in(dir.path());

        let prepared = exec.prepare(&def, &ctx, &RunOptions::default()).unwrap();
        assert_eq!(prepared.mode, LaunchMode::OutputChannel);

        def.run_in_output_channel = Some(false);
        let prepared = exec.prepare(&def, &ctx, &RunOptions::default()).unwrap();
        assert_eq!(prepared.mode, LaunchMode::Terminal);

        let forced = RunOptions {
            force_output_channel: Some(true),
            ..Default::default()
        };
        let prepared = exec.prepare(&def, &ctx, &forced).unwrap();
        assert_eq!(prepared.mode, LaunchMode::OutputChannel);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_end_to_end_default_parameter() {
        let dir = tempdir().unwrap();
        let def = action(Language::Bash, "echo ${param:name:World}");
        let prompter = Arc::new(ScriptedPrompter::accepting_defaults());
        let sink = Arc::new(RecordingSink::default());
        let exec = executor_with(MemorySecretStore::new(), Arc::clone(&prompter), Arc::clone(&sink));

        let result = exec
            .run(&def, &context_in(dir.path()), RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "World\n");
        assert_eq!(result.action_id, def.id);
        assert_eq!(sink.text(), "World\n");
        assert_eq!(prompter.request_count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_a_result_not_an_error() {
        let dir = tempdir().unwrap();
        let mut def = action(Language::Bash, "echo oops >&2\nexit 4");
        def.parameters = vec![Parameter {
            name: "unused".to_string(),
            default_value: Some("x".to_string()),
            ..Default::default()
        }];

        let result = executor()
            .run(&def, &context_in(dir.path()), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(4));
        assert_eq!(result.stderr, "oops\n");
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_launch_error() {
        let dir = tempdir().unwrap();
        let def = action(Language::Bash, "true");
        let exec = executor().with_platform(Platform::Windows).with_windows_bash(WindowsBash {
            command: "runbox-no-such-shell".to_string(),
            flavor: ShellFlavor::Other,
        });

        let err = exec
            .run(&def, &context_in(dir.path()), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Launch { .. }));
    }
}
