//! Configuration for script-bridge, read from `script.toml`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [provider]
//! interpreter = ["/bin/bash", "-c"]
//! environment = { REGION = "eu" }
//! log_output = true
//!
//! [provider.timeouts]
//! create = "30s"
//! update = "2h45m"
//!
//! [script]
//! environment = { NAME = "demo" }
//! working_directory = "."
//! output_drift = false
//! inputs = { file_name = "x" }
//!
//! [script.timeouts]
//! read = "5s"
//!
//! [script.os_commands.default]
//! create = { command = "./create.sh" }
//! read = { command = "./read.sh" }
//! update = { command = "./update.sh" }
//! delete = { command = "./delete.sh" }
//!
//! [script.os_commands.windows]
//! create = { command = "./create.ps1", interpreter = ["pwsh", "-c"] }
//! read = { command = "./read.ps1" }
//! update = { command = "./update.ps1" }
//! delete = { command = "" }
//! ```
//!
//! Command sets are chosen by operating system name (`linux`, `macos`,
//! `windows`, ...) with `default` as the fallback. A `default` set is always
//! required.

use crate::script::Lifecycle;
use crate::shell::DEFAULT_TIMEOUT;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Name of the fallback command set.
pub const DEFAULT_OS_KEY: &str = "default";

const KNOWN_OS_KEYS: &[&str] = &[
    DEFAULT_OS_KEY,
    "linux",
    "macos",
    "windows",
    "freebsd",
    "netbsd",
    "openbsd",
    "dragonfly",
    "solaris",
    "illumos",
    "android",
    "ios",
];

static DURATION_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)(ms|h|m|s)").unwrap());

/// Interpreter used when neither the command nor the provider sets one.
pub fn default_interpreter() -> Vec<String> {
    if cfg!(windows) {
        vec!["pwsh".to_string(), "-c".to_string()]
    } else {
        vec!["/bin/bash".to_string(), "-c".to_string()]
    }
}

/// Parse a duration such as `30s`, `500ms`, `1.5m` or `2h45m`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Invalid duration '': expected a number with unit ms, s, m or h");
    }

    let mut total = 0f64;
    let mut consumed = 0;
    for caps in DURATION_PART.captures_iter(text) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        if whole.start != consumed {
            break;
        }
        consumed = whole.end;

        let amount: f64 = caps[1]
            .parse()
            .with_context(|| format!("Invalid duration '{}'", text))?;
        let seconds_per_unit = match &caps[2] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => unreachable!("unit is constrained by the pattern"),
        };
        total += amount * seconds_per_unit;
    }

    if consumed != text.len() {
        anyhow::bail!(
            "Invalid duration '{}': expected a number with unit ms, s, m or h (e.g. '30s', '2h45m')",
            text
        );
    }
    Duration::try_from_secs_f64(total)
        .map_err(|_| anyhow::anyhow!("Invalid duration '{}': out of range", text))
}

/// Optional per-phase timeouts, as duration strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutsSection {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub create: Option<String>,
    #[serde(default)]
    pub read: Option<String>,
    #[serde(default)]
    pub update: Option<String>,
    #[serde(default)]
    pub delete: Option<String>,
}

impl TimeoutsSection {
    fn entries(&self) -> [(Lifecycle, Option<&String>); 5] {
        [
            (Lifecycle::Plan, self.plan.as_ref()),
            (Lifecycle::Create, self.create.as_ref()),
            (Lifecycle::Read, self.read.as_ref()),
            (Lifecycle::Update, self.update.as_ref()),
            (Lifecycle::Delete, self.delete.as_ref()),
        ]
    }

    /// Layer these timeouts over `base`.
    pub fn apply(&self, base: &Timeouts) -> Result<Timeouts> {
        let mut resolved = base.clone();
        for (phase, value) in self.entries() {
            if let Some(text) = value {
                let duration = parse_duration(text)
                    .with_context(|| format!("Invalid {} timeout", phase))?;
                resolved.set(phase, duration);
            }
        }
        Ok(resolved)
    }
}

/// Resolved deadline for each phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub plan: Duration,
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            plan: DEFAULT_TIMEOUT,
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn for_phase(&self, phase: Lifecycle) -> Duration {
        match phase {
            Lifecycle::Plan => self.plan,
            Lifecycle::Create => self.create,
            Lifecycle::Read => self.read,
            Lifecycle::Update => self.update,
            Lifecycle::Delete => self.delete,
        }
    }

    fn set(&mut self, phase: Lifecycle, duration: Duration) {
        match phase {
            Lifecycle::Plan => self.plan = duration,
            Lifecycle::Create => self.create = duration,
            Lifecycle::Read => self.read = duration,
            Lifecycle::Update => self.update = duration,
            Lifecycle::Delete => self.delete = duration,
        }
    }
}

/// Provider-wide defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSection {
    /// Interpreter for commands that don't set their own
    #[serde(default)]
    pub interpreter: Option<Vec<String>>,
    /// Variables passed to every script
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Forward `[LEVEL]` lines from script output to the log
    #[serde(default)]
    pub log_output: bool,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
}

/// One command and its optional interpreter override.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandEntry {
    pub command: String,
    #[serde(default)]
    pub interpreter: Option<Vec<String>>,
}

/// Commands for every lifecycle phase on one operating system.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSet {
    /// Optional; without it the plan is derived from prior state
    #[serde(default)]
    pub plan: Option<CommandEntry>,
    pub create: CommandEntry,
    pub read: CommandEntry,
    pub update: CommandEntry,
    pub delete: CommandEntry,
}

impl CommandSet {
    pub fn entry(&self, phase: Lifecycle) -> Option<&CommandEntry> {
        match phase {
            Lifecycle::Plan => self.plan.as_ref(),
            Lifecycle::Create => Some(&self.create),
            Lifecycle::Read => Some(&self.read),
            Lifecycle::Update => Some(&self.update),
            Lifecycle::Delete => Some(&self.delete),
        }
    }
}

/// The scripted resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptSection {
    /// Variables merged over the provider environment
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Compare read output with prior state to detect drift
    #[serde(default)]
    pub output_drift: bool,
    /// Any value; passed to every phase as JSON
    #[serde(default)]
    pub inputs: Option<Value>,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    /// OS name or `default` to command set
    #[serde(default)]
    pub os_commands: HashMap<String, CommandSet>,
}

/// Root of `script.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptToml {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub script: ScriptSection,
}

impl ScriptToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse script.toml")
    }

    /// Pick the command set for `os`, falling back to `default`.
    pub fn command_set(&self, os: &str) -> Result<&CommandSet> {
        let commands = &self.script.os_commands;
        let default = commands
            .get(DEFAULT_OS_KEY)
            .context("Default commands are required")?;
        Ok(commands.get(os).unwrap_or(default))
    }

    /// Resolve everything needed to run the resource on `os`.
    pub fn resolve_for(&self, os: &str) -> Result<ResolvedScript> {
        let set = self.command_set(os)?;
        let provider_interpreter = self
            .provider
            .interpreter
            .clone()
            .unwrap_or_else(default_interpreter);

        let resolve = |entry: &CommandEntry| ResolvedCommand {
            interpreter: entry
                .interpreter
                .clone()
                .unwrap_or_else(|| provider_interpreter.clone()),
            command: entry.command.clone(),
        };

        let mut environment = self.provider.environment.clone();
        environment.extend(
            self.script
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let timeouts = self
            .provider
            .timeouts
            .apply(&Timeouts::default())
            .context("Invalid provider timeouts")?;
        let timeouts = self
            .script
            .timeouts
            .apply(&timeouts)
            .context("Invalid script timeouts")?;

        Ok(ResolvedScript {
            commands: ResolvedCommands {
                plan: set.plan.as_ref().map(resolve),
                create: resolve(&set.create),
                read: resolve(&set.read),
                update: resolve(&set.update),
                delete: resolve(&set.delete),
            },
            environment,
            working_dir: self.script.working_directory.clone(),
            inputs: self.script.inputs.clone(),
            output_drift: self.script.output_drift,
            log_output: self.provider.log_output,
            timeouts,
        })
    }

    /// Resolve for the operating system this binary runs on.
    pub fn resolve(&self) -> Result<ResolvedScript> {
        self.resolve_for(std::env::consts::OS)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.script.os_commands.contains_key(DEFAULT_OS_KEY) {
            warnings.push("Missing [script.os_commands.default]: default commands are required".to_string());
        }

        let mut os_keys: Vec<&String> = self.script.os_commands.keys().collect();
        os_keys.sort();
        for os in os_keys {
            if !KNOWN_OS_KEYS.contains(&os.as_str()) {
                warnings.push(format!(
                    "Unknown operating system '{}' in os_commands; it will never be selected",
                    os
                ));
            }
            let set = &self.script.os_commands[os];
            for phase in [Lifecycle::Create, Lifecycle::Read, Lifecycle::Update] {
                if let Some(entry) = set.entry(phase)
                    && entry.command.trim().is_empty()
                {
                    warnings.push(format!("Empty {} command for '{}'", phase, os));
                }
            }
            for phase in Lifecycle::ALL {
                if let Some(interpreter) = set.entry(phase).and_then(|e| e.interpreter.as_ref())
                    && interpreter.is_empty()
                {
                    warnings.push(format!("Empty interpreter for {} command on '{}'", phase, os));
                }
            }
        }

        if let Some(interpreter) = &self.provider.interpreter
            && interpreter.is_empty()
        {
            warnings.push("Empty provider interpreter: at least one element is required".to_string());
        }

        for (section, timeouts) in [
            ("provider", &self.provider.timeouts),
            ("script", &self.script.timeouts),
        ] {
            for (phase, value) in timeouts.entries() {
                if let Some(text) = value
                    && parse_duration(text).is_err()
                {
                    warnings.push(format!(
                        "Invalid {} timeout '{}' in [{}.timeouts]",
                        phase, text, section
                    ));
                }
            }
        }

        if let Some(dir) = &self.script.working_directory
            && !dir.as_os_str().is_empty()
            && !dir.is_dir()
        {
            warnings.push(format!(
                "Working directory '{}' does not exist",
                dir.display()
            ));
        }

        warnings
    }
}

/// A command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub interpreter: Vec<String>,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommands {
    pub plan: Option<ResolvedCommand>,
    pub create: ResolvedCommand,
    pub read: ResolvedCommand,
    pub update: ResolvedCommand,
    pub delete: ResolvedCommand,
}

impl ResolvedCommands {
    pub fn for_phase(&self, phase: Lifecycle) -> Option<&ResolvedCommand> {
        match phase {
            Lifecycle::Plan => self.plan.as_ref(),
            Lifecycle::Create => Some(&self.create),
            Lifecycle::Read => Some(&self.read),
            Lifecycle::Update => Some(&self.update),
            Lifecycle::Delete => Some(&self.delete),
        }
    }
}

/// Effective settings for one scripted resource on the current OS.
#[derive(Debug, Clone)]
pub struct ResolvedScript {
    pub commands: ResolvedCommands,
    /// Provider environment with resource environment layered on top
    pub environment: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub inputs: Option<Value>,
    pub output_drift: bool,
    pub log_output: bool,
    pub timeouts: Timeouts,
}
