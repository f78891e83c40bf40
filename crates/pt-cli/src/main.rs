//! pt: ptnotes command-line interface
//!
//! Single notes (paths relative to the working directory):
//!   cat <path>...                  - print notes, decrypting as needed
//!   encrypt <in> [<out>]           - encrypt a plain file into a note format
//!   decrypt <in> [<out>]           - write a note's plaintext
//!   diff <a> <b>                   - tagged line diff of two notes
//!   merge <this> <base> <other>    - three-way merge, exit 1 on conflicts
//!
//! Note tree (paths relative to the note root):
//!   ls [<dir>]                     - list notes and directories
//!   add [<relpath>]                - save stdin as a note
//!   search <term>                  - search notes, optionally encrypted ones
//!
//! Other:
//!   handlers                       - list supported note formats
//!   config show                    - display current configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use pt_core::config::{PtConfig, DEFAULT_CONFIG_PATH};
use pt_core::IncludeEncrypted;
use pt_crypto::NoteKey;
use pt_formats::{HandlerRegistry, NoteHandler};
use pt_merge::{DiffKind, MergeStrategy};
use pt_store::{NoteStore, SaveOptions, SearchOptions, TextCodec};

mod passwords;

use passwords::CachingPassword;

/// Password prompts allowed before giving up on a note.
const PROMPT_ATTEMPTS: u32 = 3;

const HIGHLIGHT_START: &str = "\x1b[1;31m";
const HIGHLIGHT_STOP: &str = "\x1b[0m";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pt",
    version,
    about = "Plain-text and encrypted notes",
    long_about = "pt: read, write, search and merge notes stored as plain text, \
                  WinZip AES archives or Tombo CHI files"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "PT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Note tree root (overrides config note_root)
    #[arg(long, short = 'r', env = "PT_NOTE_ROOT")]
    root: Option<PathBuf>,

    /// Password for encrypted notes; prompted for when unset
    #[arg(long, env = "PT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level or filter directive (overrides config; RUST_LOG wins)
    #[arg(long = "log", env = "PT_LOG")]
    log_level: Option<String>,

    /// Log format: text or json (overrides config)
    #[arg(long, env = "PT_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print notes to stdout, decrypting as needed
    Cat {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Encrypt a file into the format named by the output extension
    Encrypt {
        input: PathBuf,
        /// Output note (default: input + config default_encryption_ext)
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Write the plaintext of a note
    Decrypt {
        input: PathBuf,
        /// Output file (default: stdout)
        output: Option<PathBuf>,
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// List notes and directories under the note root
    Ls {
        dir: Option<PathBuf>,
        /// List every note below `dir`
        #[arg(long, short = 'R')]
        recursive: bool,
    },

    /// Save stdin as a note under the note root
    ///
    /// Without a path the name is taken from the first line of the text.
    Add {
        relpath: Option<PathBuf>,
        /// Use config default_encryption_ext for generated names
        #[arg(long, short = 'e')]
        encrypt: bool,
        /// Text encoding for the saved bytes (default: first configured codec)
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Search the note tree
    Search {
        term: String,
        /// Treat the term as a regular expression
        #[arg(long, short = 'E')]
        regex: bool,
        #[arg(long, short = 'i')]
        ignore_case: bool,
        /// Which notes to open: no, yes or only encrypted ones
        #[arg(long, default_value = "no")]
        encrypted: IncludeEncrypted,
        /// Match file names instead of contents
        #[arg(long)]
        filename_only: bool,
        /// Print only the names of notes with matches
        #[arg(long = "files-with-matches", short = 'l')]
        files_with_matches: bool,
        /// Limit the search to a subdirectory of the root
        #[arg(long)]
        subdir: Option<PathBuf>,
        /// One JSON object per matching note
        #[arg(long)]
        json: bool,
    },

    /// Tagged line diff of two notes
    Diff {
        a: PathBuf,
        b: PathBuf,
        /// histogram, myers or ndiff (default: config merge.diff)
        #[arg(long)]
        diff_kind: Option<DiffKind>,
    },

    /// Three-way merge; exits with status 1 when conflicts remain
    Merge {
        this: PathBuf,
        /// Common ancestor, or "-" to derive one from `this` and `other`
        base: PathBuf,
        other: PathBuf,
        /// default, ours or theirs (default: config merge.strategy)
        #[arg(long, short = 's')]
        strategy: Option<MergeStrategy>,
        #[arg(long)]
        diff_kind: Option<DiffKind>,
        /// Write the result here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List supported note formats
    Handlers,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let mut cli = Cli::parse();
    let config = PtConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    let format = cli.log_format.as_deref().unwrap_or(&config.log.format);
    init_logging(level, LogFormat::parse(format));

    let passwords = Passwords {
        given: cli.password.take().map(SecretString::from),
    };
    let app = App {
        config,
        root: cli.root.take(),
        passwords,
    };

    match cli.command {
        Commands::Cat { paths } => cmd_cat(&app, &paths),
        Commands::Encrypt { input, output, force } => {
            cmd_encrypt(&app, &input, output.as_deref(), force)
        }
        Commands::Decrypt { input, output, force } => {
            cmd_decrypt(&app, &input, output.as_deref(), force)
        }
        Commands::Ls { dir, recursive } => cmd_ls(&app, dir.as_deref(), recursive),
        Commands::Add { relpath, encrypt, encoding } => {
            cmd_add(&app, relpath.as_deref(), encrypt, encoding.as_deref())
        }
        Commands::Search {
            term,
            regex,
            ignore_case,
            encrypted,
            filename_only,
            files_with_matches,
            subdir,
            json,
        } => {
            let options = SearchOptions {
                regex,
                ignore_case,
                include_encrypted: encrypted,
                filename_only,
                files_with_matches,
                highlight: (!json && std::io::stdout().is_terminal())
                    .then(|| (HIGHLIGHT_START.to_string(), HIGHLIGHT_STOP.to_string())),
                subdir,
            };
            cmd_search(&app, &term, options, json)
        }
        Commands::Diff { a, b, diff_kind } => cmd_diff(&app, &a, &b, diff_kind),
        Commands::Merge {
            this,
            base,
            other,
            strategy,
            diff_kind,
            output,
        } => cmd_merge(
            &app,
            &this,
            &base,
            &other,
            strategy,
            diff_kind,
            output.as_deref(),
        ),
        Commands::Handlers => cmd_handlers(),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&app.config, &cli.config),
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Logs go to stderr; stdout carries note contents.
fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct App {
    config: PtConfig,
    root: Option<PathBuf>,
    passwords: Passwords,
}

impl App {
    fn note_root(&self) -> Result<PathBuf> {
        match self.root.clone().or_else(|| self.config.note_root()) {
            Some(root) => Ok(root),
            None => std::env::current_dir().context("no note root configured"),
        }
    }

    fn codec(&self) -> Result<TextCodec> {
        TextCodec::from_labels(self.config.codec.as_slice()).context("config codec")
    }

    fn open_store(&self) -> Result<NoteStore> {
        let root = self.note_root()?;
        let store = NoteStore::open(&root)
            .with_context(|| format!("opening note root {}", root.display()))?;
        Ok(store.with_codec(self.codec()?))
    }

    fn diff_kind(&self, flag: Option<DiffKind>) -> Result<DiffKind> {
        match flag {
            Some(kind) => Ok(kind),
            None => self.config.merge.diff.parse().context("config merge.diff"),
        }
    }

    fn strategy(&self, flag: Option<MergeStrategy>) -> Result<MergeStrategy> {
        match flag {
            Some(strategy) => Ok(strategy),
            None => self.config.merge.strategy.parse().context("config merge.strategy"),
        }
    }
}

/// The `--password`/`PT_PASSWORD` value, or interactive prompts.
struct Passwords {
    given: Option<SecretString>,
}

impl Passwords {
    fn key_for(&self, path: &Path) -> Result<NoteKey> {
        if let Some(password) = &self.given {
            return Ok(NoteKey::from_secret(password));
        }
        let password = rpassword::prompt_password(format!("Password for {}: ", path.display()))
            .context("reading password")?;
        Ok(NoteKey::from_secret(&SecretString::from(password)))
    }

    /// Like [`Passwords::key_for`] but asks twice when prompting.
    fn new_key_for(&self, path: &Path) -> Result<NoteKey> {
        if self.given.is_some() {
            return self.key_for(path);
        }
        let first = SecretString::from(
            rpassword::prompt_password(format!("New password for {}: ", path.display()))
                .context("reading password")?,
        );
        let second = SecretString::from(
            rpassword::prompt_password("Repeat password: ").context("reading password")?,
        );
        if first.expose_secret() != second.expose_secret() {
            bail!("passwords do not match");
        }
        Ok(NoteKey::from_secret(&first))
    }

    fn attempts(&self) -> u32 {
        if self.given.is_some() {
            1
        } else {
            PROMPT_ATTEMPTS
        }
    }
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))
}

/// Plaintext of the note at `path`, re-prompting on a wrong password.
fn read_note(passwords: &Passwords, path: &Path) -> Result<Vec<u8>> {
    let registry = HandlerRegistry::global();
    let name = file_name(path)?;
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    if !registry.is_encrypted(name) {
        let handler = registry.handler_for(name, NoteKey::default())?;
        return Ok(handler.decode(&data)?);
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let handler = registry.handler_for(name, passwords.key_for(path)?)?;
        match handler.decode(&data) {
            Ok(plain) => return Ok(plain),
            Err(e) if e.is_recoverable() && attempt < passwords.attempts() => {
                eprintln!("{e}, try again");
            }
            Err(e) => return Err(e).with_context(|| format!("decoding {}", path.display())),
        }
    }
}

/// Encode `plaintext` in the format named by `path` (raw bytes for
/// unrecognised extensions) and write it.
fn write_note(passwords: &Passwords, path: &Path, plaintext: &[u8]) -> Result<()> {
    let registry = HandlerRegistry::global();
    let name = file_name(path)?;
    let data = if registry.is_supported(name) {
        let key = if registry.is_encrypted(name) {
            passwords.new_key_for(path)?
        } else {
            NoteKey::default()
        };
        registry.handler_for(name, key)?.encode(plaintext)?
    } else {
        plaintext.to_vec()
    };
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

// ── Single-note commands ──────────────────────────────────────────────────────

fn cmd_cat(app: &App, paths: &[PathBuf]) -> Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();
    for path in paths {
        let plain = read_note(&app.passwords, path)?;
        stdout.write_all(&plain)?;
    }
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_encrypt(
    app: &App,
    input: &Path,
    output: Option<&Path>,
    force: bool,
) -> Result<ExitCode> {
    let output = match output {
        Some(p) => p.to_path_buf(),
        None => {
            let mut name = input.as_os_str().to_owned();
            name.push(&app.config.default_encryption_ext);
            PathBuf::from(name)
        }
    };
    let name = file_name(&output)?;
    if !HandlerRegistry::global().is_encrypted(name) {
        bail!("{} does not name an encrypted note format", output.display());
    }
    refuse_overwrite(&output, force)?;

    let plain = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    write_note(&app.passwords, &output, &plain)?;
    tracing::info!(input = %input.display(), output = %output.display(), "encrypted");
    eprintln!("wrote {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_decrypt(
    app: &App,
    input: &Path,
    output: Option<&Path>,
    force: bool,
) -> Result<ExitCode> {
    let plain = read_note(&app.passwords, input)?;
    match output {
        Some(output) => {
            refuse_overwrite(output, force)?;
            std::fs::write(output, &plain)
                .with_context(|| format!("writing {}", output.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&plain)?;
            stdout.flush()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_diff(app: &App, a: &Path, b: &Path, kind: Option<DiffKind>) -> Result<ExitCode> {
    let kind = app.diff_kind(kind)?;
    let a = read_note(&app.passwords, a)?;
    let b = read_note(&app.passwords, b)?;

    let mut stdout = std::io::stdout().lock();
    for line in pt_merge::diff(kind, &a, &b) {
        stdout.write_all(&line)?;
        if !line.ends_with(b"\n") {
            stdout.write_all(b"\n")?;
        }
    }
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_merge(
    app: &App,
    this: &Path,
    base: &Path,
    other: &Path,
    strategy: Option<MergeStrategy>,
    kind: Option<DiffKind>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let kind = app.diff_kind(kind)?;
    let strategy = app.strategy(strategy)?;

    let this = read_note(&app.passwords, this)?;
    let other = read_note(&app.passwords, other)?;
    let base = if base == Path::new("-") {
        None
    } else {
        Some(read_note(&app.passwords, base)?)
    };

    let result = pt_merge::merge3(&this, &other, base.as_deref(), kind, strategy);
    tracing::debug!(
        diff = %kind,
        strategy = %strategy,
        conflicts = result.conflicts.len(),
        "merged"
    );

    match output {
        Some(path) => write_note(&app.passwords, path, &result.merged)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&result.merged)?;
            stdout.flush()?;
        }
    }

    if result.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} conflict(s)", result.conflicts.len());
        Ok(ExitCode::from(1))
    }
}

// ── Note tree commands ────────────────────────────────────────────────────────

fn cmd_ls(app: &App, dir: Option<&Path>, recursive: bool) -> Result<ExitCode> {
    let store = app.open_store()?;
    if recursive {
        for note in store.recurse_notes(dir)? {
            println!("{}", note?.display());
        }
    } else {
        let contents = store.directory_contents(dir)?;
        for d in &contents.dirs {
            println!("{d}/");
        }
        for note in &contents.notes {
            println!("{note}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_add(
    app: &App,
    relpath: Option<&Path>,
    encrypt: bool,
    encoding: Option<&str>,
) -> Result<ExitCode> {
    let store = app.open_store()?;
    let registry = store.registry();

    let name = match relpath {
        Some(p) => file_name(p)?.to_string(),
        None if encrypt => format!("new{}", app.config.default_encryption_ext),
        None => format!("new{}", app.config.default_text_ext),
    };
    let key = if registry.is_encrypted(&name) {
        app.passwords
            .new_key_for(relpath.unwrap_or(Path::new("new note")))?
    } else {
        NoteKey::default()
    };
    let handler: Box<dyn NoteHandler> = registry.handler_for(&name, key)?;

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading note text from stdin")?;

    let options = SaveOptions {
        encoding,
        backup: app.config.backup,
        ..SaveOptions::default()
    };
    let saved = store.note_contents_save(&text, relpath, handler.as_ref(), &options)?;
    println!("{}", saved.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_search(app: &App, term: &str, options: SearchOptions, json: bool) -> Result<ExitCode> {
    let store = app.open_store()?;
    let provider = CachingPassword::new(|path: &Path| match app.passwords.key_for(path) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "no password");
            None
        }
    });

    let mut stdout = std::io::stdout().lock();
    for hit in store.search(term, options, provider, CancellationToken::new())? {
        let hit = hit?;
        if json {
            writeln!(stdout, "{}", serde_json::to_string(&hit)?)?;
        } else if hit.lines.is_empty() {
            writeln!(stdout, "{}", hit.path.display())?;
        } else {
            for (n, line) in &hit.lines {
                writeln!(stdout, "{}:{n}:{line}", hit.path.display())?;
            }
        }
    }
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

// ── Info commands ─────────────────────────────────────────────────────────────

fn cmd_handlers() -> Result<ExitCode> {
    println!("{:<14} {:<8} {:<10} DESCRIPTION", "EXTENSION", "NAME", "ENCRYPTED");
    for info in HandlerRegistry::global().entries() {
        println!(
            "{:<14} {:<8} {:<10} {}",
            info.extension,
            info.name,
            if info.encrypted { "yes" } else { "no" },
            info.description
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(config: &PtConfig, config_path: &Path) -> Result<ExitCode> {
    let config_path = pt_core::config::expand_tilde(config_path);
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "pt", "search", "todo", "-i", "--encrypted", "only", "-l", "--regex",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                term,
                ignore_case,
                encrypted,
                files_with_matches,
                regex,
                filename_only,
                ..
            } => {
                assert_eq!(term, "todo");
                assert!(ignore_case && files_with_matches && regex && !filename_only);
                assert_eq!(encrypted, IncludeEncrypted::Only);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_merge() {
        let cli = Cli::try_parse_from([
            "pt", "merge", "a.txt", "-", "b.txt", "-s", "ort-theirs", "--diff-kind", "myers",
        ])
        .unwrap();
        match cli.command {
            Commands::Merge {
                base,
                strategy,
                diff_kind,
                output,
                ..
            } => {
                assert_eq!(base, PathBuf::from("-"));
                assert_eq!(strategy, Some(MergeStrategy::Theirs));
                assert_eq!(diff_kind, Some(DiffKind::Myers));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_diff_kind() {
        assert!(Cli::try_parse_from(["pt", "diff", "a", "b", "--diff-kind", "patience"]).is_err());
    }

    #[test]
    fn test_log_format() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Text);
    }
}
