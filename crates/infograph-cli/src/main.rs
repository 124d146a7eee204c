use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use infograph_contracts::{
    AttachmentRole, EventWriter, FileSessionStore, InputType, KeySources, Language, SessionStore,
    StyleCatalog, Submission,
};
use infograph_engine::{
    CredentialSelector, GenerationError, HttpTransport, Orchestrator, Studio, StudioConfig,
};
use tracing_subscriber::EnvFilter;

const EXIT_VALIDATION: i32 = 2;
const FALLBACK_GLYPH: &str = "◆";

#[derive(Debug, Parser)]
#[command(name = "infograph", version, about = "Infographic studio CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available visual styles.
    Styles,
    /// Validate input and print the composed prompt without calling the model.
    Compose(ComposeArgs),
    /// Generate an infographic.
    Generate(GenerateArgs),
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    Show,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputTypeArg {
    Text,
    Csv,
    Image,
    Whitepaper,
}

impl From<InputTypeArg> for InputType {
    fn from(value: InputTypeArg) -> Self {
        match value {
            InputTypeArg::Text => InputType::Text,
            InputTypeArg::Csv => InputType::Csv,
            InputTypeArg::Image => InputType::Image,
            InputTypeArg::Whitepaper => InputType::Whitepaper,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LanguageArg {
    English,
    Vietnamese,
}

impl From<LanguageArg> for Language {
    fn from(value: LanguageArg) -> Self {
        match value {
            LanguageArg::English => Language::English,
            LanguageArg::Vietnamese => Language::Vietnamese,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct InputArgs {
    #[arg(long, value_enum, default_value = "text")]
    input_type: InputTypeArg,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    concept: Option<String>,
    #[arg(long)]
    data: Option<String>,
    #[arg(long)]
    conclusion: Option<String>,
    #[arg(long)]
    logo: Option<PathBuf>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long, value_enum, default_value = "english")]
    language: LanguageArg,
    #[arg(long)]
    instructions: Option<String>,
}

#[derive(Debug, Parser)]
struct ComposeArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    print_data_uri: bool,
    #[arg(long)]
    no_prompt: bool,
}

fn main() {
    dotenv::dotenv().ok();
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("infograph error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = StudioConfig::from_env();
    match cli.command {
        Command::Styles => run_styles(&config),
        Command::Compose(args) => run_compose(&config, args),
        Command::Generate(args) => run_generate(&config, args),
        Command::Session(command) => run_session(&config, command),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<GenerationError>() {
        Some(generation) if generation.is_user_input() => EXIT_VALIDATION,
        _ => 1,
    }
}

fn load_catalog(config: &StudioConfig) -> Result<StyleCatalog> {
    let catalog = match config.styles_path.as_deref() {
        Some(path) => StyleCatalog::from_path(path)?,
        None => StyleCatalog::builtin()?,
    };
    tracing::debug!(styles = catalog.len(), "style catalog loaded");
    Ok(catalog)
}

fn build_studio(
    config: &StudioConfig,
    catalog: StyleCatalog,
) -> Result<(Studio, Arc<dyn SessionStore>)> {
    let sessions: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.session_path));
    let transport = Arc::new(HttpTransport::new(config.api_base.clone())?);
    let studio = Studio::new(
        catalog,
        Orchestrator::new(transport),
        sessions.clone(),
        KeySources::from_environment(),
    );
    Ok((studio, sessions))
}

fn run_styles(config: &StudioConfig) -> Result<i32> {
    let catalog = load_catalog(config)?;
    let default_id = catalog.default_style().id.clone();
    let mut stdout = io::stdout().lock();
    for style in catalog.iter() {
        let marker = if style.id == default_id { "*" } else { " " };
        writeln!(
            stdout,
            "{marker} {} {:<14} {:<28} {}",
            icon_glyph(&style.icon),
            style.id,
            style.name,
            style.description
        )?;
    }
    Ok(0)
}

fn run_compose(config: &StudioConfig, args: ComposeArgs) -> Result<i32> {
    let catalog = load_catalog(config)?;
    let submission = build_submission(&args.input, &catalog)?;
    let (studio, _) = build_studio(config, catalog)?;
    let (request, composed) = studio.preview(submission)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", composed.text)?;
    writeln!(stdout)?;
    writeln!(
        stdout,
        "input_type={} style={} language={}",
        request.input_type().as_str(),
        request.style_id,
        request.language.as_str()
    )?;
    for attachment in &composed.attachments {
        let role = match attachment.role {
            AttachmentRole::Primary => "primary",
            AttachmentRole::Logo => "logo",
        };
        writeln!(
            stdout,
            "attachment role={role} mime={} base64_len={}",
            attachment.mime_type,
            attachment.data.len()
        )?;
    }
    Ok(0)
}

fn run_generate(config: &StudioConfig, args: GenerateArgs) -> Result<i32> {
    let catalog = load_catalog(config)?;
    let submission = build_submission(&args.input, &catalog)?;
    let (mut studio, sessions) = build_studio(config, catalog)?;

    if !args.no_prompt && io::stdin().is_terminal() {
        let selector = StdinCredentialSelector::new(
            sessions.clone(),
            KeySources::from_environment(),
            Box::new(io::BufReader::new(io::stdin())),
        );
        studio = studio.with_selector(Arc::new(selector));
    }
    if let Some(path) = args.events.as_ref() {
        let session = sessions.load_or_create()?;
        studio = studio.with_events(EventWriter::new(path, session.session_id));
    }

    let image = studio.submit(submission)?;

    if let Some(out) = args.out.as_ref() {
        let bytes = image.decode().context("generated image is not valid base64")?;
        if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        fs::write(out, &bytes).with_context(|| format!("failed writing {}", out.display()))?;
        tracing::info!(path = %out.display(), bytes = bytes.len(), "infographic saved");
        println!("{}", out.display());
    }
    if args.print_data_uri || args.out.is_none() {
        println!("{}", image.data_uri);
    }
    Ok(0)
}

fn run_session(config: &StudioConfig, command: SessionCommand) -> Result<i32> {
    let store = FileSessionStore::new(&config.session_path);
    match command {
        SessionCommand::Show => match store.load()? {
            Some(session) => {
                println!("path: {}", store.path().display());
                println!("session_id: {}", session.session_id);
                println!(
                    "selected_api_key: {}",
                    if session.has_selected_key() {
                        "set (redacted)"
                    } else {
                        "not set"
                    }
                );
                println!("updated_at: {}", session.updated_at);
            }
            None => println!("no session at {}", store.path().display()),
        },
        SessionCommand::Reset => {
            store.clear()?;
            println!("session cleared");
        }
    }
    Ok(0)
}

fn build_submission(input: &InputArgs, catalog: &StyleCatalog) -> Result<Submission> {
    let style_id = input
        .style
        .clone()
        .unwrap_or_else(|| catalog.default_style().id.clone());
    let input_type = InputType::from(input.input_type);
    let mut submission = Submission::new(input_type, style_id);

    // CSV data only ever comes from a file.
    submission.text_content = match input_type {
        InputType::Csv => match input.csv.as_deref() {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("failed reading {}", path.display()))?,
            ),
            None => None,
        },
        _ => input.text.clone(),
    };
    if let Some(path) = input.image.as_deref() {
        let (data, mime_type) = read_inline_image(path)?;
        submission.file_data = Some(data);
        submission.mime_type = mime_type;
    }
    if let Some(path) = input.logo.as_deref() {
        let (data, mime_type) = read_inline_image(path)?;
        submission.logo_data = Some(data);
        submission.logo_mime_type = mime_type;
    }
    submission.layer_concept = input.concept.clone();
    submission.layer_data = input.data.clone();
    submission.layer_conclusion = input.conclusion.clone();
    submission.language = input.language.into();
    submission.additional_instructions = input.instructions.clone();
    Ok(submission)
}

fn read_inline_image(path: &Path) -> Result<(String, Option<String>)> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok((
        BASE64.encode(bytes),
        mime_for_path(path).map(str::to_string),
    ))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn icon_glyph(icon: &str) -> &'static str {
    match icon {
        "Grid3X3" => "▦",
        "ScrollText" => "📜",
        "Monitor" => "🖥",
        "BarChart3" => "📊",
        "Palette" => "🎨",
        "Orbit" => "🪐",
        "PenTool" => "✒",
        "Presentation" => "📽",
        "BookOpen" => "📖",
        "Cpu" => "🔲",
        "Search" => "🔍",
        "Binary" => "⌗",
        "Coffee" => "☕",
        "Sparkles" => "✨",
        "Gamepad2" => "🎮",
        "Hourglass" => "⌛",
        "Activity" => "〰",
        "Box" => "📦",
        "MessageSquare" => "💬",
        "Map" => "🗺",
        "Send" => "✈",
        "Scan" => "⌖",
        "Lightbulb" => "💡",
        "Smile" => "☺",
        "Brush" => "🖌",
        "Tv" => "📺",
        "Layout" => "▤",
        _ => FALLBACK_GLYPH,
    }
}

/// Asks for an API key on stderr and stores the answer in the session.
struct StdinCredentialSelector {
    sessions: Arc<dyn SessionStore>,
    environment: KeySources,
    input: Mutex<Box<dyn BufRead + Send>>,
}

impl StdinCredentialSelector {
    fn new(
        sessions: Arc<dyn SessionStore>,
        environment: KeySources,
        input: Box<dyn BufRead + Send>,
    ) -> Self {
        Self {
            sessions,
            environment,
            input: Mutex::new(input),
        }
    }
}

impl CredentialSelector for StdinCredentialSelector {
    fn has_selected_credential(&self) -> Result<bool> {
        let session_key = self
            .sessions
            .load()?
            .map(|session| session.has_selected_key())
            .unwrap_or(false);
        Ok(session_key || self.environment.has_usable_key())
    }

    fn select_credential(&self) -> Result<()> {
        eprint!("Gemini API key (leave blank to keep the current one): ");
        io::stderr().flush()?;

        let mut line = String::new();
        self.input
            .lock()
            .map_err(|_| anyhow::anyhow!("stdin lock poisoned"))?
            .read_line(&mut line)
            .context("failed reading API key from stdin")?;
        let key = line.trim();
        if key.is_empty() {
            tracing::info!("no API key entered; keeping current credentials");
            return Ok(());
        }

        let mut session = self.sessions.load_or_create()?;
        session.select_key(key);
        self.sessions.save(&session)?;
        tracing::info!(session_id = %session.session_id, "API key stored in session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;

    use clap::Parser;
    use infograph_contracts::{
        InputType, KeySources, Language, MemorySessionStore, SessionStore, StyleCatalog,
        ValidationError,
    };
    use infograph_engine::{CredentialSelector, GenerationError};

    use super::{
        build_submission, exit_code_for, icon_glyph, mime_for_path, Cli, Command,
        StdinCredentialSelector, FALLBACK_GLYPH,
    };

    fn generate_input(args: &[&str]) -> super::InputArgs {
        let mut argv = vec!["infograph", "generate"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Command::Generate(generate) => generate.input,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn mime_is_taken_from_extension() {
        assert_eq!(mime_for_path(Path::new("a/b.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("photo.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("photo.jpg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("x.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("no_extension")), None);
    }

    #[test]
    fn every_builtin_icon_has_a_glyph() -> anyhow::Result<()> {
        let catalog = StyleCatalog::builtin()?;
        for style in catalog.iter() {
            assert_ne!(icon_glyph(&style.icon), FALLBACK_GLYPH, "{}", style.icon);
        }
        assert_eq!(icon_glyph("SomethingNew"), FALLBACK_GLYPH);
        Ok(())
    }

    #[test]
    fn submission_defaults_to_first_style() -> anyhow::Result<()> {
        let catalog = StyleCatalog::builtin()?;
        let input = generate_input(&["--text", "solar power", "--language", "vietnamese"]);
        let submission = build_submission(&input, &catalog)?;
        assert_eq!(submission.input_type, InputType::Text);
        assert_eq!(submission.style_id, catalog.default_style().id);
        assert_eq!(submission.text_content.as_deref(), Some("solar power"));
        assert_eq!(submission.language, Language::Vietnamese);
        Ok(())
    }

    #[test]
    fn csv_and_image_files_are_read() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let csv = temp.path().join("ledger.csv");
        std::fs::write(&csv, "year,value\n2024,3\n")?;
        let logo = temp.path().join("logo.webp");
        std::fs::write(&logo, b"logo")?;
        let catalog = StyleCatalog::builtin()?;

        let input = generate_input(&[
            "--input-type",
            "csv",
            "--csv",
            csv.to_str().unwrap(),
            "--logo",
            logo.to_str().unwrap(),
            "--style",
            "consulting",
        ]);
        let submission = build_submission(&input, &catalog)?;
        assert_eq!(submission.text_content.as_deref(), Some("year,value\n2024,3\n"));
        assert_eq!(submission.logo_data.as_deref(), Some("bG9nbw=="));
        assert_eq!(submission.logo_mime_type.as_deref(), Some("image/webp"));
        assert_eq!(submission.style_id, "consulting");
        Ok(())
    }

    #[test]
    fn csv_mode_ignores_inline_text() -> anyhow::Result<()> {
        let catalog = StyleCatalog::builtin()?;
        let input = generate_input(&["--input-type", "csv", "--text", "a,b\n1,2"]);
        let submission = build_submission(&input, &catalog)?;
        assert_eq!(submission.text_content, None);
        assert_eq!(submission.validate().unwrap_err(), ValidationError::MissingCsv);
        Ok(())
    }

    #[test]
    fn missing_input_file_is_an_error() -> anyhow::Result<()> {
        let catalog = StyleCatalog::builtin()?;
        let input = generate_input(&["--input-type", "image", "--image", "/no/such/file.png"]);
        let err = build_submission(&input, &catalog).unwrap_err();
        assert!(err.to_string().contains("failed reading"));
        Ok(())
    }

    #[test]
    fn validation_errors_exit_with_two() {
        let validation = anyhow::Error::from(GenerationError::from(ValidationError::MissingCsv));
        assert_eq!(exit_code_for(&validation), 2);
        let denied = anyhow::Error::from(GenerationError::AccessDenied {
            reauth_prompted: false,
        });
        assert_eq!(exit_code_for(&denied), 1);
        assert_eq!(exit_code_for(&anyhow::anyhow!("disk full")), 1);
    }

    #[test]
    fn selector_stores_entered_key_in_session() -> anyhow::Result<()> {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let selector = StdinCredentialSelector::new(
            sessions.clone(),
            KeySources::default(),
            Box::new(Cursor::new(b"  fresh-key \n".to_vec())),
        );
        assert!(!selector.has_selected_credential()?);

        selector.select_credential()?;
        let session = sessions.load()?.unwrap();
        assert_eq!(session.selected_api_key.as_deref(), Some("fresh-key"));
        assert!(selector.has_selected_credential()?);
        Ok(())
    }

    #[test]
    fn selector_keeps_state_on_blank_answer() -> anyhow::Result<()> {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let selector = StdinCredentialSelector::new(
            sessions.clone(),
            KeySources::new(Some("env-key".to_string()), None),
            Box::new(Cursor::new(b"\n".to_vec())),
        );
        assert!(selector.has_selected_credential()?);
        selector.select_credential()?;
        assert!(sessions.load()?.is_none());
        Ok(())
    }
}
