//! `myai` command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `myai_core` note, settings and session APIs.
//! - Print one status line per action; note data goes to stdout.
//!
//! # Invariants
//! - Credentials are never echoed back.
//! - A failed action exits with a non-zero code.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;
use myai_core::selection::char_range_to_byte_range;
use myai_core::service::note_service::derive_markdown_preview;
use myai_core::settings::{
    clear_api_key, set_api_key, set_model, set_provider_enabled, set_temperature, set_theme,
};
use myai_core::{
    default_log_level, init_logging, open_db, resolve_provider, ActionReport, AiSettings,
    FocusState, ImportError, Note, NoteService, NoteServiceError, NoteSession, ProviderKind,
    SelectedText, SettingsProviders, SqliteNoteRepository, SqliteSettingsRepository, StatusKind,
    StatusMessage, ViewRegion,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const APP_DIR_NAME: &str = "myai-notes";
const DB_FILE_NAME: &str = "notes.sqlite3";

#[derive(Parser, Debug)]
#[command(
    name = "myai",
    version,
    about = "Local notes with AI expansion and in-place section rewrites"
)]
struct Cli {
    /// Notes database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty note and print its id.
    New {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// List notes, most recently updated first.
    List {
        #[arg(long)]
        published: bool,
    },
    /// Print one note.
    Show {
        id: String,
        /// Print the AI-expanded text instead of the content.
        #[arg(long)]
        expanded: bool,
    },
    /// Save title/content of a note.
    Edit(EditArgs),
    Delete {
        id: String,
    },
    Search {
        query: String,
    },
    /// Export every note as a JSON array.
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Export one note as plain text.
    ExportNote {
        id: String,
        /// Directory to write `<title>.txt` into; stdout when omitted.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Import a JSON array of notes (merges by default).
    Import {
        file: PathBuf,
        /// Replace the whole collection instead of merging.
        #[arg(long)]
        replace: bool,
    },
    /// Expand a note with the configured provider.
    Expand {
        id: String,
    },
    /// Copy the expanded text into the note content.
    Apply {
        id: String,
    },
    /// Rewrite a selected section of a note in place.
    Regenerate(RegenerateArgs),
    Publish {
        id: String,
    },
    Unpublish {
        id: String,
    },
    /// Read or change AI provider settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, conflicts_with = "content_file")]
    content: Option<String>,
    #[arg(long)]
    content_file: Option<PathBuf>,
    /// Generated text to store alongside; blank keeps the stored one.
    #[arg(long)]
    expanded: Option<String>,
    /// Behave like the editor's debounced auto-save (title and content only).
    #[arg(long)]
    auto: bool,
}

#[derive(Args, Debug)]
struct RegenerateArgs {
    id: String,
    /// First selected character (editor selection).
    #[arg(long, requires = "end", conflicts_with = "text")]
    start: Option<usize>,
    /// One past the last selected character (editor selection).
    #[arg(long, requires = "start")]
    end: Option<usize>,
    /// Text selected in a rendered view.
    #[arg(long)]
    text: Option<String>,
    /// Treat `--text` as an HTML fragment.
    #[arg(long, requires = "text")]
    html: bool,
    /// Rendered view the selection was made in.
    #[arg(long, value_enum, default_value_t = RenderedView::Display)]
    view: RenderedView,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum RenderedView {
    Expanded,
    Display,
}

impl RenderedView {
    fn region(self) -> ViewRegion {
        match self {
            Self::Expanded => ViewRegion::ExpandedPanel,
            Self::Display => ViewRegion::DisplayPanel,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ProviderArg {
    Openai,
    Claude,
}

impl From<ProviderArg> for ProviderKind {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Openai => ProviderKind::OpenAi,
            ProviderArg::Claude => ProviderKind::Claude,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    SetKey {
        #[arg(value_enum)]
        provider: ProviderArg,
        key: String,
    },
    ClearKey {
        #[arg(value_enum)]
        provider: ProviderArg,
    },
    Enable {
        #[arg(value_enum)]
        provider: ProviderArg,
    },
    Disable {
        #[arg(value_enum)]
        provider: ProviderArg,
    },
    Model {
        #[arg(value_enum)]
        provider: ProviderArg,
        name: String,
    },
    Temperature {
        value: String,
    },
    /// Set `light` or `dark`; toggles when omitted.
    Theme {
        value: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    start_logging(cli.log_dir.as_deref(), cli.log_level.as_deref());

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let conn =
        open_db(&db_path).with_context(|| format!("opening {}", db_path.display()))?;

    match cli.command {
        Commands::Config { action } => run_config(&conn, action),
        command => run_note_command(&conn, command).await,
    }
}

async fn run_note_command(conn: &Connection, command: Commands) -> Result<ExitCode> {
    let service = NoteService::new(SqliteNoteRepository::new(conn));

    match command {
        Commands::New { title, content } => {
            let mut note = service.create_note()?;
            if title.is_some() || content.is_some() {
                note = service.auto_save(
                    &note.id,
                    title.as_deref().unwrap_or(&note.title),
                    content.as_deref().unwrap_or(""),
                )?;
            }
            println!("{}", note.id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { published } => {
            let notes = if published {
                service.list_published()?
            } else {
                service.list_sorted_by_recency()?
            };
            print_note_list(&notes);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { id, expanded } => {
            let note = require_note(&service, &id)?;
            print_note(&note, expanded);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Edit(args) => edit_note(&service, args),
        Commands::Delete { id } => {
            if service.delete_note(&id)? {
                Ok(report_status(&StatusMessage::success("Note deleted!")))
            } else {
                Ok(report_status(&StatusMessage::error(format!(
                    "Error: note not found: {id}"
                ))))
            }
        }
        Commands::Search { query } => {
            print_note_list(&service.search(&query)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Export { output } => {
            let json = service.export_all()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    Ok(report_status(&StatusMessage::success("All notes exported!")))
                }
                None => {
                    println!("{json}");
                    Ok(ExitCode::SUCCESS)
                }
            }
        }
        Commands::ExportNote { id, dir } => {
            let export = service.export_text(&id)?;
            match dir {
                Some(dir) => {
                    let path = dir.join(sanitize_file_name(&export.file_name));
                    std::fs::write(&path, export.text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    Ok(report_status(&StatusMessage::success("Note exported!")))
                }
                None => {
                    println!("{}", export.text);
                    Ok(ExitCode::SUCCESS)
                }
            }
        }
        Commands::Import { file, replace } => {
            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(err) => {
                    warn!("event=cli_import module=cli status=error error={err}");
                    return Ok(report_status(&StatusMessage::error("Failed to read file")));
                }
            };
            Ok(report_status(&import_status(
                service.import_all(&text, !replace),
            )))
        }
        Commands::Expand { id } => {
            let session = open_session(conn, &service, &id)?;
            let report = session.expand().await;
            if let Some(note) = report.as_ref().and_then(|report| report.note.as_ref()) {
                println!("{}", note.expanded_content);
            }
            Ok(report_action(report))
        }
        Commands::Apply { id } => match service.apply_expanded(&id) {
            Ok(_) => Ok(report_status(&StatusMessage::success(
                "Generated text applied to the note.",
            ))),
            Err(NoteServiceError::NothingToApply) => Ok(report_status(&StatusMessage::error(
                NoteServiceError::NothingToApply.to_string(),
            ))),
            Err(err) => Err(err.into()),
        },
        Commands::Regenerate(args) => regenerate(conn, &service, args).await,
        Commands::Publish { id } => {
            service.publish(&id)?;
            Ok(report_status(&StatusMessage::success("Note published!")))
        }
        Commands::Unpublish { id } => {
            service.unpublish(&id)?;
            Ok(report_status(&StatusMessage::success("Note unpublished.")))
        }
        Commands::Config { .. } => Err(anyhow!("config is handled separately")),
    }
}

fn edit_note(service: &NoteService<SqliteNoteRepository<'_>>, args: EditArgs) -> Result<ExitCode> {
    let note = require_note(service, &args.id)?;
    let content = match (&args.content, &args.content_file) {
        (Some(content), _) => content.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => note.content.clone(),
    };
    let title = args.title.unwrap_or(note.title);

    if args.auto {
        service.auto_save(&args.id, &title, &content)?;
        return Ok(ExitCode::SUCCESS);
    }
    service.save_note(&args.id, &title, &content, args.expanded.as_deref())?;
    Ok(report_status(&StatusMessage::success("Note saved!")))
}

async fn regenerate(
    conn: &Connection,
    service: &NoteService<SqliteNoteRepository<'_>>,
    args: RegenerateArgs,
) -> Result<ExitCode> {
    let note = require_note(service, &args.id)?;
    let focus = match (args.start, args.end, args.text.as_deref()) {
        (Some(start), Some(end), _) => match char_range_to_byte_range(&note.content, start, end) {
            Some((selection_start, selection_end)) => FocusState::Editor {
                selection_start,
                selection_end,
            },
            None => FocusState::Unfocused,
        },
        (_, _, Some(text)) => FocusState::Rendered {
            anchor: args.view.region(),
            focus: args.view.region(),
            selected: if args.html {
                SelectedText::Html(text)
            } else {
                SelectedText::Plain(text)
            },
        },
        _ => FocusState::Unfocused,
    };

    let session = open_session(conn, service, &args.id)?;
    let report = session.regenerate(&focus).await;
    if let Some(note) = report.as_ref().and_then(|report| report.note.as_ref()) {
        println!("{}", note.content);
    }
    Ok(report_action(report))
}

fn open_session<'s, 'c>(
    conn: &Connection,
    service: &'s NoteService<SqliteNoteRepository<'c>>,
    id: &str,
) -> Result<NoteSession<'s, SqliteNoteRepository<'c>, SettingsProviders>> {
    let settings = AiSettings::load(&SqliteSettingsRepository::new(conn))?;
    Ok(NoteSession::new(service, SettingsProviders::new(settings), id))
}

fn run_config(conn: &Connection, action: ConfigAction) -> Result<ExitCode> {
    let repo = SqliteSettingsRepository::new(conn);
    let status = match action {
        ConfigAction::Show => {
            print_settings(&AiSettings::load(&repo)?);
            return Ok(ExitCode::SUCCESS);
        }
        ConfigAction::SetKey { provider, key } => match set_api_key(&repo, provider.into(), &key) {
            Ok(()) => StatusMessage::success("API key saved successfully!"),
            Err(err) => StatusMessage::error(err.to_string()),
        },
        ConfigAction::ClearKey { provider } => {
            clear_api_key(&repo, provider.into())?;
            StatusMessage::info("API key cleared")
        }
        ConfigAction::Enable { provider } => {
            set_provider_enabled(&repo, provider.into(), true)?;
            StatusMessage::success("Provider settings saved!")
        }
        ConfigAction::Disable { provider } => {
            match set_provider_enabled(&repo, provider.into(), false) {
                Ok(()) => StatusMessage::success("Provider settings saved!"),
                Err(err) => StatusMessage::error(err.to_string()),
            }
        }
        ConfigAction::Model { provider, name } => match set_model(&repo, provider.into(), &name) {
            Ok(()) => StatusMessage::success("Model settings saved!"),
            Err(err) => StatusMessage::error(err.to_string()),
        },
        ConfigAction::Temperature { value } => match set_temperature(&repo, &value) {
            Ok(_) => StatusMessage::success("Model settings saved!"),
            Err(err) => StatusMessage::error(err.to_string()),
        },
        ConfigAction::Theme { value } => {
            let raw = match value {
                Some(value) => value,
                None => AiSettings::load(&repo)?.theme.toggled().as_str().to_string(),
            };
            match set_theme(&repo, &raw) {
                Ok(theme) => StatusMessage::success(format!("Theme set to {}", theme.as_str())),
                Err(err) => StatusMessage::error(err.to_string()),
            }
        }
    };
    Ok(report_status(&status))
}

fn print_settings(settings: &AiSettings) {
    for kind in [ProviderKind::OpenAi, ProviderKind::Claude] {
        let provider = settings.provider(kind);
        println!(
            "{}: enabled={} key={} model={}",
            kind.display_name(),
            provider.enabled,
            if provider.has_credential() { "set" } else { "not set" },
            provider.model
        );
    }
    println!("temperature: {}", settings.temperature);
    println!("theme: {}", settings.theme.as_str());
    match resolve_provider(settings) {
        Some(kind) => println!("active provider: {}", kind.display_name()),
        None => println!("active provider: none"),
    }
}

fn print_note_list(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes yet.");
        return;
    }
    for note in notes {
        let preview = derive_markdown_preview(note.display_text()).unwrap_or_default();
        let marker = if note.is_published { " [published]" } else { "" };
        println!("{}  {}{marker}  {preview}", note.id, note.title);
    }
}

fn print_note(note: &Note, expanded: bool) {
    println!("# {}", note.title);
    if note.is_published {
        println!("(published)");
    }
    println!();
    if expanded {
        println!("{}", note.expanded_content);
    } else {
        println!("{}", note.content);
    }
}

fn require_note(service: &NoteService<SqliteNoteRepository<'_>>, id: &str) -> Result<Note> {
    service
        .get_note(id)?
        .ok_or_else(|| anyhow!("note not found: {id}"))
}

fn import_status(result: Result<myai_core::ImportSummary, ImportError>) -> StatusMessage {
    match result {
        Ok(summary) => StatusMessage::success(format!("Imported {} note(s)!", summary.count)),
        Err(err) => StatusMessage::error(format!("Import failed: {err}")),
    }
}

fn report_action(report: Option<ActionReport>) -> ExitCode {
    let Some(report) = report else {
        return ExitCode::SUCCESS;
    };
    if let Some(progress) = &report.progress {
        report_status(progress);
    }
    report_status(&report.status)
}

fn report_status(status: &StatusMessage) -> ExitCode {
    eprintln!("[{}] {}", status.kind.as_str(), status.text);
    match status.kind {
        StatusKind::Error => ExitCode::FAILURE,
        StatusKind::Info | StatusKind::Success => ExitCode::SUCCESS,
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

fn start_logging(log_dir: Option<&Path>, level: Option<&str>) {
    let dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => match dirs::data_local_dir() {
            Some(base) => base.join(APP_DIR_NAME).join("logs"),
            None => return,
        },
    };
    if let Err(err) = init_logging(level.unwrap_or(default_log_level()), &dir) {
        eprintln!("warning: file logging disabled: {err}");
    }
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("could not determine the user data directory")?;
    Ok(base.join(APP_DIR_NAME).join(DB_FILE_NAME))
}
