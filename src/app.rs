use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::api::{ApiClient, RecordApi};
use crate::cli::args::{CliArgs, Command, ProfileCommand};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::controller::{RecordListController, SubmitOutcome};
use crate::diag::TerminalSink;
use crate::record::{parse_cli_value, Record};
use crate::schema::{self, PdfStrategy, RecordType};
use crate::session::{Session, TokenSource};
use crate::settings::{ProfileSettingsController, SettingsOutcome, NOTICE_TTL};

fn print_banner(no_color: bool) {
    let _ = no_color;
    println!(
        ":: {} v{} :: guidance office records client ::",
        "guidancedesk".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<14}: {}", label, value);
}

#[derive(Clone, Debug)]
struct RunConfig {
    base_url: String,
    token_source: TokenSource,
    timeout: Duration,
    download_dir: PathBuf,
    no_color: bool,
    verbose: bool,
    command: Command,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let base_url = args
        .api_base_url
        .or(cfg.api_base_url)
        .ok_or_else(|| "no API base URL (set --api or api_base_url in the config)".to_string())?;

    let token_source = if let Some(token) = args.token.or(cfg.token) {
        TokenSource::Static(token)
    } else if let Some(path) = args.token_file.or(cfg.token_file) {
        TokenSource::File(config::expand_tilde(&path))
    } else if let Some(name) = args.token_env.or(cfg.token_env) {
        TokenSource::Env(name)
    } else {
        TokenSource::None
    };

    let timeout = Duration::from_secs(args.timeout.or(cfg.timeout).unwrap_or(10));
    let download_dir = args
        .download_dir
        .or(cfg.download_dir)
        .map(|dir| config::expand_tilde(&dir))
        .unwrap_or_else(config::default_download_dir);

    Ok(RunConfig {
        base_url,
        token_source,
        timeout,
        download_dir,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
        verbose: args.verbose > 0 || cfg.verbose.unwrap_or(false),
        command: args.command,
    })
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => {
                config::ensure_default_config_file(&path)?;
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg}")
            .map_err(|e| format!("failed to build spinner style: {e}"))?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

fn prompt(question: &str) -> Result<String, String> {
    print!("{question}");
    std::io::stdout()
        .flush()
        .map_err(|e| format!("failed to flush stdout: {e}"))?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("failed to read input: {e}"))?;
    Ok(line.trim().to_string())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner(run.no_color);

    let diag = Arc::new(TerminalSink {
        verbose: run.verbose,
    });
    let session = Session::new(&run.base_url, run.token_source.clone(), run.timeout);
    let api = ApiClient::new(session).map_err(|e| e.to_string())?;

    match run.command.clone() {
        Command::Types => {
            for rt in schema::builtin() {
                let strategy = match rt.pdf {
                    PdfStrategy::ServerRendered => "server PDF",
                    PdfStrategy::ClientComposed => "composed PDF",
                };
                println!(
                    ":: {:<14}: {} ({}, {})",
                    rt.key, rt.label, rt.endpoints.collection, strategy
                );
            }
            Ok(())
        }
        Command::List { record_type } => {
            let rt = validation::check_record_type(&record_type)?;
            let mut controller = RecordListController::new(rt, api, diag);
            load_list(&mut controller).await?;
            print_record_table(controller.records());
            Ok(())
        }
        Command::Create {
            record_type,
            fields,
        } => {
            let rt = validation::check_record_type(&record_type)?;
            let mut controller = RecordListController::new(rt, api, diag);
            let pb = spinner("preparing form")?;
            controller.start_create().await;
            pb.finish_and_clear();
            apply_fields(&mut controller, &rt, &fields).await?;
            finish_submit(&mut controller).await
        }
        Command::Edit {
            record_type,
            id,
            fields,
        } => {
            let rt = validation::check_record_type(&record_type)?;
            let mut controller = RecordListController::new(rt, api, diag);
            load_list(&mut controller).await?;
            if !controller.start_edit(&id) {
                return Err(format!("no {} record with id '{id}'", rt.key));
            }
            apply_fields(&mut controller, &rt, &fields).await?;
            finish_submit(&mut controller).await
        }
        Command::Delete {
            record_type,
            id,
            yes,
        } => {
            let rt = validation::check_record_type(&record_type)?;
            let mut controller = RecordListController::new(rt, api, diag);
            load_list(&mut controller).await?;
            if !yes {
                let answer = prompt(&format!(
                    "Delete {} record {id}? This cannot be undone. [y/N] ",
                    rt.key
                ))?;
                if !matches!(answer.to_lowercase().as_str(), "y" | "yes") {
                    println!(":: aborted ::");
                    return Ok(());
                }
            }
            let pb = spinner("deleting")?;
            let deleted = controller.delete(&id).await;
            pb.finish_and_clear();
            if deleted {
                println!(
                    ":: Deleted {} record {} :: {} remaining ::",
                    rt.key,
                    id,
                    controller.records().len()
                );
                Ok(())
            } else {
                Err(controller.error().unwrap_or("delete failed").to_string())
            }
        }
        Command::View { record_type, id } => {
            let rt = validation::check_record_type(&record_type)?;
            let mut controller = RecordListController::new(rt, api, diag);
            load_list(&mut controller).await?;
            if !controller.view(&id) {
                return Err(format!("no {} record with id '{id}'", rt.key));
            }
            let Some(view) = controller.viewing() else {
                return Err("view state missing".to_string());
            };
            println!("{}", rt.label.bold());
            for (label, value) in view.lines() {
                if label.is_empty() {
                    println!("::                 {}", value);
                } else {
                    format_kv_line(&label, &value);
                }
            }
            Ok(())
        }
        Command::Export { record_type, id } => {
            let rt = validation::check_record_type(&record_type)?;
            let mut controller = RecordListController::new(rt, api, diag);
            load_list(&mut controller).await?;
            if !controller.view(&id) {
                return Err(format!("no {} record with id '{id}'", rt.key));
            }
            let Some(view) = controller.viewing() else {
                return Err("view state missing".to_string());
            };
            let pb = spinner("exporting PDF")?;
            let result = view.export_pdf(controller.api(), &run.download_dir).await;
            pb.finish_and_clear();
            let path = result.map_err(|e| e.to_string())?;
            println!(":: Saved {} ::", path.display());
            Ok(())
        }
        Command::Profile { action } => run_profile(action, api, diag).await,
    }
}

async fn load_list<A: RecordApi>(controller: &mut RecordListController<A>) -> Result<(), String> {
    let pb = spinner("loading records")?;
    let loaded = controller.load().await;
    pb.finish_and_clear();
    if loaded {
        Ok(())
    } else {
        Err(controller.error().unwrap_or("load failed").to_string())
    }
}

async fn apply_fields<A: RecordApi>(
    controller: &mut RecordListController<A>,
    rt: &RecordType,
    fields: &[String],
) -> Result<(), String> {
    for pair in fields {
        let (name, raw) = validation::parse_field_pair(pair)?;
        let spec = rt
            .field(&name)
            .ok_or_else(|| format!("unknown field '{name}'"))?;
        let value = parse_cli_value(spec.kind, &raw).map_err(|e| format!("field '{name}': {e}"))?;
        controller.set_field(&name, value).await;
    }
    Ok(())
}

async fn finish_submit<A: RecordApi>(
    controller: &mut RecordListController<A>,
) -> Result<(), String> {
    let pb = spinner("submitting")?;
    let outcome = controller.submit().await;
    pb.finish_and_clear();
    match outcome {
        SubmitOutcome::Saved(record) => {
            let id = record.id.as_deref().unwrap_or("?");
            println!(
                ":: Saved {} record {} :: {} total ::",
                controller.record_type().key,
                id,
                controller.records().len()
            );
            Ok(())
        }
        SubmitOutcome::Invalid => {
            let mut message = String::from("validation failed:");
            if let Some(form) = controller.form() {
                for (field, error) in form.errors() {
                    message.push_str(&format!("\n  {field}: {error}"));
                }
            }
            Err(message)
        }
        SubmitOutcome::Busy => Err("a submit is already in flight".to_string()),
        SubmitOutcome::Failed => Err(controller
            .form()
            .and_then(|form| form.error_banner())
            .unwrap_or("submit failed")
            .to_string()),
    }
}

fn print_record_table(records: &[Record]) {
    if records.is_empty() {
        println!(":: no records ::");
        return;
    }
    println!(
        "{}",
        format!("{:<10} {:<12} {:<12} {}", "ID", "STUDENT", "DATE", "COUNSELOR").bold()
    );
    for record in records {
        println!(
            "{:<10} {:<12} {:<12} {}",
            record.id.as_deref().unwrap_or("-"),
            record.field("student_id").map(|v| v.as_text()).unwrap_or("-"),
            record.field("date").map(|v| v.as_text()).unwrap_or("-"),
            record
                .field("counselor_name")
                .map(|v| v.as_text())
                .unwrap_or("-"),
        );
    }
    println!();
    println!(":: {} records ::", records.len());
}

async fn run_profile(
    action: ProfileCommand,
    api: ApiClient,
    diag: Arc<TerminalSink>,
) -> Result<(), String> {
    match action {
        ProfileCommand::Show => {
            let pb = spinner("loading profile")?;
            let identity = api.counselor_identity().await;
            pb.finish_and_clear();
            let identity = identity.map_err(|e| e.to_string())?;
            format_kv_line("Name", &identity.display_name);
            format_kv_line("Email", &identity.email);
            format_kv_line("Photo", identity.photo_url.as_deref().unwrap_or("(none)"));
            Ok(())
        }
        ProfileCommand::Update { name, email } => {
            let pb = spinner("loading profile")?;
            let identity = api.counselor_identity().await;
            pb.finish_and_clear();
            let identity = identity.map_err(|e| e.to_string())?;
            let mut controller = ProfileSettingsController::new(api, diag);
            controller.open(&identity);
            if let Some(name) = name.as_deref() {
                controller.set_profile_field("name", name);
            }
            if let Some(email) = email.as_deref() {
                controller.set_profile_field("email", email);
            }
            let outcome = controller.submit_profile().await;
            report_settings(&mut controller, outcome, controller_errors_profile).await
        }
        ProfileCommand::Password => {
            let current = prompt("Current password: ")?;
            let new = prompt("New password: ")?;
            let confirm = prompt("Confirm new password: ")?;
            let mut controller = ProfileSettingsController::new(api, diag);
            controller.set_password_field("current_password", &current);
            controller.set_password_field("new_password", &new);
            controller.set_password_field("confirm_password", &confirm);
            let outcome = controller.submit_password().await;
            report_settings(&mut controller, outcome, controller_errors_password).await
        }
        ProfileCommand::Photo { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| format!("failed to read photo '{path}': {e}"))?;
            let file_name = std::path::Path::new(&path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("photo")
                .to_string();
            let mut controller = ProfileSettingsController::new(api, diag);
            if !controller.choose_photo(&file_name, guess_mime(&path), bytes) {
                return Err(controller
                    .photo_error()
                    .unwrap_or("photo rejected")
                    .to_string());
            }
            let outcome = controller.submit_photo().await;
            report_settings(&mut controller, outcome, controller_errors_photo).await
        }
        ProfileCommand::DeletePhoto => {
            let mut controller = ProfileSettingsController::new(api, diag);
            let outcome = controller.delete_photo().await;
            report_settings(&mut controller, outcome, controller_errors_photo).await
        }
    }
}

fn controller_errors_profile<A: RecordApi>(c: &ProfileSettingsController<A>) -> Vec<String> {
    c.profile_errors()
        .iter()
        .map(|(field, error)| format!("{field}: {error}"))
        .collect()
}

fn controller_errors_password<A: RecordApi>(c: &ProfileSettingsController<A>) -> Vec<String> {
    c.password_errors()
        .iter()
        .map(|(field, error)| format!("{field}: {error}"))
        .collect()
}

fn controller_errors_photo<A: RecordApi>(c: &ProfileSettingsController<A>) -> Vec<String> {
    c.photo_error()
        .map(|e| vec![e.to_string()])
        .unwrap_or_default()
}

async fn report_settings<A: RecordApi>(
    controller: &mut ProfileSettingsController<A>,
    outcome: SettingsOutcome,
    errors: fn(&ProfileSettingsController<A>) -> Vec<String>,
) -> Result<(), String> {
    match outcome {
        SettingsOutcome::Saved => {
            if let Some(notice) = controller.notice() {
                println!(":: {} ::", notice.green());
            }
            // the success notice is transient; the modal closes once it expires
            tokio::time::sleep(NOTICE_TTL).await;
            controller.poll(tokio::time::Instant::now());
            Ok(())
        }
        SettingsOutcome::Invalid => {
            let mut message = String::from("validation failed:");
            for line in errors(controller) {
                message.push_str(&format!("\n  {line}"));
            }
            Err(message)
        }
        SettingsOutcome::Busy => Err("a submit is already in flight".to_string()),
        SettingsOutcome::Failed => {
            let lines = errors(controller);
            Err(lines
                .first()
                .cloned()
                .unwrap_or_else(|| "request failed".to_string()))
        }
    }
}

fn guess_mime(path: &str) -> &'static str {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}
