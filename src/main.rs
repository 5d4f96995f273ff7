//! CLI entry point for `mailcompose`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};

use mailcompose::compose::finalize::{ComposedMail, FinalizeOptions, HeaderText};
use mailcompose::compose::{compose_mail, MailContent};
use mailcompose::config::{self, Config};
use mailcompose::encode::charset::CharsetPolicy;
use mailcompose::model::address::Address;
use mailcompose::model::attachment::{guess_mime_type, Attachment, EmbeddedFile};
use mailcompose::transport::{send_mail, SendStatus, SmtpMode};

#[derive(Parser)]
#[command(
    name = "mailcompose",
    version,
    about = "Compose MIME email messages and deliver them over SMTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a message and write it to a file or stdout
    Compose {
        #[command(flatten)]
        message: MessageArgs,

        /// Write the message here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build a message and deliver it over SMTP
    Send {
        #[command(flatten)]
        message: MessageArgs,

        #[command(flatten)]
        smtp: SmtpArgs,

        /// Print the delivery report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the current configuration to the config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args)]
struct MessageArgs {
    /// Sender, e.g. "Jane Doe <jane@example.com>" (default: [compose] from)
    #[arg(long)]
    from: Option<String>,

    /// Recipient (repeatable, or comma separated)
    #[arg(long)]
    to: Vec<String>,

    /// Carbon-copy recipient
    #[arg(long)]
    cc: Vec<String>,

    /// Blind carbon-copy recipient (envelope only)
    #[arg(long)]
    bcc: Vec<String>,

    #[arg(short, long, default_value = "")]
    subject: String,

    /// Plain text body
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the plain text body from a UTF-8 file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Read the HTML body from a UTF-8 file
    #[arg(long)]
    html_file: Option<PathBuf>,

    /// Attach a file; the MIME type is guessed from its name
    #[arg(long, value_name = "PATH")]
    attach: Vec<PathBuf>,

    /// Embed a file for cid: references, as PATH or PATH=CONTENT_ID
    #[arg(long, value_name = "PATH[=CID]")]
    embed: Vec<String>,

    /// Charset for headers and bodies (default: [compose] default_charset)
    #[arg(long)]
    charset: Option<String>,

    /// Fail instead of falling back to UTF-8 for unencodable names
    #[arg(long)]
    strict: bool,

    /// Force quoted-printable on the text and HTML bodies
    #[arg(long)]
    quoted_printable: bool,

    /// Seed for a generated Message-Id
    #[arg(long, value_name = "SEED")]
    message_id: Option<String>,

    /// Extra header (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE")]
    headers: Vec<String>,
}

#[derive(Args)]
struct SmtpArgs {
    /// SMTP server (default: [smtp] host)
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// plain, tls or starttls
    #[arg(long)]
    mode: Option<SmtpMode>,

    #[arg(long)]
    login: Option<String>,

    #[arg(long, env = "MAILCOMPOSE_SMTP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Socket timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Compose { message, output } => cmd_compose(&message, output.as_deref(), &config),
        Commands::Send {
            message,
            smtp,
            json,
        } => cmd_send(&message, &smtp, json, &config),
        Commands::InitConfig { force } => cmd_init_config(force, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailcompose.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Save `config` (defaults merged with any file already loaded) to the
/// standard location.
fn cmd_init_config(force: bool, config: &Config) -> anyhow::Result<()> {
    let path = config::config_file_path().context("Could not determine config file path")?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config(config)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailcompose", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

/// Compose a message and write it out.
fn cmd_compose(args: &MessageArgs, output: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let mail = build_message(args, config)?;
    match output {
        Some(path) => {
            std::fs::write(path, &mail.payload)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("  Wrote {} bytes to {}", mail.payload.len(), path.display());
        }
        None => std::io::stdout().write_all(&mail.payload)?,
    }
    Ok(())
}

/// Compose a message and send it.
fn cmd_send(args: &MessageArgs, smtp: &SmtpArgs, json: bool, config: &Config) -> anyhow::Result<()> {
    let mail = build_message(args, config)?;
    if mail.envelope.rcpt_to.is_empty() {
        anyhow::bail!("No recipients given (use --to, --cc or --bcc)");
    }

    let mut settings = config.smtp.to_settings();
    if let Some(host) = &smtp.host {
        settings.host = host.clone();
    }
    if let Some(port) = smtp.port {
        settings.port = port;
    }
    if let Some(mode) = smtp.mode {
        settings.mode = mode;
    }
    if smtp.login.is_some() {
        settings.login = smtp.login.clone();
    }
    if smtp.password.is_some() {
        settings.password = smtp.password.clone();
    }
    if let Some(secs) = smtp.timeout {
        settings.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let status = send_mail(
        &mail.payload,
        &mail.envelope.mail_from,
        &mail.envelope.rcpt_to,
        &settings,
    )?;

    if json {
        print_report_json(&mail, &status)?;
    } else {
        print_report(&mail, &status);
    }

    if !status.is_delivered() {
        std::process::exit(1);
    }
    Ok(())
}

/// Turn command-line arguments into a composed message.
fn build_message(args: &MessageArgs, config: &Config) -> anyhow::Result<ComposedMail> {
    let defaults = &config.compose;
    let charset = args.charset.as_deref().unwrap_or(&defaults.default_charset);

    let from = args
        .from
        .as_deref()
        .or(defaults.from.as_deref())
        .context("No sender given (use --from or set [compose] from)")?;
    let sender = Address::parse(from);

    let text = match (&args.text, &args.text_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(read_utf8(path)?),
        (None, None) => None,
    };
    let html = args.html_file.as_deref().map(read_utf8).transpose()?;

    let mut content = MailContent {
        text: text.map(|t| (t, charset.to_string())),
        html: html.map(|h| (h, charset.to_string())),
        use_quoted_printable: args.quoted_printable || defaults.quoted_printable,
        ..Default::default()
    };
    for path in &args.attach {
        content.attachments.push(attachment_from_file(path)?.into());
    }
    for spec in &args.embed {
        let (path, cid) = match spec.split_once('=') {
            Some((path, cid)) => (path, Some(cid)),
            None => (spec.as_str(), None),
        };
        let embedded = EmbeddedFile::from_path(path, None, cid, None)?;
        content.embeddeds.push(embedded.into());
    }

    let options = FinalizeOptions {
        cc: parse_addresses(&args.cc),
        bcc: parse_addresses(&args.bcc),
        message_id_seed: args.message_id.clone().or_else(|| defaults.message_id_seed.clone()),
        date: None,
        headers: args
            .headers
            .iter()
            .map(|h| parse_header(h))
            .collect::<anyhow::Result<_>>()?,
        charset_policy: if args.strict {
            CharsetPolicy::Strict
        } else {
            defaults.charset_policy
        },
    };

    let mail = compose_mail(
        &sender,
        &parse_addresses(&args.to),
        &args.subject,
        charset,
        &content,
        &options,
    )?;
    tracing::info!(
        size = mail.payload.len(),
        recipients = mail.envelope.rcpt_to.len(),
        "Message composed"
    );
    Ok(mail)
}

/// Read an attachment, keeping `text/*` only when the file is valid UTF-8.
fn attachment_from_file(path: &Path) -> anyhow::Result<Attachment> {
    let guessed = guess_mime_type(path);
    let attachment = Attachment::from_path(path, Some(&guessed))?;
    if attachment.maintype != "text" {
        return Ok(attachment);
    }
    if std::str::from_utf8(&attachment.data).is_ok() {
        return Ok(attachment.with_charset("utf-8"));
    }
    Ok(attachment.with_mime_type("application", "octet-stream"))
}

fn parse_addresses(values: &[String]) -> Vec<Address> {
    values.iter().flat_map(|v| Address::parse_list(v)).collect()
}

fn parse_header(raw: &str) -> anyhow::Result<(String, HeaderText)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid header '{raw}', expected NAME=VALUE"))?;
    Ok((name.trim().to_string(), HeaderText::Text(value.trim().to_string())))
}

fn read_utf8(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Print the delivery report in a human-readable form.
fn print_report(mail: &ComposedMail, status: &SendStatus) {
    println!();
    if let Some(id) = &mail.message_id {
        println!("  {:<20} {}", "Message-Id", id);
    }
    println!("  {:<20} {}", "Sender", mail.envelope.mail_from);
    match status {
        SendStatus::Delivered { refused } => {
            let accepted = mail.envelope.rcpt_to.len() - refused.len();
            println!("  {:<20} {}", "Accepted", accepted);
            if !refused.is_empty() {
                println!("  {:<20} {}", "Refused", refused.len());
                for (rcpt, (code, reason)) in refused {
                    println!("    {code:>3}  {rcpt}  {reason}");
                }
            }
        }
        SendStatus::Failed { reason } => {
            println!("  {:<20} {}", "Failed", reason);
        }
    }
    println!();
}

/// Print the delivery report as JSON.
fn print_report_json(mail: &ComposedMail, status: &SendStatus) -> anyhow::Result<()> {
    let report = serde_json::json!({
        "message_id": mail.message_id,
        "mail_from": mail.envelope.mail_from,
        "rcpt_to": mail.envelope.rcpt_to,
        "result": status,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
