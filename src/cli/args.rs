use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "guidancedesk",
    version,
    about = "guidance-office record management client",
    long_about = "Guidancedesk is a terminal client for a guidance-office record API: career plans, consents, exit interviews, individual inventories, endorsement custody and guidance pass slips.\n\nExamples:\n  guidancedesk --api https://guidance.example.edu/api list career-plan\n  guidancedesk create consent -f student_id=S-12 -f date=2024-05-01 -f consent_given=yes\n  guidancedesk export career-plan 42\n\nTip: Use --config to persist the API base URL and token source."
)]
pub struct CliArgs {
    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Connection",
        help = "Path to config file (defaults to ~/.guidancedesk/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'a',
        long = "api",
        value_name = "URL",
        help_heading = "Connection",
        help = "API base URL."
    )]
    pub api_base_url: Option<String>,

    #[arg(
        long = "token",
        value_name = "TOKEN",
        help_heading = "Connection",
        help = "Bearer token value."
    )]
    pub token: Option<String>,

    #[arg(
        long = "token-file",
        value_name = "FILE",
        help_heading = "Connection",
        help = "File the bearer token is re-read from before every request."
    )]
    pub token_file: Option<String>,

    #[arg(
        long = "token-env",
        value_name = "VAR",
        help_heading = "Connection",
        help = "Environment variable holding the bearer token."
    )]
    pub token_env: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Connection",
        help = "HTTP request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'o',
        long = "download-dir",
        value_name = "DIR",
        help_heading = "Output",
        help = "Directory exported PDFs are saved to."
    )]
    pub download_dir: Option<String>,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the known record types.
    Types,

    /// List the records of one type.
    List {
        #[arg(value_name = "TYPE")]
        record_type: String,
    },

    /// Create a record from -f NAME=VALUE field pairs.
    Create {
        #[arg(value_name = "TYPE")]
        record_type: String,
        #[arg(
            short = 'f',
            long = "field",
            value_name = "NAME=VALUE",
            action = ArgAction::Append
        )]
        fields: Vec<String>,
    },

    /// Edit an existing record, changing the given fields.
    Edit {
        #[arg(value_name = "TYPE")]
        record_type: String,
        #[arg(value_name = "ID")]
        id: String,
        #[arg(
            short = 'f',
            long = "field",
            value_name = "NAME=VALUE",
            action = ArgAction::Append
        )]
        fields: Vec<String>,
    },

    /// Delete a record (asks for confirmation; irreversible).
    Delete {
        #[arg(value_name = "TYPE")]
        record_type: String,
        #[arg(value_name = "ID")]
        id: String,
        #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt.")]
        yes: bool,
    },

    /// Show a single record read-only.
    View {
        #[arg(value_name = "TYPE")]
        record_type: String,
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Export a record as a PDF into the download directory.
    Export {
        #[arg(value_name = "TYPE")]
        record_type: String,
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Manage the signed-in counselor's profile.
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Show the current profile.
    Show,

    /// Update display name and/or email.
    Update {
        #[arg(long = "name", value_name = "NAME")]
        name: Option<String>,
        #[arg(long = "email", value_name = "EMAIL")]
        email: Option<String>,
    },

    /// Change the password (prompted on stdin).
    Password,

    /// Upload a profile photo (max 5 MiB, image files only).
    Photo {
        #[arg(value_name = "FILE")]
        path: String,
    },

    /// Remove the profile photo.
    DeletePhoto,
}
