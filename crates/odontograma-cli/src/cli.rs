//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use odontograma_core::models::{Dentition, Surface, ToothNumber};

#[derive(Parser)]
#[command(
    name = "odontograma",
    version,
    about = "Dental charts (odontogramas) for patient records",
    long_about = "Create and edit odontogramas stored in a local clinic database.\n\n\
                  Every edit runs through an editor session and is saved immediately."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Clinic database file.
    #[arg(
        long = "db",
        env = "ODONTOGRAMA_DB",
        value_name = "PATH",
        default_value = "odontograma.db",
        global = true
    )]
    pub db: PathBuf,

    /// Save without checking tooth numbers against the chart's dentition.
    #[arg(long = "no-validate", global = true)]
    pub no_validate: bool,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the condition catalog.
    Conditions,

    /// Show the quadrant layout of a dentition (adulto or niño).
    Layout {
        #[arg(value_name = "TIPO")]
        tipo: Dentition,
    },

    /// Create an empty odontogram for a patient.
    Create(CreateArgs),

    /// List a patient's odontograms, newest first.
    List(PatientArgs),

    /// Show one odontogram.
    Show(ShowArgs),

    /// Turn a condition on or off for one tooth.
    Toggle(ToggleArgs),

    /// Replace the notes of an odontogram.
    Note(NoteArgs),

    /// Set or clear the note on one tooth surface.
    Surface(SurfaceArgs),

    /// Delete one odontogram, or all of a patient's with --all.
    Delete(DeleteArgs),
}

#[derive(Args)]
pub struct PatientArgs {
    /// Patient id.
    #[arg(long = "patient", value_name = "ID")]
    pub patient: String,
}

#[derive(Args)]
pub struct ChartArgs {
    /// Patient id.
    #[arg(long = "patient", value_name = "ID")]
    pub patient: String,

    /// Odontogram id.
    #[arg(long = "id", value_name = "ID")]
    pub id: String,
}

#[derive(Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub patient: PatientArgs,

    /// Dentition type (adulto or niño).
    #[arg(long = "tipo", default_value = "adulto")]
    pub tipo: Dentition,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub chart: ChartArgs,

    /// Print the stored document as JSON.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct ToggleArgs {
    #[command(flatten)]
    pub chart: ChartArgs,

    /// FDI tooth number.
    #[arg(long = "tooth")]
    pub tooth: ToothNumber,

    /// Condition code (see `conditions`).
    #[arg(long = "code")]
    pub code: String,

    /// Remove the condition instead of adding it.
    #[arg(long = "off")]
    pub off: bool,
}

#[derive(Args)]
pub struct NoteArgs {
    #[command(flatten)]
    pub chart: ChartArgs,

    /// New notes; empty clears them.
    #[arg(long = "text", default_value = "")]
    pub text: String,
}

#[derive(Args)]
pub struct SurfaceArgs {
    #[command(flatten)]
    pub chart: ChartArgs,

    /// FDI tooth number.
    #[arg(long = "tooth")]
    pub tooth: ToothNumber,

    /// Surface: oclusal, mesial, distal, vestibular or lingual.
    #[arg(long = "surface")]
    pub surface: Surface,

    /// Note text; empty clears it.
    #[arg(long = "text", default_value = "")]
    pub text: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub patient: PatientArgs,

    /// Odontogram id.
    #[arg(long = "id", value_name = "ID", required_unless_present = "all")]
    pub id: Option<String>,

    /// Delete every odontogram of the patient.
    #[arg(long = "all", conflicts_with = "id")]
    pub all: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
