use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{error, info, span, Level};

use objectstorage::{
    adapters::ObjectClient,
    fs::{ObjectFS, StorageConfig, DEFAULT_COPY_BUFFER_SIZE, DEFAULT_DELETE_BATCH_SIZE, DEFAULT_DELIMITER},
    model::fs::{FSError, FileInfo},
    storage::FileStorage,
    util::object::{BucketUri, Provider},
};

#[derive(Parser)]
#[command(name = "objectstorage", version, about = "File storage operations against an object store bucket")]
struct Cli {
    /// Bucket to operate on, as s3://<bucket> or gs://<bucket>
    bucket_uri: BucketUri,

    #[arg(long, default_value = DEFAULT_DELIMITER)]
    delimiter: String,

    /// Stream copy buffer in bytes, clamped to 4 KiB..64 KiB
    #[arg(long, default_value_t = DEFAULT_COPY_BUFFER_SIZE)]
    copy_buffer_size: usize,

    #[arg(long, default_value_t = DEFAULT_DELETE_BATCH_SIZE)]
    delete_batch_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print whether a file exists
    Exists { path: String },
    /// Download a file to stdout or --output
    Get {
        path: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload stdin or --input to a file
    Put {
        path: String,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print a file's size and modification time
    Info { path: String },
    /// List a directory, or the bucket root when no path is given
    Ls { path: Option<String> },
    /// Delete every file below a directory
    RmDir { path: String },
}

fn format_info(file: &FileInfo) -> String {
    if file.is_directory {
        return format!("d\t-\t-\t{}", file.path);
    }

    let modified = file
        .last_modified
        .and_then(|t| OffsetDateTime::from(t).format(&Rfc3339).ok())
        .unwrap_or_else(|| "-".to_string());

    format!("f\t{}\t{}\t{}", file.size, modified, file.path)
}

fn error_group(err: &FSError) -> &'static str {
    match err {
        FSError::NotFound { .. } => "not_found",
        FSError::Client { .. } => "client",
        FSError::PartialDeletion { .. } => "partial_deletion",
        FSError::Cancelled => "cancelled",
        FSError::Io { .. } => "io",
        FSError::InvalidUri { .. } => "invalid_uri",
    }
}

fn run(fs: &dyn FileStorage, command: Command) -> Result<(), FSError> {
    let span = span!(Level::INFO, "run", context = "run");
    let _e = span.enter();

    let mut stdout = io::stdout().lock();

    match command {
        Command::Exists { path } => {
            writeln!(stdout, "{}", fs.file_exists(&path)?)?;
        }
        Command::Get { path, output } => {
            let mut stream = fs.get_file(&path)?;
            match output {
                Some(output) => {
                    io::copy(&mut stream, &mut File::create(output)?)?;
                }
                None => {
                    io::copy(&mut stream, &mut stdout)?;
                }
            }
        }
        Command::Put { path, input } => match input {
            Some(input) => fs.save_file(&path, &mut File::open(input)?)?,
            None => fs.save_file(&path, &mut io::stdin().lock())?,
        },
        Command::Info { path } => {
            writeln!(stdout, "{}", format_info(&fs.get_file_info(&path)?))?;
        }
        Command::Ls { path } => {
            let files = match path {
                Some(path) => fs.get_files_info(&path)?,
                None => fs.get_root_files_info()?,
            };
            for file in files {
                writeln!(stdout, "{}", format_info(&file))?;
            }
        }
        Command::RmDir { path } => fs.delete_directory(&path)?,
    }

    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    info!(
        bucket = %cli.bucket_uri.bucket,
        provider = ?cli.bucket_uri.provider,
        "args"
    );

    let client: Arc<dyn ObjectClient> = match cli.bucket_uri.provider {
        Provider::AWS => {
            let config = aws_config::load_from_env().await;
            Arc::new(aws_sdk_s3::Client::new(&config))
        }
        Provider::GCS => {
            let config = match google_cloud_storage::client::ClientConfig::default()
                .with_auth()
                .await
            {
                Err(err) => {
                    error!(error_message=%err, error_group="auth");
                    return ExitCode::FAILURE;
                }
                Ok(config) => config,
            };
            Arc::new(google_cloud_storage::client::Client::new(config))
        }
    };

    let fs = ObjectFS::new(client, &cli.bucket_uri.bucket).with_config(StorageConfig {
        delimiter: cli.delimiter,
        copy_buffer_size: cli.copy_buffer_size,
        delete_batch_size: cli.delete_batch_size,
    });

    // Storage calls block on the client's futures; keep them off the runtime's
    // async threads.
    let command = cli.command;
    match tokio::task::spawn_blocking(move || run(&fs, command)).await {
        Err(err) => {
            error!(error_message=%err, error_group="join");
            ExitCode::FAILURE
        }
        Ok(Err(err)) => {
            error!(error_message=%err, error_group=error_group(&err));
            ExitCode::FAILURE
        }
        Ok(Ok(())) => ExitCode::SUCCESS,
    }
}
