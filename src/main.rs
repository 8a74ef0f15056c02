/*!
# fieldcrypt - Batch Field Encryption

Command-line entry point for encrypting or decrypting every encrypted field
of every record stored in a fieldcrypt database. Useful when encryption is
first switched on for an existing dataset, or when moving data back to
plaintext before switching encryptors.

## Usage

```text
fieldcrypt [OPTIONS] <COMMAND>

Commands:
  encrypt  Encrypt every encrypted field of every stored record
  decrypt  Decrypt every encrypted field and write the plain values back
  status   Show which record types hold encrypted fields

Options:
      --log-format <FORMAT>  Log output format [default: text] [possible values: text, json]
  -h, --help                 Print help
  -V, --version              Print version
```

## Exit codes

- `0`: success
- `1`: declined confirmation or runtime failure
- `2`: unsupported encryptor name

## Configuration

See [`fieldcrypt::config`] for the environment variables read at startup.
*/

use fieldcrypt::cli::{is_confirmation, BatchArgs, CliArgs, Command};
use fieldcrypt::config::Config;
use fieldcrypt::constants::{
    DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, TRACING_ROOT_SPAN_NAME, TRACING_SERVICE_NAME,
};
use fieldcrypt::crypto::EncryptorRegistry;
use fieldcrypt::db::Database;
use fieldcrypt::errors::AppResult;
use fieldcrypt::ops::{self, BatchReport, ProgressCallback};
use fieldcrypt::schema::SchemaRegistry;
use fieldcrypt::subscriber::EncryptSubscriber;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, info_span};
use tracing_subscriber::EnvFilter;

const EXIT_DECLINED: u8 = 1;
const EXIT_INVALID_ENCRYPTOR: u8 = 2;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args.log_format);

    let correlation_id = uuid::Uuid::new_v4().to_string();
    let root_span = info_span!(
        TRACING_ROOT_SPAN_NAME,
        service_name = TRACING_SERVICE_NAME,
        correlation_id = %correlation_id
    );
    let _guard = root_span.enter();

    debug!("CLI arguments: {:?}", args);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Installs the global tracing subscriber writing to stderr.
///
/// `RUST_LOG` selects the level (defaults to `info`).
fn init_tracing(log_format: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // A subscriber may already be installed when embedded in another process.
    let result = if log_format == LOG_FORMAT_JSON {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn run(args: CliArgs) -> AppResult<ExitCode> {
    info!("Starting fieldcrypt");
    let mut config = Config::load()?;

    match args.command {
        Command::Encrypt(batch) => {
            config.encryptor = batch.encryptor.clone().unwrap_or(config.encryptor);
            run_batch(&config, &batch, Mode::Encrypt)
        }
        Command::Decrypt(batch) => {
            config.encryptor = batch.encryptor.clone().unwrap_or(config.encryptor);
            run_batch(&config, &batch, Mode::Decrypt)
        }
        Command::Status => {
            config.validate()?;
            let schemas = config.load_schemas()?;
            let db = open_database(&config, &schemas)?;
            print_status(&db, &schemas)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Mode::Encrypt => "encrypted",
            Mode::Decrypt => "decrypted",
        }
    }
}

fn run_batch(config: &Config, batch: &BatchArgs, mode: Mode) -> AppResult<ExitCode> {
    config.validate()?;

    let registry = EncryptorRegistry::with_builtins();
    if !registry.contains(&config.encryptor) {
        eprintln!("Given encryptor '{}' does not exist", config.encryptor);
        eprintln!("Supported encryptors: {}", registry.names().join(", "));
        return Ok(ExitCode::from(EXIT_INVALID_ENCRYPTOR));
    }

    let schemas = Arc::new(config.load_schemas()?);
    let types = ops::encryptable_types(&schemas);

    let question = format!(
        "{} record types found which contain encrypted fields.\n\
         They are going to be {} with [{}].\n\
         Wrong settings can mess up your data and it will be unrecoverable.\n\
         Make a backup first.\n\
         Continue with this action? (y/yes)",
        types.len(),
        mode.verb(),
        config.encryptor
    );
    if !confirm(&question, batch.answer.as_deref())? {
        info!("Batch run declined");
        return Ok(ExitCode::from(EXIT_DECLINED));
    }

    let encryptor = config.build_encryptor(&registry)?;
    let db = open_database(config, &schemas)?;
    let subscriber = EncryptSubscriber::new(Arc::clone(&schemas), Some(encryptor))
        .with_wrapped_errors(config.wrap_errors);
    let mut session = db.session(subscriber);

    let progress: ProgressCallback = Box::new(|record_type: &str, done: usize, total: usize| {
        eprintln!("  {}: {}/{}", record_type, done, total);
    });

    println!(
        "{} all fields can take up to several minutes depending on the database size.",
        match mode {
            Mode::Encrypt => "Encrypting",
            Mode::Decrypt => "Decrypting",
        }
    );

    let report = match mode {
        Mode::Encrypt => {
            ops::encrypt_database(&mut session, &types, batch.batch_size, Some(progress))?
        }
        Mode::Decrypt => {
            ops::decrypt_database(&mut session, &types, batch.batch_size, Some(progress))?
        }
    };

    print_report(&report, mode);
    Ok(ExitCode::SUCCESS)
}

fn open_database(config: &Config, schemas: &SchemaRegistry) -> AppResult<Database> {
    let mut db = Database::open(&config.db_path)?;
    for record_type in schemas.type_names() {
        db.register_documents(record_type);
    }
    Ok(db)
}

/// Asks `question` on stdout unless `answer` was given up front.
///
/// Only y/yes counts as confirmation; end of input declines.
fn confirm(question: &str, answer: Option<&str>) -> AppResult<bool> {
    if let Some(answer) = answer {
        debug!("Using answer supplied on the command line");
        return Ok(is_confirmation(answer));
    }

    print!("{} ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(is_confirmation(&input))
}

fn print_report(report: &BatchReport, mode: Mode) {
    match mode {
        Mode::Encrypt => {
            println!(
                "Encryption finished. Values encrypted: {} values.",
                report.values
            );
            println!("All values are now encrypted.");
        }
        Mode::Decrypt => {
            println!(
                "Decryption finished. Values found: {} values, all decrypted.",
                report.values
            );
            println!("All values are now decrypted.");
        }
    }
    println!(
        "Processed {} records of {} types in {:.2?}.",
        report.records, report.record_types, report.duration
    );
}

fn print_status(db: &Database, schemas: &SchemaRegistry) -> AppResult<()> {
    let statuses = ops::inspect_database(db, schemas)?;
    if statuses.is_empty() {
        println!("No record types contain encrypted fields.");
        return Ok(());
    }

    let width = statuses
        .iter()
        .map(|status| status.record_type.len())
        .max()
        .unwrap_or(0)
        .max("Record type".len());

    println!("{:<width$}  {:>10}  {:>8}", "Record type", "Encrypted", "Records");
    for status in &statuses {
        println!(
            "{:<width$}  {:>10}  {:>8}",
            status.record_type, status.encrypted_properties, status.stored_records
        );
    }
    Ok(())
}
