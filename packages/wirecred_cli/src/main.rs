//! wirecred command-line entry point
//!
//! Thin outer surface: argument parsing, environment handling, interactive
//! prompts and the exit status. All provisioning logic lives in the
//! `wirecred` library.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use zeroize::Zeroize;

use wirecred::credentials::CredentialStore;
use wirecred::crypto::Secret;
use wirecred::input::Prompt;
use wirecred::registration::ClientConfig;

#[derive(Parser)]
#[command(
    name = "wirecred",
    version,
    about = "Provision OAuth2/OIDC dynamic client credentials for an IAM server"
)]
struct Cli {
    /// Instance name; selects the config directory and credential file
    #[arg(default_value = "automatic")]
    instance: String,

    /// IAM endpoint; falls back to the IAM_INSTANCE environment variable
    iam_endpoint: Option<String>,

    /// Skip TLS certificate verification on the registration call
    #[arg(long)]
    insecure: bool,

    /// Do not password-protect (or persist) the registered credentials
    #[arg(long)]
    no_password: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let iam_server = env::var("IAM_INSTANCE")
        .ok()
        .filter(|v| !v.is_empty())
        .or(cli.iam_endpoint);
    let Some(iam_server) = iam_server else {
        println!("No IAM instance specified, please set env IAM_INSTANCE or use:");
        println!("wirecred <instance name> <IAM endpoint>");
        return Ok(ExitCode::SUCCESS);
    };

    let callback = env::var("OAUTH_CALLBACK").ok().filter(|v| !v.is_empty());
    let Some(callback) = callback else {
        println!("No service redirect callback url specified, please set env OAUTH_CALLBACK");
        return Ok(ExitCode::SUCCESS);
    };

    let conf_dir = PathBuf::from(format!(".{}", cli.instance));
    if !conf_dir.exists() {
        fs::create_dir_all(&conf_dir)
            .with_context(|| format!("cannot create config directory {}", conf_dir.display()))?;
    }

    let http = reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()
        .context("cannot build HTTP client")?;

    let store = CredentialStore {
        conf_dir,
        client: ClientConfig {
            callback_url: callback,
            client_name: cli.instance.clone(),
        },
        iam_endpoint: Some(iam_server),
        protect: !cli.no_password,
        http,
    };

    let mut prompt = StdinPrompt;
    let (endpoint, response) = store
        .provision(&cli.instance, &mut prompt)
        .context("credential provisioning failed")?;
    log::debug!("IAM endpoint in use: {endpoint}");

    println!("{}", response.client_id);
    println!("{}", response.client_secret);
    Ok(ExitCode::SUCCESS)
}

/// Interactive prompt over stdin/stdout.
///
/// Password entry is read as a plain line; terminal echo suppression is left
/// to the invoking environment.
struct StdinPrompt;

impl StdinPrompt {
    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl Prompt for StdinPrompt {
    fn ask_string(&mut self, question: &str, default: &str) -> io::Result<String> {
        if default.is_empty() {
            print!("|=> {question}: ");
        } else {
            print!("|=> {question} (press enter for default [{default}]): ");
        }
        io::stdout().flush()?;

        let text = self.read_line()?;
        if text.is_empty() && !default.is_empty() {
            return Ok(default.to_string());
        }
        Ok(text)
    }

    fn ask_password(&mut self, question: &str, confirm: bool) -> io::Result<Secret> {
        print!("==> {question}: ");
        io::stdout().flush()?;
        let mut first = self.read_line()?;

        if confirm {
            print!("==> Repeat the password: ");
            io::stdout().flush()?;
            let mut second = self.read_line()?;
            let matches = first == second;
            second.zeroize();
            if !matches {
                first.zeroize();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "passwords do not match",
                ));
            }
        }

        Ok(Secret::new(first.into_bytes()))
    }
}
