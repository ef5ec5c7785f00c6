//! Probes a logon server.
//!
//! Without credentials only the logon challenge is sent and the process exits with the
//! challenge status. With `--password` or `--hash` the full proof is run and the realm list
//! is requested.
//!
//! Exit codes: 0 on success, the server status on an auth failure, 2 on bad arguments,
//! 3 when the connection fails and 4 on timeout.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wow_session::client::Credentials;
use wow_session::error::ErrorKind;
use wow_session::integrity::read_windows_files;
use wow_session::logon::packets::{
    expected_length, FrameLength, LogonChallengeRequest, LogonChallengeResponse,
};
use wow_session::normalized_string::NormalizedString;
use wow_session::transport::{TcpTransport, Transport};
use wow_session::{ClientInfo, HashEndianness, KMode, LogonSession, LogonState, SrpOptions};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KArg {
    #[value(name = "3")]
    Three,
    Hashed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EndianArg {
    Le,
    Be,
}

#[derive(Parser)]
#[command(name = "auth_probe")]
#[command(about = "Checks a logon server with a challenge or a full login")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    host: String,
    port: u16,
    account: String,
    major: u8,
    minor: u8,
    patch: u8,
    build: u16,
    /// Logon protocol version, 8 for 3.3.5a
    proto: u8,
    /// Four character locale such as enUS
    locale: String,

    #[arg(long, default_value = "x86")]
    platform: String,

    #[arg(long, default_value = "Win")]
    os: String,

    #[arg(long, conflicts_with = "hash")]
    password: Option<String>,

    /// SHA-1 of "ACCOUNT:PASSWORD" as 40 hex characters
    #[arg(long)]
    hash: Option<String>,

    /// PIN or authenticator token, if the server asks for one
    #[arg(long)]
    security_code: Option<String>,

    /// Game directory to compute the client integrity hash from
    #[arg(long)]
    integrity_dir: Option<PathBuf>,

    #[arg(long, default_value = "Wow.exe", requires = "integrity_dir")]
    integrity_exe: String,

    #[arg(long, value_enum, default_value = "3")]
    k: KArg,

    #[arg(long, value_enum, default_value = "le")]
    hash_endian: EndianArg,

    #[arg(long, default_value_t = 4000)]
    timeout_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

enum Outcome {
    Success,
    Rejected(u8),
    ConnectFailed,
    TimedOut,
}

impl Outcome {
    fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Rejected(status) => ExitCode::from(*status),
            Outcome::ConnectFailed => ExitCode::from(3),
            Outcome::TimedOut => ExitCode::from(4),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let fallback = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();

    match run(&cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn client_info(cli: &Cli) -> Result<ClientInfo> {
    let mut info = ClientInfo::default()
        .with_version(cli.major, cli.minor, cli.patch, cli.build)
        .with_protocol_version(cli.proto)
        .with_locale(&cli.locale)
        .with_platform(&cli.platform, &cli.os);

    if let Some(dir) = &cli.integrity_dir {
        let files = read_windows_files(dir, &cli.integrity_exe)
            .with_context(|| format!("could not read client files from {}", dir.display()))?;
        info!(dir = %dir.display(), bytes = files.len(), "using client files for integrity hash");
        info = info.with_integrity_files(files);
    }

    Ok(info)
}

fn credentials(cli: &Cli) -> Result<Option<Credentials>> {
    match (&cli.password, &cli.hash) {
        (Some(password), _) => Ok(Some(
            Credentials::password(password.as_str()).map_err(|e| anyhow!("invalid password: {}", e))?,
        )),
        (None, Some(hash)) => {
            let bytes = hex::decode(hash).context("--hash is not hex")?;
            let hash = <[u8; 20]>::try_from(bytes.as_slice())
                .map_err(|_| anyhow!("--hash must be 20 bytes, got {}", bytes.len()))?;
            Ok(Some(Credentials::hash(hash)))
        }
        (None, None) => Ok(None),
    }
}

fn run(cli: &Cli) -> Result<Outcome> {
    let info = client_info(cli)?;
    let timeout = Duration::from_millis(cli.timeout_ms);

    match credentials(cli)? {
        Some(credentials) => login(cli, info, credentials, timeout),
        None => challenge_only(cli, &info, timeout),
    }
}

fn challenge_only(cli: &Cli, info: &ClientInfo, timeout: Duration) -> Result<Outcome> {
    let account = NormalizedString::new(cli.account.as_str())
        .map_err(|e| anyhow!("invalid account name: {}", e))?;

    let mut transport = match TcpTransport::connect(&cli.host, cli.port) {
        Ok(transport) => transport,
        Err(e) => {
            error!(host = %cli.host, port = cli.port, %e, "connect failed");
            return Ok(Outcome::ConnectFailed);
        }
    };

    transport.write_all(&LogonChallengeRequest::new(info, account).write())?;
    debug!("sent LOGON_CHALLENGE");

    let deadline = Instant::now() + timeout;
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];

    while Instant::now() < deadline {
        transport.flush()?;
        match transport.read(&mut chunk) {
            Ok(0) => bail!("server closed the connection before answering"),
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        let length = match expected_length(&buffer, info.build)? {
            FrameLength::Known(length) if length <= buffer.len() => length,
            _ => continue,
        };

        let response = LogonChallengeResponse::read(&buffer[..length])?;
        transport.close();

        return Ok(match response.challenge {
            Some(challenge) if response.result.is_success() => {
                println!(
                    "challenge ok: g_len={} n_len={} security_flags=0x{:02X}",
                    challenge.generator.len(),
                    challenge.large_safe_prime.len(),
                    challenge.security_flags.as_u8()
                );
                Outcome::Success
            }
            _ => {
                println!(
                    "challenge failed: {} (0x{:02X})",
                    response.result.message(),
                    response.result.as_u8()
                );
                Outcome::Rejected(response.result.as_u8())
            }
        });
    }

    transport.close();
    error!("timed out waiting for LOGON_CHALLENGE");
    Ok(Outcome::TimedOut)
}

fn login(cli: &Cli, info: ClientInfo, credentials: Credentials, timeout: Duration) -> Result<Outcome> {
    let options = SrpOptions::default()
        .with_k_mode(match cli.k {
            KArg::Three => KMode::Three,
            KArg::Hashed => KMode::Hashed,
        })
        .with_hash_endianness(match cli.hash_endian {
            EndianArg::Le => HashEndianness::Little,
            EndianArg::Be => HashEndianness::Big,
        });

    let mut session = match LogonSession::connect(&cli.host, cli.port, info) {
        Ok(session) => session.with_srp_options(options),
        Err(e) => {
            error!(%e, "connect failed");
            return Ok(Outcome::ConnectFailed);
        }
    };

    session.authenticate(&cli.account, credentials, cli.security_code.as_deref())?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Err(e) = session.update() {
            session.disconnect();
            println!("login failed: {}", e);
            return Ok(match (e.kind(), e.code()) {
                (ErrorKind::Timeout, _) => Outcome::TimedOut,
                (_, Some(code)) => Outcome::Rejected(code),
                _ => return Err(e.into()),
            });
        }

        match session.state() {
            LogonState::Authenticated => session.request_realm_list()?,
            LogonState::RealmListReceived => break,
            LogonState::PinRequired | LogonState::AuthenticatorRequired => {
                session.disconnect();
                bail!("server asked for a security code, pass --security-code");
            }
            LogonState::Disconnected => bail!("server closed the connection"),
            _ => {}
        }

        if Instant::now() >= deadline {
            session.disconnect();
            error!("timed out after {} ms", timeout.as_millis());
            return Ok(Outcome::TimedOut);
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    println!("login ok, {} realms", session.realms().len());
    for realm in session.realms() {
        println!(
            "  {:>3} {:<24} {:<22} {} pop={:.2} chars={}{}",
            realm.id,
            realm.name,
            realm.address,
            realm.realm_type,
            realm.population,
            realm.characters,
            if realm.is_locked() { " locked" } else { "" }
        );
    }

    session.disconnect();
    Ok(Outcome::Success)
}
