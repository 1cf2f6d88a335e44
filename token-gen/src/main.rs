use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};
use token_issuer::{
    Config, Expiry, SignRequest, TokenIssuer, VerifyExpectation, build_issuer, parse_duration,
};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sign, decode and verify tokens with the key configured through `TOKEN_*`
/// environment variables (a `.env` file is honoured).
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a token and print it
    Sign(SignArgs),
    /// Print header and claims without checking the signature
    Decode {
        token: String,
    },
    /// Verify a token and print the reshaped claims
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct SignArgs {
    #[arg(long)]
    subject: String,

    /// Repeat for several audiences
    #[arg(long, required = true)]
    audience: Vec<String>,

    #[arg(long = "type", default_value = "access_token")]
    token_type: String,

    /// Duration ("10 minutes", "1h30m") or unix seconds
    #[arg(long, default_value = "1 hour")]
    expiry: String,

    #[arg(long)]
    id: Option<String>,

    #[arg(long)]
    scope: Vec<String>,

    /// Authentication context class; repeatable
    #[arg(long)]
    acr: Vec<String>,

    /// Authentication methods reference; repeatable
    #[arg(long)]
    amr: Vec<String>,

    /// Unix seconds. Default: now.
    #[arg(long, value_name = "UNIX_SECONDS")]
    not_before: Option<i64>,

    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    device_id: Option<String>,

    #[arg(long)]
    nonce: Option<String>,

    #[arg(long)]
    permission: Option<String>,

    #[arg(long)]
    username: Option<String>,

    /// JSON object, camelCase keys
    #[arg(long)]
    payload: Option<String>,

    /// JSON object of extra top-level claims
    #[arg(long)]
    claims: Option<String>,

    /// Print only the token
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    token: String,

    #[arg(long)]
    audience: Vec<String>,

    #[arg(long)]
    issuer: Option<String>,

    #[arg(long)]
    subject: Option<String>,

    #[arg(long)]
    nonce: Option<String>,

    /// e.g. "15 minutes"
    #[arg(long)]
    max_age: Option<String>,

    #[arg(long)]
    scope: Vec<String>,

    #[arg(long = "type")]
    token_type: Option<String>,

    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    device_id: Option<String>,
}

fn init_tracing() {
    // stdout carries the command output; logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_object(flag: &str, raw: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str(raw).with_context(|| format!("--{flag} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        _ => bail!("--{flag} must be a JSON object"),
    }
}

fn parse_expiry(raw: &str) -> Expiry {
    raw.trim()
        .parse::<i64>()
        .map(Expiry::from)
        .unwrap_or_else(|_| Expiry::from(raw))
}

fn parse_not_before(seconds: Option<i64>) -> anyhow::Result<Option<DateTime<Utc>>> {
    seconds
        .map(|s| {
            DateTime::from_timestamp(s, 0)
                .with_context(|| format!("--not-before {s} is out of range"))
        })
        .transpose()
}

fn load_issuer() -> anyhow::Result<TokenIssuer> {
    let config = Config::from_env().context("failed to load token configuration")?;
    debug!(?config, "loaded configuration");
    Ok(build_issuer(&config)?)
}

fn sign(args: SignArgs) -> anyhow::Result<()> {
    let issuer = load_issuer()?;

    let mut request = SignRequest::new(args.subject, args.token_type, parse_expiry(&args.expiry))
        .with_scopes(args.scope)
        .with_auth_context_class(args.acr)
        .with_auth_methods_reference(args.amr)
        .with_payload(parse_object("payload", args.payload.as_deref())?)
        .with_claims(parse_object("claims", args.claims.as_deref())?);
    request.audience = args.audience;
    request.id = args.id;
    request.not_before = parse_not_before(args.not_before)?;
    request.client_id = args.client_id;
    request.device_id = args.device_id;
    request.nonce = args.nonce;
    request.permission = args.permission;
    request.username = args.username;

    let signed = issuer.sign(&request)?;

    if args.quiet {
        println!("{}", signed.token);
        return Ok(());
    }

    println!("token: {}", signed.token);
    println!("id: {}", signed.id);
    println!("expires: {}", signed.expires.to_rfc3339());
    println!("expires_in: {}", signed.expires_in);
    Ok(())
}

fn decode(token: &str) -> anyhow::Result<()> {
    let decoded = TokenIssuer::decode(token)?;
    let out = json!({
        "header": { "kid": decoded.key_id, "alg": decoded.algorithm },
        "claims": decoded.claims,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn verify(args: VerifyArgs) -> anyhow::Result<()> {
    let issuer = load_issuer()?;

    let max_age = args.max_age.as_deref().map(parse_duration).transpose()?;
    let expectation = VerifyExpectation {
        audience: args.audience,
        issuer: args.issuer,
        subject: args.subject,
        nonce: args.nonce,
        max_age,
        scopes: args.scope,
        token_type: args.token_type,
        client_id: args.client_id,
        device_id: args.device_id,
    };

    let result = issuer.verify(&args.token, &expectation)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Sign(args) => sign(args),
        Command::Decode { token } => decode(&token),
        Command::Verify(args) => verify(args),
    }
}
