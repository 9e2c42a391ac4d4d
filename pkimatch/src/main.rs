//! pkimatch: find which issuers in a PKI store could have issued a certificate.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use pkimatch_lib::{
    list_intermediates, list_intermediates_parallel, verify_sign, Cancellation, ErrorMode,
    MatchPolicy, MemoryStore, Outcome, OutputFormat, Relationship, ScanOptions, VerifyOptions,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Exit status when some candidates could not be evaluated (`--keep-going`).
const EXIT_PARTIAL_FAILURE: i32 = 3;

#[derive(Parser)]
#[command(
    name = "pkimatch",
    about = "Analyze issuer relationships between certificates in PKI mounts",
    long_about = "pkimatch checks whether one issuer could have issued another\n\
                  certificate using five independent predicates: subject_match,\n\
                  path_match, trust_match, key_id_match and signature_match.\n\n\
                  Certificates are read from a JSON snapshot of the PKI store,\n\
                  given with --store or the PKIMATCH_STORE environment variable.",
    after_help = "EXAMPLES:\n\
                  \n  pkimatch --store pki.json verify-sign pki-root/issuer/root pki-int/issuer/int\
                  \n  pkimatch --store pki.json list-intermediates pki-root/issuer/root\
                  \n  pkimatch --store pki.json --format json list-intermediates pki-root/issuer/root pki-int\
                  \n  PKIMATCH_STORE=pki.json pkimatch list-intermediates --trust-match=true pki-root/issuer/root"
)]
struct Cli {
    /// JSON snapshot of the PKI store
    #[arg(long, global = true, env = "PKIMATCH_STORE", value_name = "FILE")]
    store: Option<PathBuf>,
    /// Output format: table, json, yaml
    #[arg(long, global = true, default_value = "table", value_name = "FORMAT")]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report all five relationships between an issuer and an issued certificate
    #[command(after_help = "EXAMPLES:\n\
                      \n  pkimatch verify-sign pki-root/issuer/root pki-int/issuer/int\
                      \n  pkimatch --format json verify-sign pki/issuer/a pki/issuer/b\
                      \n  pkimatch verify-sign --no-check-time pki/issuer/old pki/certs/17-2a")]
    VerifySign {
        /// Path of the candidate issuer
        issuer: String,
        /// Path of the certificate to check
        issued: String,
        #[command(flatten)]
        validation: ValidationArgs,
    },
    /// List the certificates PARENT could have issued
    #[command(after_help = "TARGETS:\n\
                      \n  Each target is a certificate path (containing /issuer/, /certs/ or\
                      \n  /revoked/) used as is, or a mount whose issuers are all examined.\
                      \n  Without targets every mount of type pki is examined.\
                      \n\nPOLICY:\n\
                      \n  A candidate matches when every enabled predicate holds. By default\
                      \n  subject_match, key_id_match and signature_match are enabled.\
                      \n\nEXAMPLES:\n\
                      \n  pkimatch list-intermediates pki-root/issuer/root\
                      \n  pkimatch list-intermediates pki-root/issuer/root pki-int pki-root\
                      \n  pkimatch list-intermediates --key-id-match=false pki/issuer/root\
                      \n  pkimatch list-intermediates --keep-going --jobs 8 --timeout 30s pki/issuer/root\
                      \n  pkimatch list-intermediates --verbose --format yaml pki/issuer/root")]
    ListIntermediates {
        /// Path of the anchor issuer
        parent: String,
        /// Certificate paths or mounts to examine (default: all pki mounts)
        targets: Vec<String>,
        /// Require the issuer subject to equal the candidate issuer name
        #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
        subject_match: bool,
        /// Require the issuer to appear in the candidate's CA chain
        #[arg(long, default_value_t = false, action = ArgAction::Set, value_name = "BOOL")]
        path_match: bool,
        /// Require path validation anchored at the issuer to succeed
        #[arg(long, default_value_t = false, action = ArgAction::Set, value_name = "BOOL")]
        trust_match: bool,
        /// Require the candidate AKID to equal the issuer SKID
        #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
        key_id_match: bool,
        /// Require the candidate signature to verify with the issuer key
        #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
        signature_match: bool,
        /// Show issuers by their configured names instead of ids
        #[arg(long)]
        use_names: bool,
        /// Report unreadable candidates and continue instead of aborting
        #[arg(long)]
        keep_going: bool,
        /// Evaluate candidates on N worker threads
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,
        /// Give up after DURATION (e.g. 30s, 5m)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        timeout: Option<Duration>,
        /// Print all five relationships for every candidate
        #[arg(short, long)]
        verbose: bool,
        #[command(flatten)]
        validation: ValidationArgs,
    },
}

/// Path validation flags shared by both subcommands.
#[derive(Args)]
struct ValidationArgs {
    /// Skip validity period checks when computing trust_match
    #[arg(long)]
    no_check_time: bool,
    /// Validate trust paths at this Unix timestamp instead of now
    #[arg(long, value_name = "EPOCH")]
    attime: Option<i64>,
}

impl ValidationArgs {
    fn options(&self) -> VerifyOptions {
        VerifyOptions {
            check_time: !self.no_check_time,
            at_time: self.attime,
            ..VerifyOptions::default()
        }
    }
}

/// Parse a duration string using humantime format.
///
/// Plain numbers (e.g. "30") default to seconds. Otherwise, standard
/// humantime units are accepted: `s`, `m`, `h`, `d`, etc.
fn parse_duration(s: &str) -> Result<Duration> {
    if s.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = s.parse().context("Invalid duration value")?;
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).with_context(|| format!("Invalid duration: '{s}'"))
}

/// Build the match policy from the per-predicate flags.
fn policy_from_flags(
    subject_match: bool,
    path_match: bool,
    trust_match: bool,
    key_id_match: bool,
    signature_match: bool,
) -> MatchPolicy {
    let mut policy = MatchPolicy::none();
    policy
        .set(Relationship::SubjectMatch, subject_match)
        .set(Relationship::PathMatch, path_match)
        .set(Relationship::TrustMatch, trust_match)
        .set(Relationship::KeyIdMatch, key_id_match)
        .set(Relationship::SignatureMatch, signature_match);
    policy
}

fn open_store(path: Option<&PathBuf>) -> Result<MemoryStore> {
    let path = path.context("No store given: pass --store FILE or set PKIMATCH_STORE")?;
    let store = MemoryStore::from_file(path)
        .with_context(|| format!("Failed to load store snapshot: {}", path.display()))?;
    log::debug!("loaded {} documents from {}", store.len(), path.display());
    Ok(store)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let store = open_store(cli.store.as_ref())?;
    let renderer = cli.format.renderer();

    match &cli.command {
        Commands::VerifySign {
            issuer,
            issued,
            validation,
        } => {
            let result = verify_sign(&store, issuer, issued, &validation.options())
                .with_context(|| format!("Failed to compare {} with {}", issuer, issued))?;
            print!(
                "{}",
                renderer.render_flags(&result.to_map(), "Relationship", "Value")?
            );
        }
        Commands::ListIntermediates {
            parent,
            targets,
            subject_match,
            path_match,
            trust_match,
            key_id_match,
            signature_match,
            use_names,
            keep_going,
            jobs,
            timeout,
            verbose,
            validation,
        } => {
            let mut cancellation = Cancellation::new();
            if let Some(timeout) = timeout {
                cancellation = cancellation.with_deadline(Instant::now() + *timeout);
            }

            let options = ScanOptions {
                policy: policy_from_flags(
                    *subject_match,
                    *path_match,
                    *trust_match,
                    *key_id_match,
                    *signature_match,
                ),
                use_friendly_names: *use_names,
                error_mode: if *keep_going {
                    ErrorMode::Collect
                } else {
                    ErrorMode::Abort
                },
                verify: validation.options(),
                jobs: jobs.unwrap_or(0),
                cancellation,
            };

            let report = match jobs {
                Some(_) => list_intermediates_parallel(&store, parent, targets, &options),
                None => list_intermediates(&store, parent, targets, &options),
            }
            .with_context(|| format!("Failed to list intermediates of {}", parent))?;

            let output = if *verbose {
                renderer.render_details(&report.results)?
            } else {
                renderer.render_flags(&report.decisions(), "Issuer", "Matches")?
            };
            print!("{}", output);

            if report.outcome() == Outcome::PartialFailure {
                for failure in &report.failures {
                    eprintln!("{}: {}", failure.path, failure.error);
                }
                std::process::exit(EXIT_PARTIAL_FAILURE);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plain_number_is_seconds() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn humantime_units() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn reject_bad_durations() {
        assert!(parse_duration("-5").is_err());
        assert!(parse_duration("30x").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn default_flags_give_default_policy() {
        let cli =
            Cli::try_parse_from(["pkimatch", "list-intermediates", "pki/issuer/root"]).unwrap();
        let Commands::ListIntermediates {
            subject_match,
            path_match,
            trust_match,
            key_id_match,
            signature_match,
            ..
        } = cli.command
        else {
            panic!("wrong subcommand");
        };
        let policy = policy_from_flags(
            subject_match,
            path_match,
            trust_match,
            key_id_match,
            signature_match,
        );
        assert_eq!(policy, MatchPolicy::default());
    }

    #[test]
    fn predicate_flags_take_explicit_values() {
        let cli = Cli::try_parse_from([
            "pkimatch",
            "--format",
            "json",
            "list-intermediates",
            "--key-id-match=false",
            "--trust-match",
            "true",
            "pki/issuer/root",
            "pki-int",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::ListIntermediates {
            targets,
            key_id_match,
            trust_match,
            ..
        } = cli.command
        else {
            panic!("wrong subcommand");
        };
        assert_eq!(targets, vec!["pki-int"]);
        assert!(!key_id_match);
        assert!(trust_match);
    }

    #[test]
    fn verify_sign_needs_two_paths() {
        assert!(Cli::try_parse_from(["pkimatch", "verify-sign", "pki/issuer/a"]).is_err());
        let cli = Cli::try_parse_from([
            "pkimatch",
            "verify-sign",
            "--no-check-time",
            "pki/issuer/a",
            "pki/issuer/b",
        ])
        .unwrap();
        let Commands::VerifySign { validation, .. } = cli.command else {
            panic!("wrong subcommand");
        };
        assert!(!validation.options().check_time);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["pkimatch", "--format", "xml", "verify-sign", "a", "b"])
            .is_err());
    }
}
