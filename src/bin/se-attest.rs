use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tracing::error;

use se_attest::api::{
    AttestationConfig, AttestationReport, CertificateRead, SimulatedElement, StepOutcome,
    WaitPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "se-attest")]
#[command(about = "Secure element device attestation and certificate provisioning", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Certificate (PEM or DER) held in the factory slot of the simulated element
    #[arg(long, value_name = "FILE")]
    pub factory_cert: Option<PathBuf>,

    /// Object identifier of the factory certificate slot
    #[arg(long, default_value = "0xE0E0")]
    pub factory_slot: String,

    /// Object identifier of the writable user certificate slot
    #[arg(long, default_value = "0xE0E1")]
    pub user_slot: String,

    /// Provision this PEM certificate into the user slot
    #[arg(long, value_name = "PEM_FILE")]
    pub write: Option<PathBuf>,

    /// Write without reading the user slot metadata first
    #[arg(long)]
    pub no_metadata_check: bool,

    /// Refuse to write when the user slot is locked (change access NEV)
    #[arg(long, conflicts_with = "no_metadata_check")]
    pub strict_metadata: bool,

    /// Do not read the certificate back after writing it
    #[arg(long)]
    pub no_verify: bool,

    /// Upper bound on each element operation in milliseconds (0 waits forever)
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Sleep between completion polls in milliseconds (at least 1)
    #[arg(long, default_value_t = 10)]
    pub poll_ms: u64,

    /// Simulated element response latency in milliseconds
    #[arg(long, default_value_t = 20)]
    pub latency_ms: u64,
}

impl Cli {
    fn config(&self) -> anyhow::Result<AttestationConfig> {
        let mut config = AttestationConfig {
            metadata_check_enabled: !self.no_metadata_check,
            strict_metadata: self.strict_metadata,
            verify_after_write: !self.no_verify,
            wait: WaitPolicy {
                poll_interval: Duration::from_millis(self.poll_ms),
                timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
            },
            ..AttestationConfig::default()
        }
        .with_slots(&self.factory_slot, &self.user_slot)
        .context("invalid slot")?;

        if let Some(path) = &self.write {
            let pem = fs::read_to_string(path)
                .with_context(|| format!("failed to read candidate certificate {}", path.display()))?;
            config = config.with_write(pem);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn factory_certificate(&self) -> anyhow::Result<Vec<u8>> {
        match &self.factory_cert {
            Some(path) => fs::read(path)
                .with_context(|| format!("failed to read factory certificate {}", path.display())),
            None => Ok(Vec::new()),
        }
    }
}

fn describe<T>(outcome: &StepOutcome<T>, done: impl Fn(&T) -> String) -> String {
    match outcome {
        StepOutcome::Done(value) => done(value),
        StepOutcome::Skipped(reason) => format!("skipped ({})", reason),
        StepOutcome::Failed(e) => format!("failed ({})", e),
    }
}

fn describe_read(read: &CertificateRead) -> String {
    match read {
        CertificateRead::Present {
            len,
            fingerprint: Some(fingerprint),
        } => format!("{} bytes, SHA-256 {}", len, fingerprint),
        CertificateRead::Present {
            len,
            fingerprint: None,
        } => format!("{} bytes", len),
        CertificateRead::Empty => "read failed or empty".to_string(),
    }
}

fn print_report(report: &AttestationReport) {
    println!("factory certificate: {}", describe_read(&report.factory));
    println!(
        "metadata check: {}",
        describe(&report.metadata, |decision| {
            if decision.is_permitted() {
                "permitted".to_string()
            } else {
                "not permitted".to_string()
            }
        })
    );
    println!(
        "candidate: {}",
        describe(&report.candidate, |candidate| format!(
            "{} ({} bytes DER)",
            candidate.subject, candidate.der_len
        ))
    );
    println!(
        "write: {}",
        describe(&report.write, |len| format!("{} bytes", len))
    );
    println!("read-back: {}", describe(&report.read_back, describe_read));
    println!(
        "verify: {}",
        describe(&report.verify, |outcome| outcome.to_string())
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.config()?;
    let element = se_attest::simulated_element(&config, cli.factory_certificate()?)
        .with_latency(Duration::from_millis(cli.latency_ms));

    let report = se_attest::attest(&element, &config).context("attestation failed")?;
    print_report(&report);
    print_user_slot(&element, &config);

    let problems = report.problems();
    if !problems.is_empty() {
        for problem in &problems {
            error!("{}", problem);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_user_slot(element: &SimulatedElement, config: &AttestationConfig) {
    if let Some(data) = element.object(config.user_slot) {
        println!("user slot {}: {} bytes", config.user_slot, data.len());
    }
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use std::io::Write;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn test_cli_version_parameter() {
        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        let assert = cmd.arg("--version").assert();
        assert.success();
    }

    #[test]
    fn test_cli_reads_factory_certificate() {
        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        let output = cmd
            .arg("--factory-cert")
            .arg(fixture("user_cert.pem"))
            .arg("--latency-ms")
            .arg("0")
            .assert()
            .success()
            .get_output()
            .clone();

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("factory certificate:"), "stdout: {}", stdout);
        assert!(stdout.contains("write: skipped (disabled)"), "stdout: {}", stdout);
    }

    #[test]
    fn test_cli_provisions_and_verifies() {
        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        let output = cmd
            .arg("--factory-cert")
            .arg(fixture("other_user_cert.pem"))
            .arg("--write")
            .arg(fixture("user_cert.pem"))
            .arg("--latency-ms")
            .arg("1")
            .assert()
            .success()
            .get_output()
            .clone();

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("write: 470 bytes"), "stdout: {}", stdout);
        assert!(stdout.contains("verify: match"), "stdout: {}", stdout);
        assert!(stdout.contains("user slot 0xE0E1: 470 bytes"), "stdout: {}", stdout);
    }

    #[test]
    fn test_cli_fails_on_invalid_candidate() {
        let mut candidate = tempfile::NamedTempFile::new().unwrap();
        writeln!(candidate, "this is not a certificate").unwrap();

        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        let output = cmd
            .arg("--factory-cert")
            .arg(fixture("user_cert.pem"))
            .arg("--write")
            .arg(candidate.path())
            .arg("--latency-ms")
            .arg("0")
            .assert()
            .failure()
            .get_output()
            .clone();

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("candidate: failed"), "stdout: {}", stdout);
        assert!(stdout.contains("user slot 0xE0E1: 0 bytes"), "stdout: {}", stdout);
    }

    #[test]
    fn test_cli_fails_without_factory_certificate() {
        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        cmd.arg("--latency-ms").arg("0").assert().failure();
    }

    #[test]
    fn test_cli_rejects_bad_slot() {
        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        let output = cmd
            .arg("--user-slot")
            .arg("0xZZ")
            .assert()
            .failure()
            .get_output()
            .clone();

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("invalid slot"), "stderr: {}", stderr);
    }

    #[test]
    fn test_cli_rejects_zero_poll_interval() {
        let mut cmd = Command::cargo_bin("se-attest").unwrap();
        let output = cmd
            .arg("--factory-cert")
            .arg(fixture("user_cert.pem"))
            .arg("--poll-ms")
            .arg("0")
            .assert()
            .failure()
            .get_output()
            .clone();

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Poll interval"), "stderr: {}", stderr);
    }
}
