//! End-to-end verification with a real OpenPGP client.
//!
//! A throwaway maintainer key signs tags and commits in an upstream
//! repository; [`SourceFetcher`] then bootstraps its own keyring from the
//! exported key and verifies through `git verify-tag`/`verify-commit`.
//! Skipped when git, gpg, or gpgconf is missing, or when the client
//! cannot generate a key.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use fontis_core::{ComponentDir, Fingerprint, ProcessRunner};
use fontis_fetch::{EngineError, FetchOutcome, FetchRequest, SourceFetcher, Tooling};
use fontis_verify::{QuorumOutcome, VerificationError};

/// Run gpg against `home`, returning stdout, or `None` on any failure.
fn gpg(client: &Path, home: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(client)
        .arg("--homedir")
        .arg(home)
        .args(["--batch", "--no-tty"])
        .args(args)
        .output()
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

struct Maintainer {
    _tmp: tempfile::TempDir,
    gpg: PathBuf,
    gpgconf: PathBuf,
    home: PathBuf,
    fingerprint: String,
    repo: PathBuf,
    work: PathBuf,
}

impl Maintainer {
    /// A fresh signing key, its exported public key in `keys/`, and an
    /// upstream repository on `main` with one unsigned commit.
    fn new() -> Option<Self> {
        which::which("git").ok()?;
        let gpg_bin = which::which("gpg").ok()?;
        let gpgconf = which::which("gpgconf").ok()?;
        let tmp = tempfile::Builder::new().prefix("fontis").tempdir().ok()?;
        let work = tmp.path().join("work");
        ComponentDir::parse(&work.display().to_string()).ok()?;

        let home = tmp.path().join("signer");
        std::fs::create_dir_all(&home).ok()?;
        std::fs::set_permissions(&home, std::fs::Permissions::from_mode(0o700)).ok()?;
        gpg(
            &gpg_bin,
            &home,
            &[
                "--pinentry-mode",
                "loopback",
                "--passphrase",
                "",
                "--quick-gen-key",
                "Maintainer <maintainer@example.org>",
                "ed25519",
                "sign",
                "never",
            ],
        )?;
        let listing = gpg(&gpg_bin, &home, &["--with-colons", "--list-secret-keys"])?;
        let fingerprint = listing
            .lines()
            .find(|l| l.starts_with("fpr:"))?
            .split(':')
            .nth(9)?
            .to_owned();
        let armored = gpg(&gpg_bin, &home, &["--armor", "--export", &fingerprint])?;

        let keys = tmp.path().join("keys");
        std::fs::create_dir_all(&keys).ok()?;
        std::fs::write(keys.join(format!("{fingerprint}.asc")), armored).ok()?;

        let repo = tmp.path().join("upstream");
        std::fs::create_dir_all(&repo).ok()?;
        let maintainer = Self {
            _tmp: tmp,
            gpg: gpg_bin,
            gpgconf,
            home,
            fingerprint,
            repo,
            work,
        };
        maintainer.git(&["init", "-q"]);
        maintainer.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(maintainer.repo.join("README.md"), "# component\n").ok()?;
        maintainer.git(&["add", "."]);
        maintainer.git(&["commit", "-q", "-m", "initial"]);
        Some(maintainer)
    }

    /// Run git upstream with the maintainer's key configured. Panics on
    /// failure.
    fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(["-c", "user.name=Maintainer", "-c", "user.email=maintainer@example.org"])
            .arg("-c")
            .arg(format!("user.signingkey={}", self.fingerprint))
            .arg("-c")
            .arg(format!("gpg.program={}", self.gpg.display()))
            .args(args)
            .env("GNUPGHOME", &self.home)
            .current_dir(&self.repo)
            .output()
            .expect("spawn git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    }

    fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    fn signed_commit(&self, file: &str) -> String {
        std::fs::write(self.repo.join(file), "signed\n").expect("write file");
        self.git(&["add", "."]);
        self.git(&["commit", "-q", "-S", "-m", file]);
        self.head()
    }

    fn signer(&self) -> Fingerprint {
        Fingerprint::parse(&self.fingerprint).expect("gpg fingerprint")
    }

    fn keyring(&self) -> PathBuf {
        self.work.with_file_name("keyring")
    }

    fn request(&self) -> FetchRequest {
        FetchRequest {
            url: self.repo.display().to_string(),
            component_dir: self.work.display().to_string(),
            keyring_dir: self.keyring(),
            keys_dir: self.work.with_file_name("keys"),
            maintainers: vec![self.fingerprint.clone()],
            ..FetchRequest::default()
        }
    }

    fn fetcher(&self) -> SourceFetcher<ProcessRunner> {
        SourceFetcher::new(
            ProcessRunner,
            Tooling {
                gpg_candidates: vec![self.gpg.clone()],
                gpgconf: self.gpgconf.display().to_string(),
                ..Tooling::default()
            },
        )
    }
}

impl Drop for Maintainer {
    fn drop(&mut self) {
        for home in [self.home.clone(), self.keyring()] {
            let _ = Command::new(&self.gpgconf)
                .args(["--kill", "gpg-agent"])
                .env("GNUPGHOME", home)
                .status();
        }
    }
}

#[test]
fn maintainer_signed_tag_is_integrated() {
    let Some(m) = Maintainer::new() else { return };
    let head = m.head();
    m.git(&["tag", "-s", "v1.0", "-m", "release 1.0"]);

    let outcome = m.fetcher().run(&m.request()).expect("verified fetch");
    let FetchOutcome::Integrated {
        reference,
        verification: Some(QuorumOutcome::SignedTags { signers, tags, .. }),
        ..
    } = outcome
    else {
        panic!("expected verified integration, got {outcome:?}");
    };
    assert_eq!(reference, head);
    assert_eq!(signers.into_iter().collect::<Vec<_>>(), vec![m.signer()]);
    assert_eq!(tags.len(), 1);
    assert!(m.work.join("README.md").is_file());

    let mode = std::fs::metadata(m.keyring()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
fn quorum_failure_lists_each_tag() {
    let Some(m) = Maintainer::new() else { return };
    m.git(&["tag", "-s", "v1.0", "-m", "release 1.0"]);

    let request = FetchRequest {
        minimum_distinct_maintainers: 2,
        ..m.request()
    };
    let err = m.fetcher().run(&request).expect_err("one signer is not two");
    assert!(
        matches!(
            err,
            EngineError::Verification(VerificationError::InsufficientQuorum {
                found: 1,
                required: 2,
                ..
            })
        ),
        "{err}"
    );
    assert!(err.to_string().starts_with("---> Good tag "), "{err}");
    assert!(!m.work.exists(), "unverified checkout left behind");
}

#[test]
fn signed_commit_needs_a_tag_unless_commits_suffice() {
    let Some(m) = Maintainer::new() else { return };
    let head = m.signed_commit("CHANGELOG");

    let err = m.fetcher().run(&m.request()).expect_err("untagged commit");
    assert!(
        matches!(
            err,
            EngineError::Verification(VerificationError::UntaggedSignedCommit(_))
        ),
        "{err}"
    );
    assert!(!m.work.exists(), "unverified checkout left behind");

    let request = FetchRequest {
        less_secure_signed_commits_sufficient: true,
        ..m.request()
    };
    let outcome = m.fetcher().run(&request).expect("signed commit accepted");
    let FetchOutcome::Integrated {
        reference,
        verification: Some(QuorumOutcome::SignedCommit { signer }),
        ..
    } = outcome
    else {
        panic!("expected commit acceptance, got {outcome:?}");
    };
    assert_eq!(reference, head);
    assert_eq!(signer, m.signer());
    assert!(m.work.join("CHANGELOG").is_file(), "working tree populated");
}
