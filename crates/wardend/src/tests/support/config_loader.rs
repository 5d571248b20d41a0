//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::OrthoError;
use tempfile::TempDir;
use warden_config::{Config, EncryptionMode};

use crate::bootstrap::ConfigLoader;

/// Admin secret configured by [`TestConfigLoader`].
pub const ADMIN_PASSWORD: &str = "letmein";

/// Loader serving a loopback configuration rooted in a temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    dir: Arc<TempDir>,
    config: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temporary directory");
        let config = Config {
            listen_host: Some(Ipv4Addr::LOCALHOST.to_string()),
            plain_port: free_port(),
            encryption: Some(EncryptionMode::Off),
            admin_password: Some(ADMIN_PASSWORD.to_owned()),
            runtime_dir: Some(utf8(dir.path().join("run"))),
            work_dir: Some(utf8(dir.path().to_path_buf())),
            worker_binary: Some(utf8(dir.path().join("wardenrun"))),
            new_connection_delay_ms: 0,
            ..Config::default()
        };
        Self {
            dir: Arc::new(dir),
            config,
        }
    }

    /// Applies `edit` to the configuration served by this loader.
    #[must_use]
    pub fn configure(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.dir.path().join("run")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loader that fails by passing an unparsable port on the command line.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("wardend"),
            OsString::from("--plain-port"),
            OsString::from("not-a-port"),
        ])
    }
}

/// Reserves an unused loopback port.
#[must_use]
fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port")
        .port()
}

fn utf8(path: PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).expect("temporary path should be UTF-8")
}
