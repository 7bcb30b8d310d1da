#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const STATIC_FILE: &str = "editor.html";
pub const STATIC_CONTENT: &str = "<html><body>bespin editor</body></html>";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub static_dir: PathBuf,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let static_dir = std::env::temp_dir().join(format!("bespin-it-{}", port));
        std::fs::create_dir_all(&static_dir).context("failed to create static dir")?;
        std::fs::write(static_dir.join(STATIC_FILE), STATIC_CONTENT)
            .context("failed to write static file")?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bespin-api-rust"));
        cmd.arg("serve")
            .env("BESPIN_PORT", port.to_string())
            .env("BESPIN_STATIC_DIR", &static_dir)
            .env("APP_ENV", "development")
            .env("AUTH_PROVIDER", "none")
            .env("BESPIN_INIT_FILESYSTEM", "/srv/bespin")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            static_dir,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Client that keeps the session cookie between requests, like a browser
pub fn browser() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}
