// Integration test utilities and fixture management for Linguist.

use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::get;
use linguist_core::config::{CatalogEntityConfig, LinguistConfig};
use linguist_core::types::SourceLocation;
use linguist_http::AppState;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test fixture with a temporary git repository.
#[derive(Debug)]
pub struct TestRepo {
    pub dir: tempfile::TempDir,
}

impl TestRepo {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location pointing at the working copy.
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.path().to_string_lossy())
    }

    /// An empty repository with an identity configured.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let root = dir.path();
        git(root, &["init", "--initial-branch=main"]);
        git(root, &["config", "user.email", "test@linguist.dev"]);
        git(root, &["config", "user.name", "Test"]);
        git(root, &["config", "commit.gpgsign", "false"]);
        Self { dir }
    }

    /// Ten 100-byte Go files and five 50-byte Markdown files, committed.
    pub fn go_service() -> Self {
        let repo = Self::empty();
        for i in 0..10 {
            repo.write(&format!("pkg/handler_{i}.go"), &sized("// go\n", 100));
        }
        for i in 0..5 {
            repo.write(&format!("docs/page_{i}.md"), &sized("# doc\n", 50));
        }
        repo.commit("Initial service");
        repo
    }

    /// Rust, Python and TypeScript sources across two commits.
    pub fn multi_lang() -> Self {
        let repo = Self::empty();
        repo.write("rust-svc/src/main.rs", "fn main() {\n    println!(\"rust service\");\n}\n");
        repo.write("rust-svc/Cargo.toml", "[package]\nname = \"rust-svc\"\nversion = \"0.1.0\"\n");
        repo.write("py-lib/util.py", "def greet(name):\n    return f\"hello {name}\"\n");
        repo.commit("Rust and Python");
        repo.write(
            "web/src/app.ts",
            "export function render(): string {\n  return \"<main/>\";\n}\n",
        );
        repo.write("web/package.json", "{\"name\": \"web\"}\n");
        repo.commit("Add web app");
        repo
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, content).expect("write fixture file");
    }

    pub fn commit(&self, message: &str) {
        git(self.path(), &["add", "--all"]);
        git(self.path(), &["commit", "--quiet", "-m", message]);
    }

    pub fn tag(&self, name: &str) {
        git(self.path(), &["tag", name]);
    }
}

/// Content of exactly `len` bytes, starting with `prefix`.
pub fn sized(prefix: &str, len: usize) -> String {
    let mut content = prefix.to_string();
    content.truncate(len);
    while content.len() < len.saturating_sub(1) {
        content.push('x');
    }
    if content.len() < len {
        content.push('\n');
    }
    content
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Config tracking the given `(entity_ref, directory)` pairs by source location.
pub fn config_for(entities: &[(&str, &Path)]) -> LinguistConfig {
    let mut config = LinguistConfig {
        use_source_location: true,
        ..LinguistConfig::default()
    };
    config.catalog.entities = entities
        .iter()
        .map(|(entity_ref, dir)| CatalogEntityConfig {
            entity_ref: (*entity_ref).to_string(),
            kind: "Component".into(),
            source_location: Some(dir.to_string_lossy().into_owned()),
            linguist_location: None,
            reference: None,
        })
        .collect();
    config
}

/// A running HTTP API bound to an ephemeral port.
#[derive(Debug)]
pub struct RunningApi {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningApi {
    pub async fn start(facade: Arc<linguist_core::query::QueryFacade>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(linguist_http::serve(
            listener,
            AppState::new(facade),
            async move {
                let _ = rx.await;
            },
        ));
        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Trigger graceful shutdown and wait for the server to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle
            .await
            .expect("server task")
            .expect("server exited cleanly");
    }
}

/// Serve a fixed catalog `/entities` response on an ephemeral port and
/// return its base URL.
pub async fn spawn_catalog(entities: serde_json::Value) -> String {
    let app = Router::new().route(
        "/entities",
        get(move || {
            let entities = entities.clone();
            async move { Json(entities) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_content_has_exact_length() {
        assert_eq!(sized("// go\n", 100).len(), 100);
        assert_eq!(sized("# doc\n", 50).len(), 50);
        assert_eq!(sized("abcdef", 3), "abc");
    }
}
