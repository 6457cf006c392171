mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use slator_core::{DataTransfer, Editor, LocalFile, PluginRegistry, images};
use slator_media::{
    FileStore, ImageFilesPlugin, ImageUploads, ImageValidator, RetryPolicy, UploadCache,
    UploadConfig, UploadError, UploadPhase, UploadResponse,
};

const DEMO_SCRIPT: &str = "Type **bold**, __italic__, `code` and ~~strike~~ as you go.\n\
- bullets\n\
\n\
1. numbers\n\
\n\
[]- a task\n\
> quoted [link](https://example.com \"Example\")\n\
--- ![a lake](https://example.com/lake.png)";

#[derive(Parser)]
#[command(version, about = "Replays keystrokes through the editor and prints the document", long_about = None)]
struct Cli {
    /// File whose text is typed into an empty document. A built-in demo runs
    /// when neither a file nor --text is given.
    script: Option<PathBuf>,

    /// Text to type instead of a script file.
    #[arg(long, conflicts_with = "script")]
    text: Option<String>,

    /// Image file pasted after typing. Repeatable.
    #[arg(long = "image")]
    images: Vec<PathBuf>,

    /// Largest accepted image, in bytes.
    #[arg(long)]
    max_size: Option<u64>,

    /// The fake uploader rejects its first call.
    #[arg(long)]
    fail_first: bool,

    /// Retry failed uploads automatically this many times instead of once by hand.
    #[arg(long)]
    auto_retry: Option<u32>,

    /// Pretty-print the document JSON.
    #[arg(long)]
    pretty: bool,

    /// Debug logs from the editor and the upload pipeline.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn script(&self) -> anyhow::Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        match &self.script {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script {}", path.display())),
            None => Ok(DEMO_SCRIPT.to_string()),
        }
    }

    fn local_files(&self) -> anyhow::Result<Vec<LocalFile>> {
        let mut files = Vec::with_capacity(self.images.len());
        for path in &self.images {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(LocalFile::new(name, "", bytes));
        }
        Ok(files)
    }

    fn upload_config(&self) -> UploadConfig {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail_first = self.fail_first;
        let config = UploadConfig::new(move |file: LocalFile| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if fail_first && call == 1 {
                    return Err(UploadError::uploader("storage unavailable"));
                }
                Ok::<_, UploadError>(UploadResponse::new(format!(
                    "memory://uploads/{call}/{}",
                    file.name
                )))
            }
        })
        .on_success(|id, response| tracing::info!(id, url = %response.url, "uploaded"))
        .on_error(|id, err| tracing::warn!(id, %err, "upload failed"));

        match self.auto_retry {
            Some(max_retries) => config.retry_policy(RetryPolicy::Automatic {
                max_retries,
                delay: Duration::from_millis(50),
            }),
            None => config,
        }
    }

    fn validator(&self) -> ImageValidator {
        let validator = ImageValidator::default()
            .on_reject(|file, err| tracing::warn!(file = %file.name, %err, "image rejected"));
        match self.max_size {
            Some(max) => validator.max_size(max),
            None => validator,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let script = cli.script()?;
    let files = cli.local_files()?;

    let store = FileStore::default();
    let mut registry = PluginRegistry::richtext();
    registry.register_plugin(Box::new(ImageFilesPlugin::new(cli.validator(), store.clone())))?;
    let mut editor = Editor::empty(registry);

    editor.type_text(&script)?;
    tracing::info!(chars = script.chars().count(), "script typed");

    if !files.is_empty() {
        editor.insert_data(&DataTransfer::files(files))?;
    }

    let mut uploads = ImageUploads::new(cli.upload_config(), store, UploadCache::default());
    uploads.observe(&mut editor)?;
    uploads.settle(&mut editor).await?;

    let failed: Vec<String> = images(editor.doc())
        .into_iter()
        .map(|(_, attrs)| attrs.id)
        .filter(|id| uploads.status(id).is_some_and(|s| s.phase == UploadPhase::Failed))
        .collect();
    for id in &failed {
        uploads.retry(&editor, id)?;
    }
    uploads.settle(&mut editor).await?;

    for (_, attrs) in images(editor.doc()) {
        let phase = uploads.status(&attrs.id).map(|s| s.phase);
        tracing::info!(id = %attrs.id, url = ?attrs.url, ?phase, "image");
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(editor.doc())?
    } else {
        serde_json::to_string(editor.doc())?
    };
    println!("{json}");
    Ok(())
}
