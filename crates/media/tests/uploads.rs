use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use slator_core::{Editor, ImageAttrs, LocalFile, Node, find_image, images};
use slator_media::{
    FileStore, ImageUploads, ImageValidator, RetryPolicy, UploadCache, UploadConfig, UploadError,
    UploadPhase, UploadResponse, insert_image_files,
};

const URL: &str = "https://cdn.test/x.png";

fn png(name: &str) -> LocalFile {
    LocalFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

/// Uploader that fails the calls listed in `fail_on` (1-based) and counts
/// every call.
fn scripted_uploader(calls: Arc<AtomicUsize>, fail_on: &'static [usize]) -> UploadConfig {
    UploadConfig::new(move |_file: LocalFile| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if fail_on.contains(&call) {
                Err(UploadError::uploader(format!("attempt {call} refused")))
            } else {
                Ok::<_, UploadError>(UploadResponse::new(URL))
            }
        }
    })
}

fn image(editor: &Editor, id: &str) -> anyhow::Result<ImageAttrs> {
    images(editor.doc())
        .into_iter()
        .find(|(_, attrs)| attrs.id == id)
        .map(|(_, attrs)| attrs)
        .context("image not in document")
}

fn insert_one(editor: &mut Editor, store: &FileStore) -> anyhow::Result<String> {
    let ids = insert_image_files(editor, &[png("x.png")], &ImageValidator::default(), store)?;
    ids.into_iter().next().context("no image inserted")
}

#[tokio::test]
async fn image_redone_mid_upload_reuses_the_cached_url() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = FileStore::default();
    let cache = UploadCache::default();
    let mut uploads = ImageUploads::new(scripted_uploader(calls.clone(), &[]), store.clone(), cache.clone());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    assert_eq!(uploads.in_flight(), 1);

    // Undo while the upload runs takes the image out and tears down its entry.
    assert!(editor.undo());
    assert!(images(editor.doc()).is_empty());
    uploads.observe(&mut editor)?;
    assert!(uploads.status(&id).is_none());
    uploads.settle(&mut editor).await?;
    assert_eq!(cache.get(&id).as_deref(), Some(URL));
    assert!(images(editor.doc()).is_empty());

    // Redo brings back the node as it was, still pointing at its local file.
    assert!(editor.redo());
    assert!(image(&editor, &id)?.file.is_some());
    uploads.observe(&mut editor)?;
    uploads.settle(&mut editor).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let attrs = image(&editor, &id)?;
    assert_eq!(attrs.url.as_deref(), Some(URL));
    assert_eq!(attrs.file, None);
    assert_eq!(uploads.status(&id).map(|s| s.phase), Some(UploadPhase::Uploaded));

    // The url merge is not an undo step: one undo removes the image again.
    assert!(!editor.can_redo());
    assert!(editor.undo());
    assert!(images(editor.doc()).is_empty());
    assert!(!editor.can_undo());
    Ok(())
}

#[tokio::test]
async fn failed_upload_keeps_the_file_until_a_manual_retry() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::<String>::new()));
    let successes = Arc::new(AtomicUsize::new(0));
    let store = FileStore::default();

    let config = {
        let errors = errors.clone();
        let successes = successes.clone();
        scripted_uploader(calls.clone(), &[1])
            .on_error(move |id, err| errors.lock().push(format!("{id}: {err}")))
            .on_success(move |_, _| {
                successes.fetch_add(1, Ordering::SeqCst);
            })
    };
    let mut uploads = ImageUploads::new(config, store.clone(), UploadCache::default());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    editor.insert_text("hi")?;
    uploads.settle(&mut editor).await?;

    let attrs = image(&editor, &id)?;
    assert!(attrs.file.is_some());
    assert_eq!(attrs.url, None);
    let status = uploads.status(&id).context("status")?;
    assert_eq!(status.phase, UploadPhase::Failed);
    assert!(status.can_retry());
    assert_eq!(errors.lock().len(), 1);

    // A failed image stays failed until asked.
    uploads.observe(&mut editor)?;
    assert_eq!(uploads.in_flight(), 0);

    uploads.retry(&editor, &id)?;
    uploads.settle(&mut editor).await?;

    let attrs = image(&editor, &id)?;
    assert_eq!(attrs.url.as_deref(), Some(URL));
    assert_eq!(attrs.file, None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    // Undo reverts the typing, not the url merge.
    assert!(editor.undo());
    assert_eq!(image(&editor, &id)?.url.as_deref(), Some(URL));
    assert_eq!(editor.doc().children[1], Node::paragraph(""));
    Ok(())
}

#[tokio::test]
async fn unmounted_image_is_not_patched() -> anyhow::Result<()> {
    let successes = Arc::new(AtomicUsize::new(0));
    let store = FileStore::default();
    let cache = UploadCache::default();
    let config = {
        let successes = successes.clone();
        UploadConfig::new(|_file: LocalFile| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, UploadError>(UploadResponse::new(URL))
        })
        .on_success(move |_, _| {
            successes.fetch_add(1, Ordering::SeqCst);
        })
    };
    let mut uploads = ImageUploads::new(config, store.clone(), cache.clone());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    assert!(uploads.preview_url(&id).is_some_and(|url| url.starts_with("data:image/png;base64,")));
    uploads.unmount(&id);
    uploads.settle(&mut editor).await?;

    let attrs = image(&editor, &id)?;
    assert!(attrs.file.is_some());
    assert_eq!(attrs.url, None);
    assert!(uploads.status(&id).is_none());
    // The result still lands in the cache and the bytes are released.
    assert_eq!(cache.get(&id).as_deref(), Some(URL));
    assert!(store.is_empty());
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn result_for_a_deleted_image_is_dropped_quietly() -> anyhow::Result<()> {
    let store = FileStore::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut uploads = ImageUploads::new(scripted_uploader(calls, &[]), store.clone(), UploadCache::default());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    // The cursor sits right after the image; backspace removes it.
    editor.delete_backward()?;
    assert!(find_image(editor.doc(), &id).is_none());

    uploads.settle(&mut editor).await?;
    assert!(find_image(editor.doc(), &id).is_none());
    Ok(())
}

#[tokio::test]
async fn automatic_policy_retries_inside_one_task() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = FileStore::default();
    let config = scripted_uploader(calls.clone(), &[1, 2]).retry_policy(RetryPolicy::Automatic {
        max_retries: 2,
        delay: Duration::from_millis(1),
    });
    let mut uploads = ImageUploads::new(config, store.clone(), UploadCache::default());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    let event = uploads.next_event().await.context("upload event")?;
    assert_eq!(event.attempts, 3);
    uploads.apply_event(&mut editor, event)?;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(image(&editor, &id)?.url.as_deref(), Some(URL));
    Ok(())
}

#[tokio::test]
async fn automatic_policy_gives_up_after_max_retries() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = FileStore::default();
    let config = scripted_uploader(calls.clone(), &[1, 2, 3]).retry_policy(RetryPolicy::Automatic {
        max_retries: 1,
        delay: Duration::from_millis(1),
    });
    let mut uploads = ImageUploads::new(config, store.clone(), UploadCache::default());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    uploads.settle(&mut editor).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(uploads.status(&id).map(|s| s.phase), Some(UploadPhase::Failed));
    Ok(())
}

#[tokio::test]
async fn retry_is_refused_unless_failed() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = FileStore::default();
    let mut uploads = ImageUploads::new(scripted_uploader(calls, &[]), store.clone(), UploadCache::default());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    assert_eq!(uploads.retry(&editor, &id), Err(UploadError::InFlight(id.clone())));

    uploads.settle(&mut editor).await?;
    assert_eq!(
        uploads.retry(&editor, &id),
        Err(UploadError::NotRetryable {
            id: id.clone(),
            phase: UploadPhase::Uploaded,
        })
    );
    assert_eq!(
        uploads.retry(&editor, "missing"),
        Err(UploadError::UnknownImage("missing".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn dimensions_stay_out_of_history_and_captions_do_not() -> anyhow::Result<()> {
    let store = FileStore::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut uploads = ImageUploads::new(scripted_uploader(calls, &[]), store.clone(), UploadCache::default());
    let mut editor = Editor::with_richtext_plugins();

    let id = insert_one(&mut editor, &store)?;
    uploads.observe(&mut editor)?;
    uploads.settle(&mut editor).await?;

    assert!(uploads.report_dimensions(&mut editor, &id, 640, 480)?);
    assert!(!uploads.report_dimensions(&mut editor, &id, 1, 1)?);
    let attrs = image(&editor, &id)?;
    assert_eq!((attrs.width, attrs.height), (Some(640), Some(480)));

    assert!(uploads.set_caption(&mut editor, &id, "A lake")?);
    assert_eq!(image(&editor, &id)?.alt, "A lake");

    assert!(editor.undo());
    let attrs = image(&editor, &id)?;
    assert_eq!(attrs.alt, "");
    assert_eq!(attrs.width, Some(640));
    assert_eq!(attrs.url.as_deref(), Some(URL));
    Ok(())
}
