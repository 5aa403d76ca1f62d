//! `pxc iso`: list, download, upload and delete installation images.

use std::path::Path;

use console::style;

use crate::backend::{Backend, IsoFile, StorageContent, TransferProgress, filename_from_url};
use crate::error::PxcError;
use crate::progress::{OutputMode, StepProgress};
use crate::settings::SettingsStore;
use crate::topology;
use crate::util::format_bytes;

/// Sort the way `iso list` numbers them, so `iso delete <n>` agrees.
pub fn sort_isos(mut isos: Vec<IsoFile>) -> Vec<IsoFile> {
    isos.sort_by(|a, b| a.filename.cmp(&b.filename).then_with(|| a.volid.cmp(&b.volid)));
    isos
}

/// Look up by 1-based index, then exact filename, exact volume id, or
/// case-insensitive filename.
pub fn find_iso<'a>(sorted: &'a [IsoFile], query: &str) -> Option<&'a IsoFile> {
    let query = query.trim();
    if let Ok(index) = query.parse::<usize>()
        && (1..=sorted.len()).contains(&index)
    {
        return sorted.get(index - 1);
    }
    sorted.iter().find(|i| {
        i.filename == query || i.volid == query || i.filename.eq_ignore_ascii_case(query)
    })
}

pub fn render_list(sorted: &[IsoFile]) -> String {
    if sorted.is_empty() {
        return "No ISOs found\n".into();
    }

    let name_width = sorted
        .iter()
        .map(|i| i.filename.len())
        .max()
        .unwrap_or(0)
        .max(30);
    let storage_width = sorted
        .iter()
        .map(|i| i.storage.len())
        .max()
        .unwrap_or(0)
        .max(10);

    let mut out = format!(
        "{:<4}{:<name_width$}  {:<storage_width$}  SIZE\n",
        "#", "NAME", "STORAGE"
    );
    for (n, iso) in sorted.iter().enumerate() {
        out.push_str(&format!(
            "{:<4}{:<name_width$}  {:<storage_width$}  {}\n",
            n + 1,
            iso.filename,
            iso.storage,
            format_bytes(iso.size)
        ));
    }
    let plural = if sorted.len() == 1 { "" } else { "s" };
    out.push_str(&format!(
        "\n{} ISO{plural} - delete by # or name\n",
        sorted.len()
    ));
    out
}

pub async fn list<B: Backend>(backend: &B) -> Result<(), PxcError> {
    let isos = sort_isos(backend.list_isos().await?);
    print!("{}", render_list(&isos));
    Ok(())
}

/// Where a transfer lands: explicit flag, then the saved default, then the
/// first ISO storage on the preferred node (remembered when preferences
/// are on).
async fn target_storage<B: Backend>(
    backend: &B,
    store: &SettingsStore,
    node: &str,
    flag: Option<String>,
) -> Result<String, PxcError> {
    if let Some(storage) = flag {
        return Ok(storage);
    }
    if let Some(saved) = store.load().defaults.fields.iso_storage {
        return Ok(saved);
    }

    let first = backend
        .storages(node, StorageContent::Iso)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PxcError::backend("No ISO-capable storage found"))?;

    if store.save_preferences() {
        store.set_default("iso_storage", &first.name)?;
        println!(
            "{} Saved {} as default ISO storage",
            style("i").cyan(),
            first.name
        );
    }
    Ok(first.name)
}

pub async fn download<B: Backend>(
    backend: &B,
    store: &SettingsStore,
    url: &str,
    storage: Option<String>,
    name: Option<String>,
) -> Result<(), PxcError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(PxcError::Validation {
            message: format!("URL must start with http:// or https://: {url}"),
        });
    }

    let node = topology::preferred_node(backend).await;
    let storage = target_storage(backend, store, &node, storage).await?;
    let filename = name.unwrap_or_else(|| filename_from_url(url));
    tracing::info!(url, %storage, %filename, %node, "downloading ISO");

    let mut progress = StepProgress::new(1, OutputMode::detect());
    let volid = progress
        .run(&format!("Downloading {filename} to {storage}"), |step| async move {
            let mut bar = step.transfer();
            let mut on_progress = |p: TransferProgress| bar.update(&p);
            let result = backend
                .download_iso(&node, &storage, url, &filename, &mut on_progress)
                .await;
            drop(on_progress);
            bar.finish();
            let volid = result?;
            step.set_done_label(format!("Downloaded {filename}"));
            Ok::<_, PxcError>(volid)
        })
        .await?;

    println!("  Volume ID: {volid}");
    Ok(())
}

pub async fn upload<B: Backend>(
    backend: &B,
    store: &SettingsStore,
    file: &Path,
    storage: Option<String>,
) -> Result<(), PxcError> {
    if !file.is_file() {
        return Err(PxcError::Validation {
            message: format!("file not found: {}", file.display()),
        });
    }

    let node = topology::preferred_node(backend).await;
    let storage = target_storage(backend, store, &node, storage).await?;
    let display = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    tracing::info!(file = %file.display(), %storage, %node, "uploading ISO");

    let mut progress = StepProgress::new(1, OutputMode::detect());
    let volid = progress
        .run(&format!("Uploading {display} to {storage}"), |step| async move {
            let volid = backend.upload_iso(&node, &storage, file).await?;
            step.set_done_label(format!("Uploaded {display}"));
            Ok::<_, PxcError>(volid)
        })
        .await?;

    println!("  Volume ID: {volid}");
    Ok(())
}

pub async fn delete<B: Backend>(backend: &B, query: &str) -> Result<(), PxcError> {
    let isos = sort_isos(backend.list_isos().await?);
    let Some(iso) = find_iso(&isos, query) else {
        println!("{} ISO not found: {query}", style("\u{2717}").red());
        return Ok(());
    };
    tracing::info!(volid = %iso.volid, "deleting ISO");

    let mut progress = StepProgress::new(1, OutputMode::detect());
    progress
        .run(&format!("Deleting {}", iso.volid), |step| async move {
            backend.delete_iso(&iso.volid).await?;
            step.set_done_label(format!("Deleted {}", iso.volid));
            Ok::<_, PxcError>(())
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::backend::simulated::Call;
    use crate::settings::tests::temp_store;

    async fn sorted() -> Vec<IsoFile> {
        sort_isos(SimulatedBackend::new().list_isos().await.unwrap())
    }

    #[tokio::test]
    async fn sorted_by_filename() {
        let names: Vec<String> = sorted().await.into_iter().map(|i| i.filename).collect();
        assert_eq!(
            names,
            ["alpine-3.18.iso", "debian-12.iso", "ubuntu-24.04.iso"]
        );
    }

    #[tokio::test]
    async fn lookup_by_index_name_volid() {
        let isos = sorted().await;
        assert_eq!(find_iso(&isos, "1").unwrap().filename, "alpine-3.18.iso");
        assert_eq!(find_iso(&isos, "3").unwrap().filename, "ubuntu-24.04.iso");
        assert_eq!(find_iso(&isos, "debian-12.iso").unwrap().storage, "local");
        assert_eq!(
            find_iso(&isos, "cephfs-iso:iso/ubuntu-24.04.iso")
                .unwrap()
                .filename,
            "ubuntu-24.04.iso"
        );
        assert_eq!(
            find_iso(&isos, "DEBIAN-12.ISO").unwrap().filename,
            "debian-12.iso"
        );
        assert!(find_iso(&isos, "0").is_none());
        assert!(find_iso(&isos, "4").is_none());
        assert!(find_iso(&isos, "missing.iso").is_none());
    }

    #[tokio::test]
    async fn list_is_numbered_from_one() {
        let text = render_list(&sorted().await);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("#"));
        assert!(lines[1].starts_with("1   alpine-3.18.iso"));
        assert!(text.contains("3 ISOs - delete by # or name"));
        assert_eq!(render_list(&[]), "No ISOs found\n");
    }

    #[tokio::test]
    async fn download_saves_first_storage_once() {
        let (_dir, store) = temp_store();
        let backend = SimulatedBackend::new();

        download(
            &backend,
            &store,
            "https://example.com/isos/netinst.iso",
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            store.get_default("iso_storage").unwrap().as_deref(),
            Some("local")
        );

        store.set_default("iso_storage", "nfs-iso").unwrap();
        download(
            &backend,
            &store,
            "https://example.com/isos/other.iso",
            None,
            Some("renamed.iso".into()),
        )
        .await
        .unwrap();

        let calls = backend.calls();
        assert_eq!(
            calls,
            vec![
                Call::DownloadIso {
                    storage: "local".into(),
                    url: "https://example.com/isos/netinst.iso".into(),
                    filename: "netinst.iso".into(),
                },
                Call::DownloadIso {
                    storage: "nfs-iso".into(),
                    url: "https://example.com/isos/other.iso".into(),
                    filename: "renamed.iso".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn download_rejects_non_http() {
        let (_dir, store) = temp_store();
        let backend = SimulatedBackend::new();
        let err = download(&backend, &store, "ftp://x/y.iso", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PxcError::Validation { .. }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_by_index() {
        let backend = SimulatedBackend::new();
        delete(&backend, "2").await.unwrap();
        delete(&backend, "nope.iso").await.unwrap();
        assert_eq!(
            backend.calls(),
            vec![Call::DeleteIso("local:iso/debian-12.iso".into())]
        );
    }
}
