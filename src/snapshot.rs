//! Snapshot files on disk
//!
//! A snapshot is written under a provisional `<id>.tmp` name while its pages
//! arrive and renamed to `<id>` only once the whole fetch succeeded. A reader
//! listing the output directory therefore never sees a partial snapshot under
//! its final name.

use crate::error::{Error, Result};
use crate::esi::{PageSink, SnapshotPage};
use crate::types::{MarketOrder, OrderbookInfo, SnapshotId};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// First line of every snapshot file
pub const CSV_HEADER: &str = "ORDERID,TYPEID,SYSTEMID,LOCATIONID,PRICE,RANGE,ISBUY,ISSUED,DURATION,MINVOLUME,VOLUMEREMAIN,VOLUMETOTAL";

/// Suffix of a snapshot that is still being written
pub const PROVISIONAL_SUFFIX: &str = ".tmp";

/// Path of a finalized snapshot
pub fn snapshot_path(dir: &Path, id: &SnapshotId) -> PathBuf {
    dir.join(id.as_str())
}

fn provisional_path(dir: &Path, id: &SnapshotId) -> PathBuf {
    dir.join(format!("{}{}", id.as_str(), PROVISIONAL_SUFFIX))
}

/// Append one order as a CSV row
fn write_row(out: &mut String, order: &MarketOrder) {
    // Writing into a String cannot fail
    let _ = writeln!(
        out,
        "{},{},{},{},{:.2},{},{},{},{},{},{},{}",
        order.order_id,
        order.type_id,
        order.system_id,
        order.location_id,
        order.price,
        order.range,
        order.is_buy_order,
        order.issued.timestamp(),
        order.duration,
        order.min_volume,
        order.volume_remain,
        order.volume_total,
    );
}

struct OpenSnapshot {
    id: SnapshotId,
    path: PathBuf,
    writer: BufWriter<File>,
    info: OrderbookInfo,
}

/// Page sink that streams a snapshot into its provisional file
///
/// The file is created when page 1 arrives. Call [`SnapshotWriter::finish`]
/// after a successful fetch or [`SnapshotWriter::discard`] otherwise.
pub struct SnapshotWriter {
    dir: PathBuf,
    location_name: String,
    open: Option<OpenSnapshot>,
}

impl SnapshotWriter {
    /// Writer for one fetch cycle of a location
    pub fn new(dir: impl Into<PathBuf>, location_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            location_name: location_name.into(),
            open: None,
        }
    }

    /// Provisional path of the snapshot being written, if any
    pub fn provisional(&self) -> Option<&Path> {
        self.open.as_ref().map(|s| s.path.as_path())
    }

    async fn open(&mut self, page: &SnapshotPage) -> Result<&mut OpenSnapshot> {
        if let Some(snapshot) = self.open.take() {
            return Ok(self.open.insert(snapshot));
        }

        let id = SnapshotId::for_location(page.location.id, page.expiry);
        let path = provisional_path(&self.dir, &id);

        let file = File::create(&path)
            .await
            .map_err(|e| Error::storage(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(format!("{CSV_HEADER}\n").as_bytes())
            .await
            .map_err(|e| Error::storage(&path, e))?;

        debug!(path = %path.display(), "Opened provisional snapshot");

        Ok(self.open.insert(OpenSnapshot {
            id,
            path,
            writer,
            info: OrderbookInfo::new(page.location, self.location_name.clone(), page.expiry),
        }))
    }

    /// Flush and rename the snapshot to its final name
    pub async fn finish(self) -> Result<(SnapshotId, OrderbookInfo)> {
        let Some(mut snapshot) = self.open else {
            return Err(Error::storage(
                &self.dir,
                std::io::Error::other("snapshot received no pages"),
            ));
        };

        let flushed = snapshot.writer.flush().await;
        drop(snapshot.writer);
        if let Err(e) = flushed {
            remove_provisional(&snapshot.path).await;
            return Err(Error::storage(&snapshot.path, e));
        }

        let final_path = snapshot_path(&self.dir, &snapshot.id);
        if let Err(e) = tokio::fs::rename(&snapshot.path, &final_path).await {
            remove_provisional(&snapshot.path).await;
            return Err(Error::storage(&final_path, e));
        }

        info!(
            snapshot = %snapshot.id,
            orders = snapshot.info.order_count,
            "Snapshot written"
        );
        Ok((snapshot.id, snapshot.info))
    }

    /// Drop the provisional file of an aborted fetch
    pub async fn discard(self) {
        if let Some(snapshot) = self.open {
            drop(snapshot.writer);
            remove_provisional(&snapshot.path).await;
        }
    }
}

#[async_trait]
impl PageSink for SnapshotWriter {
    async fn accept(&mut self, page: SnapshotPage) -> Result<()> {
        let snapshot = self.open(&page).await?;

        let mut rows = String::with_capacity(page.orders.len() * 96);
        for order in &page.orders {
            write_row(&mut rows, order);
            snapshot.info.add(order);
        }

        snapshot
            .writer
            .write_all(rows.as_bytes())
            .await
            .map_err(|e| Error::storage(&snapshot.path, e))
    }
}

async fn remove_provisional(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed provisional snapshot"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove provisional snapshot"),
    }
}

/// Create the output directory and delete provisional files left by a previous run
///
/// Returns the number of files removed.
pub async fn prepare_output_dir(dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::storage(dir, e))?;

    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::storage(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::storage(dir, e))?
    {
        let path = entry.path();
        let provisional = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PROVISIONAL_SUFFIX));

        if provisional && entry.file_type().await.is_ok_and(|t| t.is_file()) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Error::storage(&path, e))?;
            removed += 1;
        }
    }

    if removed > 0 {
        info!(removed, dir = %dir.display(), "Removed stale provisional snapshots");
    }
    Ok(removed)
}
