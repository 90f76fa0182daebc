use std::ops::ControlFlow;
use std::path::PathBuf;

use clap::Args;
use miette::{miette, Result};
use wz_archive::{Archive, Iv, NodeRef, OpenOptions};

pub mod export;
pub mod info;
pub mod list;

/// Arguments every subcommand needs to mount an archive.
#[derive(Args)]
pub struct OpenArgs {
    /// Folder containing Base.wz or Base/, or a single .wz file
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Declared client version of the archive
    #[arg(short = 'c', long = "client-version", value_name = "VERSION")]
    pub version: i32,

    /// Keystream IV: gms, ems, none, or 8 hex digits
    #[arg(long, default_value = "none")]
    pub iv: String,
}

impl OpenArgs {
    pub fn open(&self) -> Result<Archive> {
        let iv = Iv::parse(&self.iv)?;
        let options = OpenOptions::builder().version(self.version).iv(iv).build();
        if self.archive.is_file() {
            Ok(Archive::open_file(&self.archive, options)?)
        } else {
            Ok(Archive::open(&self.archive, options)?)
        }
    }
}

/// Resolves `path` or fails with a user-facing diagnostic.
pub fn resolve(archive: &Archive, path: &str) -> Result<NodeRef> {
    archive
        .get(path)?
        .ok_or_else(|| miette!("no node at {path:?}"))
}

/// Children of a container as owned pairs, in stored order.
pub fn children(node: &NodeRef) -> Result<Vec<(String, NodeRef)>> {
    let mut pairs = Vec::new();
    node.each(|name, child| {
        pairs.push((name.to_string(), child.clone()));
        ControlFlow::Continue(())
    })?;
    Ok(pairs)
}
