use miette::Result;
use wz_archive::{NodeKind, NodeRef};

use super::{children, resolve, OpenArgs};

pub fn run(open: &OpenArgs, path: &str, depth: u32) -> Result<()> {
    let archive = open.open()?;
    let node = resolve(&archive, path)?;
    walk(&node, 0, depth)?;
    archive.close()?;
    Ok(())
}

fn walk(node: &NodeRef, level: u32, max: u32) -> Result<()> {
    if level >= max {
        return Ok(());
    }

    for (name, child) in children(node)? {
        let kind = child.kind()?;
        println!(
            "{:indent$}{name}  [{kind}]",
            "",
            indent = (level * 2) as usize
        );
        if matches!(
            kind,
            NodeKind::Directory | NodeKind::Property | NodeKind::Convex | NodeKind::Canvas
        ) {
            walk(&child, level + 1, max)?;
        }
    }
    Ok(())
}
