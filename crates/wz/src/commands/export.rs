use std::path::{Path, PathBuf};

use miette::{Context, IntoDiagnostic, Result};
use tracing::info;
use wz_archive::{NodeKind, NodeRef};

use super::{children, resolve, OpenArgs};

pub fn run(open: &OpenArgs, path: &str, output: Option<&Path>) -> Result<()> {
    let archive = open.open()?;
    let node = resolve(&archive, path)?;

    let stem = path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("root");

    match node.kind()? {
        NodeKind::Canvas => {
            let canvas = node.canvas()?.expect("canvas node carries a canvas");
            let target = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(format!("{stem}.png")));
            info!("writing {}", target.display());
            canvas
                .image()?
                .save(&target)
                .into_diagnostic()
                .context(format!("writing {}", target.display()))?;
        }
        NodeKind::Sound => {
            let sound = node.sound()?.expect("sound node carries a sound");
            let pcm = sound.wave_format().format_tag == wz_archive::sound::FORMAT_TAG_PCM;
            let target = output.map(Path::to_path_buf).unwrap_or_else(|| {
                PathBuf::from(format!("{stem}.{}", if pcm { "wav" } else { "mp3" }))
            });
            info!("writing {}", target.display());
            std::fs::write(&target, sound.stream(false)?)
                .into_diagnostic()
                .context(format!("writing {}", target.display()))?;
        }
        _ => {
            let target = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(format!("{stem}.txt")));
            info!("writing {}", target.display());
            let mut text = String::new();
            dump(&node, 0, &mut text)?;
            std::fs::write(&target, text)
                .into_diagnostic()
                .context(format!("writing {}", target.display()))?;
        }
    }

    archive.close()?;
    Ok(())
}

/// Renders a subtree as indented `name: value` lines.
fn dump(node: &NodeRef, level: u32, out: &mut String) -> Result<()> {
    use std::fmt::Write;

    let pairs = children(node)?;
    if pairs.is_empty() && level == 0 {
        writeln!(out, "{node}").into_diagnostic()?;
        return Ok(());
    }
    for (name, child) in pairs {
        // resolve the body first so lazy nodes render their value
        let kind = child.kind()?;
        writeln!(
            out,
            "{:indent$}{name}: {child}",
            "",
            indent = (level * 2) as usize
        )
        .into_diagnostic()?;
        if matches!(
            kind,
            NodeKind::Directory | NodeKind::Property | NodeKind::Convex | NodeKind::Canvas
        ) {
            dump(&child, level + 1, out)?;
        }
    }
    Ok(())
}
