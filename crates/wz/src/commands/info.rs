use miette::Result;
use wz_archive::NodeKind;

use super::{children, resolve, OpenArgs};

pub fn run(open: &OpenArgs, path: &str) -> Result<()> {
    let archive = open.open()?;
    let node = resolve(&archive, path)?;

    let kind = node.kind()?;
    println!("kind:  {kind}");
    println!("value: {node}");

    match kind {
        NodeKind::Canvas => {
            if let Some(canvas) = node.canvas()? {
                let size = canvas.size();
                println!("size:   {}x{}", size.x, size.y);
                println!("format: {}", canvas.format());
            }
        }
        NodeKind::Sound => {
            if let Some(sound) = node.sound()? {
                let format = sound.wave_format();
                println!("duration: {:?}", sound.duration());
                println!(
                    "format:   tag {} / {} ch / {} Hz / {} bit",
                    format.format_tag, format.channels, format.samples_per_sec, format.bits_per_sample
                );
            }
        }
        NodeKind::Directory | NodeKind::Property | NodeKind::Convex => {
            println!("children: {}", children(&node)?.len());
        }
        _ => {}
    }

    archive.close()?;
    Ok(())
}
