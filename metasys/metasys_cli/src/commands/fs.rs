//! File commands: `cat`, `write`, `ls` and `stat`.

use super::write_fully;
use anyhow::{Context, Result};
use clap::Args;
use metasys_core::Readable;
use metasys_fs::{Directory, FileKind, OpenFlags, ReadableFile, Stat, WritableFile};
use metasys_io::stdout;
use std::path::PathBuf;

/// Arguments for the cat command
#[derive(Args)]
pub struct CatArgs {
    /// Files to copy to standard output, in order
    #[clap(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Arguments for the write command
#[derive(Args)]
pub struct WriteArgs {
    /// File to create or overwrite
    pub path: PathBuf,

    /// Text to write; no newline is added
    pub text: String,

    /// Fail if the file already exists
    #[clap(long, conflicts_with = "append")]
    pub exclusive: bool,

    /// Append instead of truncating
    #[clap(long)]
    pub append: bool,

    /// Permission bits for a created file, in octal
    #[clap(long, default_value = "644", value_parser = parse_mode)]
    pub mode: u32,
}

/// Arguments for the ls command
#[derive(Args)]
pub struct LsArgs {
    /// Directory to list
    #[clap(default_value = ".")]
    pub path: PathBuf,

    /// Include the `.` and `..` entries
    #[clap(short, long)]
    pub all: bool,
}

/// Arguments for the stat command
#[derive(Args)]
pub struct StatArgs {
    /// File to describe
    pub path: PathBuf,

    /// Describe a symlink itself rather than its target
    #[clap(long)]
    pub no_follow: bool,
}

fn parse_mode(text: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(text, 8).map_err(|e| format!("invalid octal mode '{}': {}", text, e))
}

fn kind_name(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Regular => "regular",
        FileKind::Directory => "directory",
        FileKind::Symlink => "symlink",
        FileKind::Fifo => "fifo",
        FileKind::Socket => "socket",
        FileKind::CharDevice => "char-device",
        FileKind::BlockDevice => "block-device",
        FileKind::Unknown => "unknown",
    }
}

/// Implementation of the cat command
pub fn execute_cat(args: &CatArgs, buffer_size: usize) -> Result<()> {
    let out = stdout();
    let mut buf = vec![0u8; buffer_size];
    for path in &args.paths {
        let file = ReadableFile::open_init(path, OpenFlags::CLOEXEC)
            .with_context(|| format!("opening {}", path.display()))?;
        loop {
            let count = file
                .read(&mut buf)
                .with_context(|| format!("reading {}", path.display()))?;
            if count == 0 {
                break;
            }
            write_fully(&out, &buf[..count]).context("writing standard output")?;
        }
    }
    Ok(())
}

/// Implementation of the write command
pub fn execute_write(args: &WriteArgs) -> Result<()> {
    let mut flags = OpenFlags::CLOEXEC;
    if args.exclusive {
        flags |= OpenFlags::EXCL;
    }
    if args.append {
        flags |= OpenFlags::APPEND;
    } else {
        flags |= OpenFlags::TRUNC;
    }

    let file = WritableFile::create_init(&args.path, flags, args.mode)
        .with_context(|| format!("creating {}", args.path.display()))?;
    write_fully(&file, args.text.as_bytes())
        .with_context(|| format!("writing {}", args.path.display()))?;
    log::info!("wrote {} bytes to {}", args.text.len(), args.path.display());
    println!("wrote {} bytes", args.text.len());
    Ok(())
}

/// Implementation of the ls command
pub fn execute_ls(args: &LsArgs) -> Result<()> {
    let mut dir = Directory::open_init(&args.path)
        .with_context(|| format!("opening directory {}", args.path.display()))?;
    let mut entries = Vec::new();
    while let Some(entry) = dir
        .read()
        .with_context(|| format!("reading directory {}", args.path.display()))?
    {
        if args.all || !entry.is_dot() {
            entries.push(entry);
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    for entry in entries {
        println!(
            "{:<12} {}",
            kind_name(entry.kind),
            entry.name.to_string_lossy()
        );
    }
    Ok(())
}

/// Implementation of the stat command
pub fn execute_stat(args: &StatArgs) -> Result<()> {
    let stat = if args.no_follow {
        Stat::lscan_init(&args.path)
    } else {
        Stat::scan_init(&args.path)
    }
    .with_context(|| format!("stat {}", args.path.display()))?;

    println!("path:  {}", args.path.display());
    println!("kind:  {}", kind_name(stat.kind()));
    println!("size:  {}", stat.size());
    println!("mode:  {:04o}", stat.permissions());
    println!("inode: {}", stat.inode());
    println!("links: {}", stat.links());
    println!("owner: {}:{}", stat.uid(), stat.gid());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("644"), Ok(0o644));
        assert_eq!(parse_mode("0600"), Ok(0o600));
        assert!(parse_mode("9").is_err());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(kind_name(FileKind::Regular), "regular");
        assert_eq!(kind_name(FileKind::from_mode(libc::S_IFDIR)), "directory");
    }
}
