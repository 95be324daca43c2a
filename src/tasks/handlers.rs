// Copyright (C) 2026  The eTunes Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    library::{
        locate_library,
        schema::{LibrarySchema, METADATA_PATH},
        store::LibraryStore,
        template,
    },
    lock::ProcessTable,
    metadata::{
        self, Attributes,
        file::{read_album, write_album},
    },
    query::{Query, QuerySource},
    tags::{self, AlbumDir},
    tasks::TaskContext,
    transaction::Engine,
    vcs::{CommitLog, git::GitCli},
};

pub(super) const VERSION: &str = concat!("etunes ", env!("CARGO_PKG_VERSION"));

fn library_file(ctx: &TaskContext) -> Result<PathBuf> {
    Ok(locate_library(ctx.explicit_library().as_deref(), &ctx.cwd)?)
}

/// Runs `f` with a transaction engine for a library.
fn with_engine<T>(
    library_file: &Path,
    processes: &dyn ProcessTable,
    f: impl FnOnce(&Engine) -> Result<T>,
) -> Result<T> {
    let root = library_file
        .parent()
        .context("library file has no parent directory")?
        .to_path_buf();

    let git = GitCli::new(&root);
    let schema = LibrarySchema::standard();
    let engine = Engine::new(
        LibraryStore::new(&schema, &git, library_file),
        CommitLog::new(&git, &root),
        processes,
    );

    f(&engine)
}

pub(super) fn query(ctx: &mut TaskContext, source: &str) -> Result<()> {
    let source = QuerySource::from_arg(source, &ctx.cwd)?;
    let (text, name) = source.read(ctx.stdin)?;
    let query = Query::parse(&text, &name)?;

    if !query.songs.is_empty() || !query.import.is_empty() {
        info!(
            songs = query.songs.len(),
            import = query.import.len(),
            "song operations are validated but not run"
        );
    }

    let library_file = library_file(ctx)?;
    with_engine(&library_file, ctx.processes, |engine| {
        Ok(engine.execute(&query, &mut *ctx.stdout)?)
    })?;

    Ok(())
}

pub(super) fn translate(ctx: &mut TaskContext, media_dir: &Path) -> Result<()> {
    let media_dir = ctx.cwd.join(media_dir);
    let description = format!("Translate tags from {}", media_dir.display());

    let library_file = library_file(ctx)?;
    let written = with_engine(&library_file, ctx.processes, |engine| {
        engine.exclusive(&description, |options, decoded, root| {
            let template = engine.library().get(options, METADATA_PATH)?;
            info!(
                media_dir = %media_dir.display(),
                threshold = decoded.deduplication_threshold(),
                "translating tags"
            );
            let albums = tags::scan_albums(&media_dir)?;

            write_album_files(root, &template, albums)
        })
    })?;

    writeln!(
        ctx.stderr,
        "Wrote {written} album metadata file(s) from '{}'",
        media_dir.display()
    )?;

    Ok(())
}

/// Writes the songs of `albums` to the metadata files named by `path_template`.
///
/// Album directories that expand to the same file are merged. Songs already
/// in a metadata file are kept and not added twice. Returns the number of
/// files written.
fn write_album_files(root: &Path, path_template: &str, albums: Vec<AlbumDir>) -> Result<usize> {
    let mut files: BTreeMap<PathBuf, Vec<Attributes>> = BTreeMap::new();
    for album in albums {
        let shared = metadata::split(&album.songs).album;
        let path = root.join(template::expand(path_template, &shared, "yml"));
        debug!(album = %album.path.display(), file = %path.display(), "album metadata file");
        files.entry(path).or_default().extend(album.songs);
    }

    for (path, songs) in &files {
        let mut album = if path.exists() { read_album(path)? } else { Vec::new() };
        for song in songs {
            if !album.contains(song) {
                album.push(song.clone());
            }
        }
        write_album(path, &album)?;
    }

    Ok(files.len())
}

pub(super) fn version(ctx: &mut TaskContext) -> Result<()> {
    writeln!(ctx.stderr, "{VERSION}")?;

    Ok(())
}
